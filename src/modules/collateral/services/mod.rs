pub mod collateral_signal;

pub use collateral_signal::{
    CollateralSignal, ItemStatus, MySqlCollateralSignal, RecordingCollateralSignal,
};
