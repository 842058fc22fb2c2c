pub mod services;

pub use services::{CollateralSignal, ItemStatus, MySqlCollateralSignal, RecordingCollateralSignal};
