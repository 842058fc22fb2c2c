pub mod customer_stats_relay;

pub use customer_stats_relay::{CustomerStatsRelay, RelayReport};
