use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

use crate::modules::settlement::services::RetryPolicy;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub settlement: SettlementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// `json` for structured logs, anything else for human-readable
    pub log_format: String,
}

impl AppConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Settle/reverse retry and customer stats relay tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub customer_stats_poll_seconds: u64,
    pub customer_stats_batch_size: u32,
    pub customer_stats_max_attempts: i32,
}

impl SettlementConfig {
    pub fn from_env() -> Result<Self> {
        Ok(SettlementConfig {
            max_attempts: env_or("SETTLEMENT_MAX_ATTEMPTS", 3)?,
            retry_backoff_ms: env_or("SETTLEMENT_RETRY_BACKOFF_MS", 50)?,
            customer_stats_poll_seconds: env_or("CUSTOMER_STATS_POLL_SECONDS", 30)?,
            customer_stats_batch_size: env_or("CUSTOMER_STATS_BATCH_SIZE", 100)?,
            customer_stats_max_attempts: env_or("CUSTOMER_STATS_MAX_ATTEMPTS", 5)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn customer_stats_poll_interval(&self) -> Duration {
        Duration::from_secs(self.customer_stats_poll_seconds)
    }
}

/// Read and parse an optional environment variable
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            settlement: SettlementConfig::from_env()?,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size > self.database.max_connections {
            return Err(AppError::Configuration(
                "DATABASE_POOL_SIZE cannot exceed DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }

        if self.settlement.max_attempts == 0 {
            return Err(AppError::Configuration(
                "SETTLEMENT_MAX_ATTEMPTS must be greater than 0".to_string(),
            ));
        }

        if self.settlement.customer_stats_poll_seconds == 0 {
            return Err(AppError::Configuration(
                "CUSTOMER_STATS_POLL_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.settlement.customer_stats_batch_size == 0 {
            return Err(AppError::Configuration(
                "CUSTOMER_STATS_BATCH_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.settlement.customer_stats_max_attempts <= 0 {
            return Err(AppError::Configuration(
                "CUSTOMER_STATS_MAX_ATTEMPTS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
