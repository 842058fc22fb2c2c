use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tokio::sync::Mutex;

use crate::core::{AppError, Result};

/// Pledge state of an item held by the shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Released back to the owner / free for sale
    Available,
    /// Held against an open loan
    Collateral,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Collateral => "collateral",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tells the inventory side that a pledged item changed hands.
/// Callers log failures and carry on.
#[async_trait]
pub trait CollateralSignal: Send + Sync {
    async fn update_status(&self, item_id: &str, status: ItemStatus) -> Result<()>;
}

/// Updates `items.status` directly
pub struct MySqlCollateralSignal {
    pool: MySqlPool,
}

impl MySqlCollateralSignal {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollateralSignal for MySqlCollateralSignal {
    async fn update_status(&self, item_id: &str, status: ItemStatus) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE items
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(item_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to update item status", e))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found(format!("Item '{}' not found", item_id)));
        }

        Ok(())
    }
}

/// In-process signal that records every call; optionally fails them all
#[derive(Default)]
pub struct RecordingCollateralSignal {
    calls: Mutex<Vec<(String, ItemStatus)>>,
    fail: bool,
}

impl RecordingCollateralSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub async fn calls(&self) -> Vec<(String, ItemStatus)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CollateralSignal for RecordingCollateralSignal {
    async fn update_status(&self, item_id: &str, status: ItemStatus) -> Result<()> {
        self.calls.lock().await.push((item_id.to_string(), status));
        if self.fail {
            return Err(AppError::Persistence("inventory service unavailable".to_string()));
        }
        Ok(())
    }
}
