//! # Settings Repository
//!
//! The singleton `admin_settings` row. Only the global commission rate is
//! read by the engine; it is fetched once per cart operation and passed to
//! the pricing code explicitly.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use bazaar_core::Rate;

/// Repository for marketplace-wide settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Current global commission rate.
    ///
    /// The row is created by the initial migration; its absence is an error,
    /// never a silent zero.
    pub async fn commission_rate(&self) -> DbResult<Rate> {
        let bps: Option<i64> =
            sqlx::query_scalar("SELECT commission_bps FROM admin_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        let bps = bps.ok_or_else(|| DbError::not_found("Settings", "1"))?;
        let bps = u32::try_from(bps)
            .map_err(|_| DbError::InvalidData(format!("commission rate {bps} bps")))?;

        debug!(bps, "Loaded commission rate");
        Ok(Rate::from_bps(bps))
    }

    /// Replaces the global commission rate.
    pub async fn set_commission_rate(&self, rate: Rate, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE admin_settings SET commission_bps = ?1, updated_at = ?2 WHERE id = 1",
        )
        .bind(i64::from(rate.bps()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Settings", "1"));
        }

        info!(rate = %rate, "Commission rate updated");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
