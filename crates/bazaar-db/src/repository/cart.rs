//! # Cart Repository
//!
//! One cart per owner. The whole cart is stored as a JSON payload; the
//! `version` column is the optimistic concurrency guard.
//!
//! ## Save Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart.version == 0  (never stored)                                      │
//! │     └── INSERT ... version = 1                                         │
//! │         └── UNIQUE(owner) hit → VersionConflict (someone else won)     │
//! │                                                                         │
//! │  cart.version == n                                                      │
//! │     └── UPDATE ... SET version = n + 1 WHERE id = ? AND version = n    │
//! │         └── 0 rows → VersionConflict (row exists) / NotFound          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use bazaar_core::{Cart, Owner};

#[derive(Debug, sqlx::FromRow)]
struct CartRecord {
    payload: String,
    version: i64,
}

impl TryFrom<CartRecord> for Cart {
    type Error = DbError;

    fn try_from(record: CartRecord) -> DbResult<Self> {
        let mut cart: Cart = serde_json::from_str(&record.payload)?;
        // The column is authoritative; the payload copy may lag by one save.
        cart.version = record.version;
        Ok(cart)
    }
}

/// Repository for carts.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the owner's cart, if one was ever saved.
    pub async fn get_by_owner(&self, owner: &Owner) -> DbResult<Option<Cart>> {
        let record: Option<CartRecord> = sqlx::query_as(
            "SELECT payload, version FROM carts WHERE owner_kind = ?1 AND owner_id = ?2",
        )
        .bind(owner.kind())
        .bind(owner.id())
        .fetch_optional(&self.pool)
        .await?;

        record.map(Cart::try_from).transpose()
    }

    /// Persists the cart and bumps `cart.version` on success.
    pub async fn save(&self, cart: &mut Cart) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        save_cart(&mut conn, cart).await
    }
}

/// Version-checked cart write on an existing connection, so order placement
/// can clear the cart inside its own transaction.
pub(crate) async fn save_cart(conn: &mut SqliteConnection, cart: &mut Cart) -> DbResult<()> {
    debug!(cart_id = %cart.id, owner = %cart.owner, version = cart.version, "Saving cart");

    let next_version = cart.version + 1;
    let mut stored = cart.clone();
    stored.version = next_version;
    let payload = serde_json::to_string(&stored)?;

    if cart.version == 0 {
        let inserted = sqlx::query(
            r#"
            INSERT INTO carts (
                id, owner_kind, owner_id, payload, total_cents, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&cart.id)
        .bind(cart.owner.kind())
        .bind(cart.owner.id())
        .bind(&payload)
        .bind(cart.totals.total.cents())
        .bind(next_version)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&mut *conn)
        .await;

        if let Err(err) = inserted {
            return Err(match DbError::from(err) {
                DbError::UniqueViolation { .. } => {
                    warn!(owner = %cart.owner, "Cart created concurrently");
                    DbError::conflict("Cart", cart.owner.to_string())
                }
                other => other,
            });
        }
    } else {
        let result = sqlx::query(
            r#"
            UPDATE carts
            SET payload = ?1, total_cents = ?2, version = ?3, updated_at = ?4
            WHERE id = ?5 AND version = ?6
            "#,
        )
        .bind(&payload)
        .bind(cart.totals.total.cents())
        .bind(next_version)
        .bind(cart.updated_at)
        .bind(&cart.id)
        .bind(cart.version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM carts WHERE id = ?1")
                .bind(&cart.id)
                .fetch_optional(&mut *conn)
                .await?;

            return Err(match exists {
                Some(current) => {
                    warn!(cart_id = %cart.id, expected = cart.version, current, "Cart version conflict");
                    DbError::conflict("Cart", &cart.id)
                }
                None => DbError::not_found("Cart", &cart.id),
            });
        }
    }

    cart.version = next_version;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
