//! # Order Repository
//!
//! Orders and their append-only ledgers.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  orders                          order_ledger                          │
//! │  ─────────────────────────       ──────────────────────────────────    │
//! │  id, status, seller_id, ...      (order_id, seq) PRIMARY KEY           │
//! │  payload  ← Order JSON           label, kind, amount, status, detail   │
//! │             without `ledger`     insert-only (UPDATE/DELETE triggers)  │
//! │  version  ← optimistic guard                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Save
//! ```text
//! BEGIN
//!   UPDATE orders SET ..., version = n + 1 WHERE id = ? AND version = n
//!   SELECT MAX(seq) FROM order_ledger WHERE order_id = ?
//!   INSERT INTO order_ledger   (only entries after MAX(seq))
//! COMMIT
//! ```
//!
//! `settle_checkout` runs the same steps plus the cart save in one
//! transaction; an online order is inserted before its charge and settled
//! through it afterwards.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::cart::save_cart;
use bazaar_core::ledger::EntryDetail;
use bazaar_core::{
    Cart, EntryStatus, ItemKind, Ledger, LedgerEntry, LedgerEventKind, Money, Order, OrderStatus,
    Owner, SellerTransaction,
};

const LEDGER_KEY: &str = "ledger";

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRecord {
    payload: String,
    version: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRecord {
    seq: i64,
    kind: String,
    amount_cents: i64,
    status: EntryStatus,
    detail: Option<String>,
    recorded_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SellerLedgerRecord {
    order_id: String,
    order_number: String,
    #[sqlx(flatten)]
    entry: LedgerRecord,
}

impl TryFrom<LedgerRecord> for LedgerEntry {
    type Error = DbError;

    fn try_from(record: LedgerRecord) -> DbResult<Self> {
        let kind: LedgerEventKind = serde_json::from_str(&record.kind)?;
        let detail: Option<EntryDetail> = record
            .detail
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(LedgerEntry {
            seq: record.seq,
            kind,
            amount: Money::from_cents(record.amount_cents),
            status: record.status,
            detail,
            recorded_at: record.recorded_at,
        })
    }
}

/// Order JSON without the ledger; entries live in their own table.
fn encode_payload(order: &Order) -> DbResult<String> {
    let mut value = serde_json::to_value(order)?;
    if let Some(map) = value.as_object_mut() {
        map.remove(LEDGER_KEY);
    }
    Ok(serde_json::to_string(&value)?)
}

fn decode_order(record: OrderRecord, entries: Vec<LedgerEntry>) -> DbResult<Order> {
    let mut value: Value = serde_json::from_str(&record.payload)?;
    let map = value
        .as_object_mut()
        .ok_or_else(|| DbError::InvalidData("order payload is not an object".to_string()))?;
    map.insert(LEDGER_KEY.to_string(), Value::Array(Vec::new()));

    let mut order: Order = serde_json::from_value(value)?;
    order.ledger = Ledger::from_entries(entries);
    order.version = record.version;
    Ok(order)
}

fn kind_column(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Room => "has_room",
        ItemKind::Food => "has_food",
        ItemKind::Product => "has_product",
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders and ledgers.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a new order with its ledger. Sets `order.version` to 1.
    pub async fn insert(&self, order: &mut Order) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_order(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Inserts the order and saves the (already cleared) source cart in one
    /// transaction. Either both land or neither does.
    pub async fn place_order(&self, order: &mut Order, cart: &mut Cart) -> DbResult<()> {
        debug!(order_id = %order.id, cart_id = %cart.id, "Placing order");

        let cart_version = cart.version;
        let mut tx = self.pool.begin().await?;

        insert_order(&mut tx, order).await?;
        if let Err(err) = save_cart(&mut tx, cart).await {
            order.version = 0;
            return Err(err);
        }

        if let Err(err) = tx.commit().await {
            order.version = 0;
            cart.version = cart_version;
            return Err(err.into());
        }

        info!(order_id = %order.id, order_number = %order.order_number, "Order placed");
        Ok(())
    }

    /// Saves header changes and appends new ledger entries. Bumps
    /// `order.version`.
    pub async fn save(&self, order: &mut Order) -> DbResult<()> {
        debug!(order_id = %order.id, version = order.version, "Saving order");

        let mut tx = self.pool.begin().await?;
        let next_version = update_order(&mut tx, order).await?;
        tx.commit().await?;

        order.version = next_version;
        Ok(())
    }

    /// Saves a stored order after its payment settled, together with the
    /// (already cleared) source cart. Either both land or neither does.
    pub async fn settle_checkout(&self, order: &mut Order, cart: &mut Cart) -> DbResult<()> {
        debug!(order_id = %order.id, cart_id = %cart.id, "Settling checkout");

        let cart_version = cart.version;
        let mut tx = self.pool.begin().await?;

        let next_version = update_order(&mut tx, order).await?;
        save_cart(&mut tx, cart).await?;

        if let Err(err) = tx.commit().await {
            cart.version = cart_version;
            return Err(err.into());
        }

        order.version = next_version;
        info!(order_id = %order.id, payment_status = ?order.payment_status, "Checkout settled");
        Ok(())
    }

    /// Gets an order with its full ledger.
    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let record: Option<OrderRecord> =
            sqlx::query_as("SELECT payload, version FROM orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match record {
            Some(record) => {
                let entries = self.ledger(id).await?;
                decode_order(record, entries).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Orders placed by a buyer, newest first.
    pub async fn for_buyer(&self, buyer: &Owner) -> DbResult<Vec<Order>> {
        let records: Vec<(String, OrderRecord)> = sqlx::query_as::<_, (String, String, i64)>(
            r#"
            SELECT id, payload, version
            FROM orders
            WHERE buyer_kind = ?1 AND buyer_id = ?2
            ORDER BY created_at DESC, order_number DESC
            "#,
        )
        .bind(buyer.kind())
        .bind(buyer.id())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, payload, version)| (id, OrderRecord { payload, version }))
        .collect();

        self.hydrate(records).await
    }

    /// Orders placed by a buyer that contain at least one line of `kind`,
    /// newest first.
    pub async fn for_buyer_by_kind(&self, buyer: &Owner, kind: ItemKind) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT id, payload, version
            FROM orders
            WHERE buyer_kind = ?1 AND buyer_id = ?2 AND {} = 1
            ORDER BY created_at DESC, order_number DESC
            "#,
            kind_column(kind)
        );

        let records = sqlx::query_as::<_, (String, String, i64)>(&sql)
            .bind(buyer.kind())
            .bind(buyer.id())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, payload, version)| (id, OrderRecord { payload, version }))
            .collect();

        self.hydrate(records).await
    }

    /// Every order of a seller, newest first, optionally only those with a
    /// line of `kind`.
    pub async fn for_seller(&self, seller_id: &str, kind: Option<ItemKind>) -> DbResult<Vec<Order>> {
        let kind_filter = kind
            .map(|k| format!("AND {} = 1", kind_column(k)))
            .unwrap_or_default();
        let sql = format!(
            r#"
            SELECT id, payload, version
            FROM orders
            WHERE seller_id = ?1 {}
            ORDER BY created_at DESC, order_number DESC
            "#,
            kind_filter
        );

        let records = sqlx::query_as::<_, (String, String, i64)>(&sql)
            .bind(seller_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, payload, version)| (id, OrderRecord { payload, version }))
            .collect();

        self.hydrate(records).await
    }

    /// Ledger entries across a seller's orders recorded at or after
    /// `since`, newest first.
    pub async fn seller_transactions(
        &self,
        seller_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<SellerTransaction>> {
        let records: Vec<SellerLedgerRecord> = sqlx::query_as(
            r#"
            SELECT o.id AS order_id, o.order_number,
                   l.seq, l.kind, l.amount_cents, l.status, l.detail, l.recorded_at
            FROM order_ledger l
            JOIN orders o ON o.id = l.order_id
            WHERE o.seller_id = ?1 AND (?2 IS NULL OR l.recorded_at >= ?2)
            ORDER BY l.recorded_at DESC, o.order_number DESC, l.seq DESC
            "#,
        )
        .bind(seller_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        records
            .into_iter()
            .map(|record| {
                Ok(SellerTransaction {
                    order_id: record.order_id,
                    order_number: record.order_number,
                    entry: LedgerEntry::try_from(record.entry)?,
                })
            })
            .collect()
    }

    /// Pending orders of a seller that contain at least one line of `kind`.
    pub async fn pending_for_seller(&self, seller_id: &str, kind: ItemKind) -> DbResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT id, payload, version
            FROM orders
            WHERE seller_id = ?1 AND status = ?2 AND {} = 1
            ORDER BY created_at ASC
            "#,
            kind_column(kind)
        );

        let records: Vec<(String, OrderRecord)> = sqlx::query_as::<_, (String, String, i64)>(&sql)
            .bind(seller_id)
            .bind(OrderStatus::Pending)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(id, payload, version)| (id, OrderRecord { payload, version }))
            .collect();

        self.hydrate(records).await
    }

    /// The stored ledger of an order, in sequence order.
    pub async fn ledger(&self, order_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let records: Vec<LedgerRecord> = sqlx::query_as(
            r#"
            SELECT seq, kind, amount_cents, status, detail, recorded_at
            FROM order_ledger
            WHERE order_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn hydrate(&self, records: Vec<(String, OrderRecord)>) -> DbResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(records.len());
        for (id, record) in records {
            let entries = self.ledger(&id).await?;
            orders.push(decode_order(record, entries)?);
        }
        Ok(orders)
    }
}

// =============================================================================
// Connection-level helpers
// =============================================================================

/// Versioned header update plus ledger append. Returns the new version;
/// `order.version` is left for the caller to bump after commit.
async fn update_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<i64> {
    let next_version = order.version + 1;

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?1, payment_status = ?2, payload = ?3, version = ?4, updated_at = ?5
        WHERE id = ?6 AND version = ?7
        "#,
    )
    .bind(order.status)
    .bind(order.payment_status)
    .bind(encode_payload(order)?)
    .bind(next_version)
    .bind(order.updated_at)
    .bind(&order.id)
    .bind(order.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = ?1")
            .bind(&order.id)
            .fetch_optional(&mut *conn)
            .await?;

        return Err(match exists {
            Some(current) => {
                warn!(order_id = %order.id, expected = order.version, current, "Order version conflict");
                DbError::conflict("Order", &order.id)
            }
            None => DbError::not_found("Order", &order.id),
        });
    }

    let stored_seq: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM order_ledger WHERE order_id = ?1")
            .bind(&order.id)
            .fetch_one(&mut *conn)
            .await?;

    insert_entries(conn, &order.id, order.ledger.entries_after(stored_seq)).await?;
    Ok(next_version)
}

async fn insert_order(conn: &mut SqliteConnection, order: &mut Order) -> DbResult<()> {
    debug!(order_id = %order.id, seller_id = %order.seller_id, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, buyer_kind, buyer_id, seller_id,
            status, payment_method, payment_status, total_cents,
            has_room, has_food, has_product,
            payload, version, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12,
            ?13, 1, ?14, ?15
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(order.buyer.kind())
    .bind(order.buyer.id())
    .bind(&order.seller_id)
    .bind(order.status)
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.total().cents())
    .bind(order.contains_kind(ItemKind::Room))
    .bind(order.contains_kind(ItemKind::Food))
    .bind(order.contains_kind(ItemKind::Product))
    .bind(encode_payload(order)?)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    insert_entries(conn, &order.id, order.ledger.entries()).await?;

    order.version = 1;
    Ok(())
}

async fn insert_entries(
    conn: &mut SqliteConnection,
    order_id: &str,
    entries: &[LedgerEntry],
) -> DbResult<()> {
    for entry in entries {
        let detail = entry.detail.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO order_ledger (
                order_id, seq, label, kind, amount_cents, status, detail, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(order_id)
        .bind(entry.seq)
        .bind(entry.label())
        .bind(serde_json::to_string(&entry.kind)?)
        .bind(entry.amount.cents())
        .bind(entry.status)
        .bind(detail)
        .bind(entry.recorded_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
