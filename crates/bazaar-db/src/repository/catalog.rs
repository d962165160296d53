//! # Catalog Repository
//!
//! Read access to items and categories for pricing, plus the writes the
//! seed tool needs.
//!
//! ## Snapshot Loading
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  snapshot_for(["dal", "tee"])                                          │
//! │       │                                                                 │
//! │       ├── 1. SELECT ... FROM catalog_items WHERE id IN (...)           │
//! │       ├── 2. SELECT ... FROM categories WHERE id IN (item categories)  │
//! │       └── 3. SELECT ... FROM categories WHERE id IN (missing parents)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CatalogSnapshot  ← handed to Cart::add_line / Cart::recompute         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unknown ids are simply absent from the snapshot; pricing turns the gap
//! into a `NotFound`.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::catalog::{CatalogItem, CatalogSnapshot, Category, ItemDetails, ItemKind};
use bazaar_core::Rate;

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRecord {
    id: String,
    name: String,
    kind: ItemKind,
    parent_id: Option<String>,
    tax_rate_bps: i64,
    inherit_parent_tax: bool,
}

impl TryFrom<CategoryRecord> for Category {
    type Error = DbError;

    fn try_from(record: CategoryRecord) -> DbResult<Self> {
        let bps = u32::try_from(record.tax_rate_bps).map_err(|_| {
            DbError::InvalidData(format!(
                "category {} has tax rate {} bps",
                record.id, record.tax_rate_bps
            ))
        })?;

        Ok(Category {
            id: record.id,
            name: record.name,
            kind: record.kind,
            parent_id: record.parent_id,
            tax_rate: Rate::from_bps(bps),
            inherit_parent_tax: record.inherit_parent_tax,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRecord {
    id: String,
    seller_id: String,
    name: String,
    details: String,
}

impl TryFrom<ItemRecord> for CatalogItem {
    type Error = DbError;

    fn try_from(record: ItemRecord) -> DbResult<Self> {
        let details: ItemDetails = serde_json::from_str(&record.details)?;
        Ok(CatalogItem {
            id: record.id,
            seller_id: record.seller_id,
            name: record.name,
            details,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog items and categories.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts a category. The parent, if any, must already exist.
    pub async fn insert_category(&self, category: &Category, now: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %category.id, kind = %category.kind, "Inserting category");

        sqlx::query(
            r#"
            INSERT INTO categories (
                id, name, kind, parent_id, tax_rate_bps, inherit_parent_tax, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(category.kind)
        .bind(&category.parent_id)
        .bind(i64::from(category.tax_rate.bps()))
        .bind(category.inherit_parent_tax)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a category by ID.
    pub async fn get_category(&self, id: &str) -> DbResult<Option<Category>> {
        let record: Option<CategoryRecord> = sqlx::query_as(
            r#"
            SELECT id, name, kind, parent_id, tax_rate_bps, inherit_parent_tax
            FROM categories
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Category::try_from).transpose()
    }

    /// Inserts an item, or replaces the stored one with the same id.
    ///
    /// Price and stock changes go through here; carts pick them up on their
    /// next recompute, orders never do.
    pub async fn upsert_item(&self, item: &CatalogItem, now: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %item.id, kind = %item.kind(), "Upserting catalog item");

        let details = serde_json::to_string(&item.details)?;

        sqlx::query(
            r#"
            INSERT INTO catalog_items (
                id, seller_id, name, kind, category_id, details, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(id) DO UPDATE SET
                seller_id = excluded.seller_id,
                name = excluded.name,
                kind = excluded.kind,
                category_id = excluded.category_id,
                details = excluded.details,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&item.id)
        .bind(&item.seller_id)
        .bind(&item.name)
        .bind(item.kind())
        .bind(item.details.category_id())
        .bind(details)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an item by ID.
    pub async fn get_item(&self, id: &str) -> DbResult<Option<CatalogItem>> {
        let record: Option<ItemRecord> = sqlx::query_as(
            "SELECT id, seller_id, name, details FROM catalog_items WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(CatalogItem::try_from).transpose()
    }

    /// Counts catalog items.
    pub async fn count_items(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Loads the given items, their categories and those categories'
    /// parents into one snapshot.
    pub async fn snapshot_for(&self, item_ids: &[String]) -> DbResult<CatalogSnapshot> {
        debug!(items = item_ids.len(), "Loading catalog snapshot");

        let mut snapshot = CatalogSnapshot::new();
        if item_ids.is_empty() {
            return Ok(snapshot);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, seller_id, name, details FROM catalog_items WHERE id IN (",
        );
        let mut ids = query.separated(", ");
        for id in item_ids {
            ids.push_bind(id.as_str());
        }
        ids.push_unseparated(")");

        let records: Vec<ItemRecord> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut category_ids: Vec<String> = Vec::new();
        for record in records {
            let item = CatalogItem::try_from(record)?;
            category_ids.push(item.details.category_id().to_string());
            snapshot.insert_item(item);
        }
        category_ids.sort();
        category_ids.dedup();

        let categories = self.fetch_categories(&category_ids).await?;

        let mut parent_ids: Vec<String> = categories
            .iter()
            .filter_map(|c| c.parent_id.clone())
            .filter(|p| !category_ids.contains(p))
            .collect();
        parent_ids.sort();
        parent_ids.dedup();

        for category in categories {
            snapshot.insert_category(category);
        }
        for parent in self.fetch_categories(&parent_ids).await? {
            snapshot.insert_category(parent);
        }

        Ok(snapshot)
    }

    async fn fetch_categories(&self, ids: &[String]) -> DbResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, kind, parent_id, tax_rate_bps, inherit_parent_tax FROM categories WHERE id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let records: Vec<CategoryRecord> = query.build_query_as().fetch_all(&self.pool).await?;
        records.into_iter().map(Category::try_from).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::*;
    use bazaar_core::catalog::CatalogLookup;
    use bazaar_core::Money;

    #[tokio::test]
    async fn test_item_round_trips_through_json_details() {
        let db = seeded_db().await;

        let item = db.catalog().get_item("tee").await.unwrap().unwrap();
        assert_eq!(item, tee());
        assert!(db.catalog().get_item("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_price() {
        let db = seeded_db().await;
        let mut dal = dal();
        if let ItemDetails::Food(food) = &mut dal.details {
            food.price = Money::from_major(12);
        }

        db.catalog().upsert_item(&dal, now()).await.unwrap();

        let stored = db.catalog().get_item("dal").await.unwrap().unwrap();
        assert_eq!(stored, dal);
        assert_eq!(db.catalog().count_items().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_item_with_unknown_category_is_rejected() {
        let db = test_db().await;

        let err = db.catalog().upsert_item(&dal(), now()).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_includes_parent_categories() {
        let db = seeded_db().await;

        let snapshot = db
            .catalog()
            .snapshot_for(&["tee".to_string(), "ghost".to_string()])
            .await
            .unwrap();

        assert_eq!(snapshot.item_count(), 1);
        assert!(snapshot.item("ghost").is_none());
        // tees inherits apparel's 12%
        assert_eq!(snapshot.effective_tax_rate("tees").unwrap(), Rate::from_percent(12));
    }

    #[tokio::test]
    async fn test_snapshot_of_nothing_is_empty() {
        let db = seeded_db().await;

        let snapshot = db.catalog().snapshot_for(&[]).await.unwrap();
        assert_eq!(snapshot.item_count(), 0);
    }

    #[tokio::test]
    async fn test_get_category() {
        let db = seeded_db().await;

        let tees = db.catalog().get_category("tees").await.unwrap().unwrap();
        assert_eq!(tees, tees_category());
    }
}
