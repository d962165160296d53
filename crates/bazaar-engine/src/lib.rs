//! # bazaar-engine: Service Layer for Bazaar
//!
//! Exposes the cart and order operations. Rules live in `bazaar-core`,
//! storage in `bazaar-db`; this crate sequences them.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Marketplace                                     │
//! │                                                                         │
//! │   caller (HTTP handler, CLI, test)                                     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   ┌──────────────┐   ┌───────────────┐                                 │
//! │   │ CartService  │   │ OrderService  │──► PaymentGateway (timeout)     │
//! │   └──────┬───────┘   └───────┬───────┘                                 │
//! │          │  EntityLocks (one mutex per cart owner / order id)          │
//! │          ▼                   ▼                                          │
//! │   ┌─────────────────────────────────────┐                              │
//! │   │ bazaar-core rules  (pure, no I/O)   │                              │
//! │   └─────────────────────────────────────┘                              │
//! │          │                   │                                          │
//! │          ▼                   ▼                                          │
//! │   ┌─────────────────────────────────────┐                              │
//! │   │ bazaar-db repositories (versioned)  │                              │
//! │   └─────────────────────────────────────┘                              │
//! │                                                                         │
//! │   Every failure surfaces as ApiError { code, message }                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cart_service`] - Cart mutations and reads
//! - [`order_service`] - Checkout, status changes, negotiations
//! - [`payment`] - Gateway trait, timeout wrapper, simulated gateway
//! - [`locks`] - Per-entity async mutexes
//! - [`config`] - `EngineConfig` (file → env → validate)
//! - [`error`] - `ApiError` and `ConfigError`

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod cart_service;
pub mod config;
pub mod error;
pub mod locks;
pub mod order_service;
pub mod payment;

#[cfg(test)]
pub(crate) mod testing;

pub use cart_service::CartService;
pub use config::EngineConfig;
pub use error::{ApiError, ApiResult, ConfigError, ErrorCode};
pub use locks::EntityLocks;
pub use order_service::OrderService;
pub use payment::{ChargeRequest, GatewayError, PaymentGateway, SimulatedGateway};

use bazaar_db::Database;

/// Both services over one database and one lock table.
#[derive(Debug, Clone)]
pub struct Marketplace {
    pub db: Database,
    pub carts: CartService,
    pub orders: OrderService,
}

impl Marketplace {
    /// Opens the configured database (running migrations) and wires the
    /// simulated payment gateway.
    pub async fn open(config: &EngineConfig) -> ApiResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let gateway = SimulatedGateway::new(config.payment_delay(), config.payment.simulated_outcome);

        info!(
            path = ?config.database.path,
            outcome = ?config.payment.simulated_outcome,
            "Marketplace opened"
        );
        Ok(Self::with_gateway(db, Arc::new(gateway), config.payment_timeout()))
    }

    pub fn with_gateway(db: Database, gateway: Arc<dyn PaymentGateway>, payment_timeout: Duration) -> Self {
        let locks = Arc::new(EntityLocks::new());
        Marketplace {
            carts: CartService::new(db.clone(), locks.clone()),
            orders: OrderService::new(db.clone(), locks, gateway, payment_timeout),
            db,
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over `filter`.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatedOutcome;
    use bazaar_core::catalog::{ItemDetails, RoomDetails};
    use bazaar_core::{
        CatalogItem, Category, ItemKind, Money, NewLine, OrderStatus, Owner, PaymentMethod, PaymentStatus,
        Rate,
    };
    use chrono::{Duration as Days, Utc};
    use std::path::PathBuf;

    async fn open(outcome: SimulatedOutcome) -> Marketplace {
        let mut config = EngineConfig::default();
        config.database.path = PathBuf::from(":memory:");
        config.payment.simulated_delay_ms = 10;
        config.payment.simulated_outcome = outcome;

        let market = Marketplace::open(&config).await.unwrap();
        let now = Utc::now();
        let stays = Category {
            id: "stays".into(),
            name: "Stays".into(),
            kind: ItemKind::Room,
            parent_id: None,
            tax_rate: Rate::from_percent(10),
            inherit_parent_tax: false,
        };
        let loft = CatalogItem {
            id: "loft".into(),
            seller_id: "stays".into(),
            name: "Loft".into(),
            details: ItemDetails::Room(RoomDetails {
                nightly_price: Money::from_major(80),
                stock: 1,
                category_id: "stays".into(),
            }),
        };
        market.db.catalog().insert_category(&stays, now).await.unwrap();
        market.db.catalog().upsert_item(&loft, now).await.unwrap();
        market
    }

    fn two_nights() -> NewLine {
        let check_in = Utc::now() + Days::days(7);
        NewLine::new("loft", 1).with_stay(check_in, check_in + Days::days(2))
    }

    #[tokio::test]
    async fn test_room_checkout_with_simulated_approval() {
        let market = open(SimulatedOutcome::Approve).await;
        let guest = Owner::guest("session-1");

        let cart = market.carts.add(&guest, two_nights()).await.unwrap();

        // 160 + 10% tax, no delivery, commission still at its default of 0
        assert_eq!(cart.totals.total, Money::from_major(176));
        assert!(!cart.requires_delivery_address);

        let order = market
            .orders
            .create_order(&guest, PaymentMethod::Online, None)
            .await
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.delivery_address.is_none());
        assert!(market.carts.get(&guest).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simulated_decline_surfaces_external_failure() {
        let market = open(SimulatedOutcome::Decline).await;
        let guest = Owner::guest("session-2");
        market.carts.add(&guest, two_nights()).await.unwrap();

        let err = market
            .orders
            .create_order(&guest, PaymentMethod::Online, None)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ExternalFailure);
        assert!(!market.carts.get(&guest).await.unwrap().is_empty());
        let orders = market.orders.orders_for_buyer(&guest).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::PaymentFailed);
    }

    #[test]
    fn test_init_tracing_installs_once() {
        init_tracing("info");
        assert!(!init_tracing("debug"));
    }
}
