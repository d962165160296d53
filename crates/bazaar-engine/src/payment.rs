//! # Payment Boundary
//!
//! The engine never talks to a payment network directly. It calls a
//! [`PaymentGateway`] and turns every answer into a
//! [`PaymentOutcome`] the order can record.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderService::create_order (online)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  charge_with_timeout(gateway, request, timeout)                        │
//! │       ├── Ok(Approved { reference }) ──► Payment Completed             │
//! │       ├── Ok(Declined { reason })    ──┐                                │
//! │       ├── Err(GatewayError)          ──┼► Payment Failed (terminal)    │
//! │       └── timeout elapsed            ──┘                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No retries: a failed charge ends that order attempt.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SimulatedOutcome;
use bazaar_core::{Money, PaymentMethod, PaymentOutcome};

/// What the gateway is asked to collect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: String,
    pub order_number: String,
    pub amount: Money,
    pub method: PaymentMethod,
}

/// The gateway could not give an answer at all.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// External payment collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentOutcome, GatewayError>;
}

/// Calls the gateway, bounded by `timeout`. Every failure mode becomes a
/// `Declined` outcome.
pub async fn charge_with_timeout(
    gateway: &dyn PaymentGateway,
    request: &ChargeRequest,
    timeout: Duration,
) -> PaymentOutcome {
    debug!(order_id = %request.order_id, amount = %request.amount, "Charging");

    let outcome = match tokio::time::timeout(timeout, gateway.charge(request)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => PaymentOutcome::Declined {
            reason: err.to_string(),
        },
        Err(_) => PaymentOutcome::Declined {
            reason: format!("Payment timed out after {}s", timeout.as_secs_f64()),
        },
    };

    match &outcome {
        PaymentOutcome::Approved { reference } => {
            info!(order_id = %request.order_id, %reference, "Payment approved")
        }
        PaymentOutcome::Declined { reason } => {
            warn!(order_id = %request.order_id, %reason, "Payment declined")
        }
    }

    outcome
}

// =============================================================================
// Simulated Gateway
// =============================================================================

/// Stand-in gateway: waits a fixed delay, then gives a fixed answer.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    delay: Duration,
    outcome: SimulatedOutcome,
}

impl SimulatedGateway {
    pub fn new(delay: Duration, outcome: SimulatedOutcome) -> Self {
        SimulatedGateway { delay, outcome }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentOutcome, GatewayError> {
        tokio::time::sleep(self.delay).await;

        Ok(match self.outcome {
            SimulatedOutcome::Approve => PaymentOutcome::Approved {
                reference: format!("sim-{}", Uuid::new_v4()),
            },
            SimulatedOutcome::Decline => PaymentOutcome::Declined {
                reason: format!("Card declined for {}", request.order_number),
            },
        })
    }
}

// =============================================================================
// Test Gateway
// =============================================================================
