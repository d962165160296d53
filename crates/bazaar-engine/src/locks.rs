//! # Entity Locks
//!
//! One async mutex per cart owner or order id, so two requests for the same
//! entity run one after the other while unrelated entities proceed in
//! parallel.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock("order:o-1") ─┐                                                   │
//! │  lock("order:o-1") ─┼─► same Arc<Mutex<()>>  → second waits            │
//! │  lock("cart:user:u")┘─► different mutex      → runs concurrently       │
//! │                                                                         │
//! │  Entries whose mutex nobody holds or waits on are pruned on the next   │
//! │  acquire.                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The version column in the database still guards writers that bypass
//! this process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use bazaar_core::Owner;

/// Held for the duration of one load → mutate → save cycle.
pub type EntityGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct EntityLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cart_key(owner: &Owner) -> String {
        format!("cart:{}", owner)
    }

    pub fn order_key(order_id: &str) -> String {
        format!("order:{}", order_id)
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> EntityGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
