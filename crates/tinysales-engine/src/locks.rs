//! # Lock Registry
//!
//! Per-product and per-order async locks for the coordinator.
//!
//! ## Why Deterministic Ordering?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │              Deadlock by Inconsistent Ordering                      │
//! │                                                                     │
//! │  Request A: create_order [(P2, 1), (P1, 1)]                         │
//! │  Request B: create_order [(P1, 1), (P2, 1)]                         │
//! │                                                                     │
//! │  Naive (request order):      Sorted (ascending id):                 │
//! │    A locks P2, waits P1        A locks P1, locks P2                 │
//! │    B locks P1, waits P2        B waits P1                           │
//! │    ☠ deadlock                  ✓ B proceeds after A                 │
//! │                                                                     │
//! │  Every caller locks products in ascending id order, and takes an    │
//! │  order-scoped lock only AFTER all product locks. One global order,  │
//! │  no cycles.                                                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Thread Safety
//! Handles are `Arc<tokio::sync::Mutex<()>>` because the guards are held
//! across await points (the underlying store writes). The registry map
//! itself is behind a `std::sync::Mutex`: lookups never await.
//!
//! Handles are created lazily and kept for the life of the registry; the
//! set of products is small and bounded in this system, so no eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Registry of per-product and per-order locks.
///
/// Product and order namespaces are independent: locking product `X`
/// never contends with locking order `X`.
#[derive(Debug, Default)]
pub struct LockRegistry {
    products: LockMap,
    orders: LockMap,
}

impl LockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires locks for the given product ids, sorted ascending and
    /// de-duplicated. Guards release on drop, in any order.
    ///
    /// Holding the returned guards serializes this caller against every
    /// other engine operation touching any of the same products.
    pub async fn lock_products(&self, ids: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for id in sorted {
            let handle = Self::handle(&self.products, id);
            guards.push(handle.lock_owned().await);
        }
        guards
    }

    /// Acquires the lock for one order.
    ///
    /// Callers that also need product locks must take those first to
    /// preserve the global ordering.
    pub async fn lock_order(&self, id: &str) -> OwnedMutexGuard<()> {
        Self::handle(&self.orders, id).lock_owned().await
    }

    /// Returns the lock handle for a key, creating it on first use.
    fn handle(map: &LockMap, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = map.lock().expect("lock registry mutex poisoned");
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
