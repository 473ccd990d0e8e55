//! In-process per-product mutual exclusion.
//!
//! Mutations of one product are serialized; different products never block each
//! other. Acquisition is bounded by a timeout and reports a retryable conflict
//! instead of hanging.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use lotstock_core::{DomainError, ProductId};

#[derive(Debug, Default)]
pub struct ProductLocks {
    held: Mutex<HashSet<ProductId>>,
    released: Condvar,
}

/// Held lock on one product; released on drop.
#[derive(Debug)]
pub struct ProductGuard<'a> {
    locks: &'a ProductLocks,
    id: ProductId,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, id: ProductId, timeout: Duration) -> Result<ProductGuard<'_>, DomainError> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|_| DomainError::conflict("product lock registry poisoned"))?;

        while held.contains(&id) {
            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::conflict(format!(
                    "product {id} is busy (lock not acquired within {}ms)",
                    timeout.as_millis()
                )));
            }
            let (next, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| DomainError::conflict("product lock registry poisoned"))?;
            held = next;
        }

        held.insert(id);
        Ok(ProductGuard { locks: self, id })
    }

    pub fn is_held(&self, id: ProductId) -> bool {
        self.held.lock().map(|h| h.contains(&id)).unwrap_or(false)
    }
}

impl Drop for ProductGuard<'_> {
    fn drop(&mut self) {
        // Release even if a holder panicked while the registry was locked.
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        held.remove(&self.id);
        drop(held);
        self.locks.released.notify_all();
    }
}
