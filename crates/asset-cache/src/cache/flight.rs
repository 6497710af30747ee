//! Per-key request serialization.
//!
//! Concurrent misses on one cache key queue behind a shared lock; the first
//! holder fetches and persists, the rest find the artifact on disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type KeyLock = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    locks: Mutex<HashMap<String, KeyLock>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `key`.
    pub(crate) async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.to_string()).or_default().clone()
        };

        let guard = lock.clone().lock_owned().await;

        FlightGuard {
            table: self,
            key: key.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub(crate) struct FlightGuard<'a> {
    table: &'a InFlight,
    key: String,
    lock: KeyLock,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.table.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the table and this guard still reference the lock.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
