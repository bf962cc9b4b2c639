//! # Keyed Mutex
//!
//! Per-key async locks used to linearize duplicate detection: two
//! concurrent registrations of identical bytes serialize on the
//! content-hash key, so exactly one becomes the primary. Idle entries
//! are pruned opportunistically to keep the map bounded during long
//! batch runs.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of per-key async mutexes.
#[derive(Debug, Default)]
pub struct KeyedMutex {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the given key, waiting if another task holds it.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;
        self.prune();
        guard
    }

    /// Drop entries nobody is waiting on. The `Arc` count is 1 exactly
    /// when no guard or waiter exists.
    fn prune(&self) {
        if self.locks.len() > 1024 {
            self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }

    /// Number of live entries (test surface).
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let mutex = Arc::new(KeyedMutex::new());
        let concurrent = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mutex = mutex.clone();
            let concurrent = concurrent.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = mutex.lock("same-hash").await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let mutex = Arc::new(KeyedMutex::new());
        let a = mutex.lock("hash-a").await;
        // A different key must not block.
        let b = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            mutex.lock("hash-b"),
        )
        .await;
        assert!(b.is_ok());
        drop(a);
    }
}
