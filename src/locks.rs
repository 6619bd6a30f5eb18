//! Keyed lock arena
//!
//! Per-wallet (and per-credit-user) mutual exclusion: every balance mutation
//! for one key is serialized, while unrelated keys proceed in parallel. There
//! is deliberately no global lock anywhere in the crate.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Arena of async mutexes keyed by id
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    ///
    /// The dashmap shard guard is released before awaiting the mutex.
    pub async fn acquire(&self, key: u64) -> OwnedMutexGuard<()> {
        let cell = self.locks.entry(key).or_default().clone();
        cell.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let counter = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();

        for _ in 0..50 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(7).await;
                // non-atomic read-modify-write; only safe under the lock
                let v = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(v + 1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = Arc::new(KeyedLocks::new());
        let g1 = locks.acquire(1).await;
        // must not deadlock while key 1 is held
        let g2 = locks.acquire(2).await;
        drop(g1);
        drop(g2);
    }
}
