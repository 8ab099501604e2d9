//! Per-key async mutex registries used to serialize state transitions that
//! touch the same row: one task's transitions, one parent's response
//! aggregation, one HITL queue item's single-winner resolution.
//!
//! A `DashMap<Uuid, Arc<Mutex<()>>>` is cheap to hold onto even though
//! entries are never evicted — a long-lived org has at most a few hundred
//! thousand tasks over its lifetime, not a number that threatens memory.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use uuid::Uuid;

/// Keyed lock registry. Each key gets its own `tokio::sync::Mutex`, so
/// holding the lock for key A never blocks operations on key B.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn entry_for(&self, key: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquire the lock for `key`, blocking other callers on the same key
    /// until the returned guard is dropped.
    pub async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
        self.entry_for(key).lock_owned().await
    }
}

/// A guard borrowed from a `KeyedLocks` whose lifetime is tied to the
/// registry rather than owned independently. Kept separate from
/// `OwnedMutexGuard` usage sites that need `'static` guards (e.g. across a
/// spawned task boundary).
pub type KeyGuard<'a> = MutexGuard<'a, ()>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _guard_a = locks.lock(a).await;
        let guard_b = tokio::time::timeout(Duration::from_millis(50), locks.lock(b)).await;
        assert!(guard_b.is_ok());
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let key = Uuid::new_v4();
        let guard = locks.lock(key).await;
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.lock(key).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }
}
