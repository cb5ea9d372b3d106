//! Per-key async mutual exclusion.
//!
//! Block, unblock, and timer-expiry for the same device must not interleave,
//! but operations on different devices should not wait for each other.
//! [`KeyedLocks`] hands out one `tokio::sync::Mutex` per key, created on
//! demand and dropped again once nobody holds or waits on it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A map of lazily created async locks, one per key.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for exclusive access to `key`.  Released when the guard drops.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only this map refers to are idle.
            locks.retain(|_, slot| Arc::strong_count(slot) > 1);
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        // Arrange
        let locks = Arc::new(KeyedLocks::<u8>::new());
        let guard = locks.lock(&1).await;

        // Act: a second locker must wait.
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(&1).await;
            })
        };
        tokio::task::yield_now().await;

        // Assert
        assert!(!contender.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::<u8>::new();
        let _a = locks.lock(&1).await;

        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&2)).await;

        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = KeyedLocks::<u8>::new();
        for key in 0..10 {
            let _g = locks.lock(&key).await;
        }

        let _last = locks.lock(&42).await;

        assert_eq!(locks.tracked(), 1);
    }
}
