//! Per-pool serialization
//!
//! The device has no compare-and-swap, so a check-then-act sequence on a pool
//! (membership read followed by delete) is only safe if nothing else touches
//! that pool in between. `PoolLocks` hands out one exclusive lock per pool
//! name for callers to hold across such a sequence.

use dashmap::DashMap;
use ltm_core::PoolName;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<PoolName, Arc<Mutex<()>>>;

/// Exclusive access to one pool. Dropping the last guard for a pool, with
/// nobody waiting, removes its entry from the registry.
pub struct PoolGuard {
    guard: Option<OwnedMutexGuard<()>>,
    pool: PoolName,
    locks: Arc<LockMap>,
}

impl PoolGuard {
    pub fn pool(&self) -> &PoolName {
        &self.pool
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold their own clone of the lock, so the map's copy is the
        // only one left once the pool is idle.
        self.locks
            .remove_if(&self.pool, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Default)]
pub struct PoolLocks {
    locks: Arc<LockMap>,
}

impl PoolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `pool`.
    pub async fn acquire(&self, pool: &PoolName) -> PoolGuard {
        let lock = self
            .locks
            .entry(pool.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = lock.lock_owned().await;

        PoolGuard {
            guard: Some(guard),
            pool: pool.clone(),
            locks: self.locks.clone(),
        }
    }

    /// Number of pools currently locked or waited on.
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
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_pool_is_exclusive() {
        let locks = Arc::new(PoolLocks::new());
        let pool = PoolName::new("openshift_prod_web");

        let guard = locks.acquire(&pool).await;

        let waiter = {
            let locks = locks.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&pool).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_pools_do_not_block() {
        let locks = PoolLocks::new();
        let _web = locks.acquire(&PoolName::new("openshift_prod_web")).await;

        let api = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&PoolName::new("openshift_prod_api")),
        )
        .await;
        assert!(api.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_removed() {
        let locks = PoolLocks::new();
        let held = locks.acquire(&PoolName::new("openshift_prod_web")).await;
        drop(locks.acquire(&PoolName::new("openshift_prod_api")).await);

        assert_eq!(locks.len(), 1);
        assert_eq!(held.pool().as_str(), "openshift_prod_web");

        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_waiter_queued() {
        let locks = Arc::new(PoolLocks::new());
        let pool = PoolName::new("openshift_prod_web");

        let first = locks.acquire(&pool).await;
        let waiter = {
            let locks = locks.clone();
            let pool = pool.clone();
            tokio::spawn(async move { locks.acquire(&pool).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locks.len(), 1);

        drop(second);
        assert!(locks.is_empty());
    }
}
