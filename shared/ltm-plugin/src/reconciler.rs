//! Pool Reconciler
//!
//! Makes the device's pool inventory match intent for one named pool. Every
//! operation reads device state before writing it; nothing is cached, and a
//! failed read aborts the operation before any mutation.

use ltm_core::{PoolMember, PoolName, Result, ServiceIdentity};
use ltm_session::DeviceSession;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Members changed by a membership sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberDiff {
    pub added: Vec<PoolMember>,
    pub removed: Vec<PoolMember>,
}

impl MemberDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Reconciles pool existence and membership against a device session
#[derive(Clone)]
pub struct PoolReconciler {
    session: Arc<dyn DeviceSession>,
}

impl PoolReconciler {
    pub fn new(session: Arc<dyn DeviceSession>) -> Self {
        Self { session }
    }

    pub fn name_for(identity: &ServiceIdentity) -> PoolName {
        PoolName::for_service(identity)
    }

    /// Create the pool unless it already exists.
    pub async fn ensure_pool_exists(&self, pool: &PoolName) -> Result<()> {
        let exists = self.session.pool_exists(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "pool_exists failed");
            e
        })?;

        if exists {
            return Ok(());
        }

        self.session.create_pool(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "Error creating pool");
            e
        })?;

        info!(pool = %pool, "Pool created");
        Ok(())
    }

    /// Delete the pool if it exists, whatever its members.
    pub async fn delete_pool(&self, pool: &PoolName) -> Result<()> {
        let exists = self.session.pool_exists(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "pool_exists failed");
            e
        })?;

        if !exists {
            return Ok(());
        }

        self.session.delete_pool(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "Error deleting pool");
            e
        })?;

        info!(pool = %pool, "Pool deleted");
        Ok(())
    }

    /// Delete the pool only if it exists and currently has no members.
    ///
    /// The membership read and the delete are two round-trips. A member added
    /// between them is lost with the pool; callers that can race on the same
    /// pool must hold its [`crate::PoolLocks`] guard across this call.
    pub async fn delete_pool_if_empty(&self, pool: &PoolName) -> Result<()> {
        let exists = self.session.pool_exists(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "pool_exists failed");
            e
        })?;

        if !exists {
            return Ok(());
        }

        let members = self.session.get_pool_members(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "get_pool_members failed");
            e
        })?;

        // A service may still be using the pool.
        if !members.is_empty() {
            debug!(pool = %pool, members = members.len(), "Pool not empty, keeping it");
            return Ok(());
        }

        self.session.delete_pool(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "Error deleting pool");
            e
        })?;

        info!(pool = %pool, "Empty pool deleted");
        Ok(())
    }

    /// Make the pool's members exactly `desired`. The pool must exist.
    ///
    /// Stops at the first failed call; members changed before it stay changed.
    pub async fn sync_pool_members(
        &self,
        pool: &PoolName,
        desired: &[PoolMember],
    ) -> Result<MemberDiff> {
        let current: BTreeSet<PoolMember> = self
            .session
            .get_pool_members(pool)
            .await
            .map_err(|e| {
                debug!(pool = %pool, error = %e, "get_pool_members failed");
                e
            })?
            .into_iter()
            .collect();
        let desired: BTreeSet<PoolMember> = desired.iter().cloned().collect();

        let mut diff = MemberDiff::default();

        for member in current.difference(&desired) {
            self.session.delete_pool_member(pool, member).await.map_err(|e| {
                debug!(pool = %pool, member = %member, error = %e, "Error removing pool member");
                e
            })?;
            diff.removed.push(member.clone());
        }

        for member in desired.difference(&current) {
            self.session.add_pool_member(pool, member).await.map_err(|e| {
                debug!(pool = %pool, member = %member, error = %e, "Error adding pool member");
                e
            })?;
            diff.added.push(member.clone());
        }

        if !diff.is_empty() {
            info!(
                pool = %pool,
                added = diff.added.len(),
                removed = diff.removed.len(),
                "Pool members updated"
            );
        }

        Ok(diff)
    }

    /// Remove every member of the pool if it exists.
    pub async fn drain_pool(&self, pool: &PoolName) -> Result<MemberDiff> {
        let exists = self.session.pool_exists(pool).await.map_err(|e| {
            debug!(pool = %pool, error = %e, "pool_exists failed");
            e
        })?;

        if !exists {
            return Ok(MemberDiff::default());
        }

        self.sync_pool_members(pool, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltm_core::LtmError;
    use ltm_session::{InMemoryDevice, Operation};

    fn pool() -> PoolName {
        PoolName::new("openshift_prod_web")
    }

    fn setup(device: InMemoryDevice) -> (Arc<InMemoryDevice>, PoolReconciler) {
        let device = Arc::new(device);
        let reconciler = PoolReconciler::new(device.clone());
        (device, reconciler)
    }

    #[test]
    fn test_name_for() {
        let name = PoolReconciler::name_for(&ServiceIdentity::new("prod", "web"));
        assert_eq!(name, pool());
    }

    #[tokio::test]
    async fn test_ensure_pool_exists_is_idempotent() {
        let (device, reconciler) = setup(InMemoryDevice::new());

        reconciler.ensure_pool_exists(&pool()).await.unwrap();
        reconciler.ensure_pool_exists(&pool()).await.unwrap();

        assert_eq!(device.calls(Operation::CreatePool), 1);
        assert!(device.has_pool(&pool()));
    }

    #[tokio::test]
    async fn test_ensure_pool_exists_create_failure() {
        let (device, reconciler) = setup(InMemoryDevice::new());
        device.fail(Operation::CreatePool, LtmError::device(400, "invalid name"));

        let err = reconciler.ensure_pool_exists(&pool()).await.unwrap_err();
        assert_eq!(err, LtmError::device(400, "invalid name"));
        assert!(!device.has_pool(&pool()));
    }

    #[tokio::test]
    async fn test_delete_pool_absent_is_noop() {
        let (device, reconciler) = setup(InMemoryDevice::new());

        reconciler.delete_pool(&pool()).await.unwrap();
        assert_eq!(device.calls(Operation::DeletePool), 0);
    }

    #[tokio::test]
    async fn test_delete_pool_ignores_members() {
        let (device, reconciler) = setup(
            InMemoryDevice::new().with_pool(pool(), vec![PoolMember::new("10.1.0.4", 8080)]),
        );

        reconciler.delete_pool(&pool()).await.unwrap();
        assert_eq!(device.calls(Operation::DeletePool), 1);
        assert!(!device.has_pool(&pool()));
    }

    #[tokio::test]
    async fn test_delete_if_empty_keeps_pool_with_members() {
        let (device, reconciler) = setup(
            InMemoryDevice::new().with_pool(pool(), vec![PoolMember::new("10.1.0.4", 8080)]),
        );

        reconciler.delete_pool_if_empty(&pool()).await.unwrap();
        assert_eq!(device.calls(Operation::DeletePool), 0);
        assert!(device.has_pool(&pool()));
    }

    #[tokio::test]
    async fn test_delete_if_empty_deletes_empty_pool() {
        let (device, reconciler) = setup(InMemoryDevice::new().with_empty_pool(pool()));

        reconciler.delete_pool_if_empty(&pool()).await.unwrap();
        assert_eq!(device.calls(Operation::DeletePool), 1);
        assert!(!device.has_pool(&pool()));
    }

    #[tokio::test]
    async fn test_delete_if_empty_absent_skips_member_query() {
        let (device, reconciler) = setup(InMemoryDevice::new());

        reconciler.delete_pool_if_empty(&pool()).await.unwrap();
        assert_eq!(device.calls(Operation::GetPoolMembers), 0);
        assert_eq!(device.calls(Operation::DeletePool), 0);
    }

    #[tokio::test]
    async fn test_delete_if_empty_member_query_failure() {
        let (device, reconciler) = setup(InMemoryDevice::new().with_empty_pool(pool()));
        device.fail(Operation::GetPoolMembers, LtmError::Timeout("read timed out".into()));

        let err = reconciler.delete_pool_if_empty(&pool()).await.unwrap_err();
        assert_eq!(err, LtmError::Timeout("read timed out".into()));
        assert_eq!(device.calls(Operation::DeletePool), 0);
        assert!(device.has_pool(&pool()));
    }

    #[tokio::test]
    async fn test_existence_query_failure_blocks_mutation() {
        let (device, reconciler) = setup(InMemoryDevice::new().with_empty_pool(pool()));
        let fault = LtmError::Network("connection refused".into());
        device.fail(Operation::PoolExists, fault.clone());

        assert_eq!(reconciler.ensure_pool_exists(&pool()).await.unwrap_err(), fault);
        assert_eq!(reconciler.delete_pool(&pool()).await.unwrap_err(), fault);
        assert_eq!(reconciler.delete_pool_if_empty(&pool()).await.unwrap_err(), fault);

        assert_eq!(device.mutation_calls(), 0);
        assert_eq!(device.calls(Operation::GetPoolMembers), 0);
    }

    #[tokio::test]
    async fn test_sync_pool_members() {
        let (device, reconciler) = setup(InMemoryDevice::new().with_pool(
            pool(),
            vec![PoolMember::new("10.1.0.4", 8080), PoolMember::new("10.1.0.5", 8080)],
        ));

        let desired = vec![PoolMember::new("10.1.0.5", 8080), PoolMember::new("10.1.0.6", 8080)];
        let diff = reconciler.sync_pool_members(&pool(), &desired).await.unwrap();

        assert_eq!(diff.added, vec![PoolMember::new("10.1.0.6", 8080)]);
        assert_eq!(diff.removed, vec![PoolMember::new("10.1.0.4", 8080)]);
        assert_eq!(device.members(&pool()), desired);

        let again = reconciler.sync_pool_members(&pool(), &desired).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_drain_absent_pool() {
        let (device, reconciler) = setup(InMemoryDevice::new());

        let diff = reconciler.drain_pool(&pool()).await.unwrap();
        assert!(diff.is_empty());
        assert_eq!(device.calls(Operation::GetPoolMembers), 0);
    }
}
