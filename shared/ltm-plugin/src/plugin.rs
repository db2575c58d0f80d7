//! Plugin façade
//!
//! Owns the device session for its whole lifetime. A plugin value only exists
//! once the session has been initialized: construction either returns a
//! ready plugin or the initialization error.

use ltm_core::{
    PluginConfig, PoolMember, PoolName, Result, ServiceEndpoints, ServiceIdentity, WatchEvent,
};
use ltm_session::{DeviceSession, IControlSession};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::locks::{PoolGuard, PoolLocks};
use crate::reconciler::PoolReconciler;

/// Outcome of handling one endpoints event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pool: PoolName,
    pub event: WatchEvent,
    pub added: Vec<PoolMember>,
    pub removed: Vec<PoolMember>,
}

/// Router plugin for one load-balancer device
pub struct LtmPlugin {
    session: Arc<dyn DeviceSession>,
    reconciler: PoolReconciler,
    locks: PoolLocks,
}

impl LtmPlugin {
    /// Connect to the device described by `config` over iControl REST.
    pub async fn new(config: &PluginConfig) -> Result<Self> {
        info!(host = %config.host, partition = %config.partition(), "Creating LTM plugin");
        let session = IControlSession::new(config)?;
        Self::with_session(Arc::new(session)).await
    }

    /// Initialize `session` and wrap it. The session is not usable by the
    /// caller if this fails.
    pub async fn with_session(session: Arc<dyn DeviceSession>) -> Result<Self> {
        session.initialize().await?;

        Ok(Self {
            reconciler: PoolReconciler::new(session.clone()),
            session,
            locks: PoolLocks::new(),
        })
    }

    pub fn pool_name(identity: &ServiceIdentity) -> PoolName {
        PoolReconciler::name_for(identity)
    }

    pub async fn ensure_pool_exists(&self, pool: &PoolName) -> Result<()> {
        self.reconciler.ensure_pool_exists(pool).await
    }

    pub async fn delete_pool(&self, pool: &PoolName) -> Result<()> {
        self.reconciler.delete_pool(pool).await
    }

    pub async fn delete_pool_if_empty(&self, pool: &PoolName) -> Result<()> {
        self.reconciler.delete_pool_if_empty(pool).await
    }

    /// Exclusive access to one pool, for callers composing their own
    /// check-then-act sequences.
    pub async fn lock_pool(&self, pool: &PoolName) -> PoolGuard {
        self.locks.acquire(pool).await
    }

    /// Apply an endpoints change to the service's pool.
    ///
    /// Added and modified endpoints make sure the pool exists and carries
    /// exactly the given members. Deleted endpoints drain the pool and remove
    /// it if nothing else added a member meanwhile. Runs under the pool lock.
    pub async fn handle_endpoints(
        &self,
        event: WatchEvent,
        endpoints: &ServiceEndpoints,
    ) -> Result<SyncReport> {
        let pool = endpoints.pool_name();
        let _guard = self.locks.acquire(&pool).await;

        debug!(
            service = %endpoints.service,
            pool = %pool,
            event = ?event,
            members = endpoints.members.len(),
            "Handling endpoints"
        );

        let diff = match event {
            WatchEvent::Added | WatchEvent::Modified => {
                self.reconciler.ensure_pool_exists(&pool).await?;
                self.reconciler
                    .sync_pool_members(&pool, &endpoints.members)
                    .await?
            }
            WatchEvent::Deleted => {
                let diff = self.reconciler.drain_pool(&pool).await?;
                self.reconciler.delete_pool_if_empty(&pool).await?;
                diff
            }
        };

        Ok(SyncReport {
            pool,
            event,
            added: diff.added,
            removed: diff.removed,
        })
    }

    pub async fn add_vtep(&self, address: Ipv4Addr) -> Result<()> {
        self.session.add_vtep(address).await
    }

    /// The device takes piecemeal updates, so there is nothing to flush.
    pub fn set_last_sync_processed(&self, _processed: bool) -> Result<()> {
        Ok(())
    }
}
