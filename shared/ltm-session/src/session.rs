//! Device session contract

use async_trait::async_trait;
use ltm_core::{PoolMember, PoolName, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Remote calls a device session can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Initialize,
    PoolExists,
    CreatePool,
    DeletePool,
    GetPoolMembers,
    AddPoolMember,
    DeletePoolMember,
    VserverExists,
    AddVtep,
}

impl Operation {
    /// Whether the call changes device configuration.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::CreatePool
                | Self::DeletePool
                | Self::AddPoolMember
                | Self::DeletePoolMember
                | Self::AddVtep
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialize => "initialize",
            Self::PoolExists => "pool_exists",
            Self::CreatePool => "create_pool",
            Self::DeletePool => "delete_pool",
            Self::GetPoolMembers => "get_pool_members",
            Self::AddPoolMember => "add_pool_member",
            Self::DeletePoolMember => "delete_pool_member",
            Self::VserverExists => "vserver_exists",
            Self::AddVtep => "add_vtep",
        };
        f.write_str(name)
    }
}

/// Authenticated handle to one load-balancer device.
///
/// Every method is a single remote call and may fail with a network,
/// authentication or device error. Implementations are not assumed to be safe
/// for concurrent check-then-act sequences on the same pool; callers serialize
/// those themselves.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Authenticate and verify the device is usable. Called exactly once,
    /// before any other method.
    async fn initialize(&self) -> Result<()>;

    async fn pool_exists(&self, pool: &PoolName) -> Result<bool>;

    async fn create_pool(&self, pool: &PoolName) -> Result<()>;

    async fn delete_pool(&self, pool: &PoolName) -> Result<()>;

    async fn get_pool_members(&self, pool: &PoolName) -> Result<Vec<PoolMember>>;

    async fn add_pool_member(&self, pool: &PoolName, member: &PoolMember) -> Result<()>;

    async fn delete_pool_member(&self, pool: &PoolName, member: &PoolMember) -> Result<()>;

    async fn vserver_exists(&self, vserver: &str) -> Result<bool>;

    /// Register a node as a VXLAN tunnel endpoint.
    async fn add_vtep(&self, address: Ipv4Addr) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations() {
        assert!(Operation::CreatePool.is_mutation());
        assert!(Operation::DeletePool.is_mutation());
        assert!(!Operation::PoolExists.is_mutation());
        assert!(!Operation::GetPoolMembers.is_mutation());
    }

    #[test]
    fn test_operation_display_matches_serde() {
        let json = serde_json::to_string(&Operation::GetPoolMembers).unwrap();
        assert_eq!(json, format!("\"{}\"", Operation::GetPoolMembers));
    }
}
