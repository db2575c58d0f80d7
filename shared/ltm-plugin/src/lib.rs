//! LTM Router Plugin
//!
//! Keeps load-balancer pools in step with the services that need them:
//! - Deterministic pool naming from service identity
//! - Idempotent pool creation and conservative deletion
//! - Endpoint-to-member synchronization
//! - Per-pool serialization for check-then-act sequences

pub mod locks;
pub mod plugin;
pub mod reconciler;

pub use locks::{PoolGuard, PoolLocks};
pub use plugin::{LtmPlugin, SyncReport};
pub use reconciler::{MemberDiff, PoolReconciler};
