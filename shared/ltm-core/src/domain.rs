//! Core domain types shared by the session and plugin crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LtmError;

/// Literal prefix of every pool the router manages. Other systems look pools
/// up by this exact string.
pub const POOL_NAME_PREFIX: &str = "openshift";

/// Separator between the prefix, namespace and name of a pool.
pub const POOL_NAME_SEPARATOR: char = '_';

/// Identity of a logical service whose endpoints are balanced together
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    namespace: String,
    name: String,
}

impl ServiceIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool_name(&self) -> PoolName {
        PoolName::for_service(self)
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Name of a pool on the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolName(String);

impl PoolName {
    /// Wrap an existing pool name, e.g. one read back from the device.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the canonical pool name for a service.
    ///
    /// Pure: the same identity always yields the same name, and identities
    /// that differ in either component yield different names as long as
    /// neither component contains [`POOL_NAME_SEPARATOR`].
    pub fn for_service(identity: &ServiceIdentity) -> Self {
        Self(format!(
            "{prefix}{sep}{ns}{sep}{name}",
            prefix = POOL_NAME_PREFIX,
            sep = POOL_NAME_SEPARATOR,
            ns = identity.namespace(),
            name = identity.name(),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PoolName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Backend endpoint reference held by a pool (`address:port`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolMember {
    pub address: String,
    pub port: u16,
}

impl PoolMember {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl PoolMember {
    /// IPv6 addresses already contain `:`, so the device separates the port
    /// with `.` instead.
    fn port_separator(address: &str) -> char {
        if address.contains(':') {
            '.'
        } else {
            ':'
        }
    }
}

impl fmt::Display for PoolMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = Self::port_separator(&self.address);
        write!(f, "{}{}{}", self.address, sep, self.port)
    }
}

impl FromStr for PoolMember {
    type Err = LtmError;

    /// Accepts `10.1.1.1:8080`, `2001:db8::1.8080`, the partition-qualified
    /// `/Common/10.1.1.1:8080` form and route-domain suffixed addresses
    /// (`10.1.1.1%2:8080`). The route domain is dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LtmError::Protocol(format!("Invalid pool member: {}", s));

        let bare = s.rsplit('/').next().unwrap_or(s);
        let sep = if bare.matches(':').count() > 1 { '.' } else { ':' };
        let (address, port) = bare.rsplit_once(sep).ok_or_else(invalid)?;
        let address = address.split('%').next().unwrap_or(address);

        if address.is_empty() {
            return Err(invalid());
        }

        let port = port
            .parse()
            .map_err(|e| LtmError::Protocol(format!("Invalid pool member port in {}: {}", s, e)))?;

        Ok(Self::new(address, port))
    }
}

/// Change notification for a service's endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEvent {
    Added,
    Modified,
    Deleted,
}

/// Desired backend endpoints of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    pub service: ServiceIdentity,
    pub members: Vec<PoolMember>,
}

impl ServiceEndpoints {
    pub fn new(service: ServiceIdentity, members: Vec<PoolMember>) -> Self {
        Self { service, members }
    }

    pub fn pool_name(&self) -> PoolName {
        self.service.pool_name()
    }
}
