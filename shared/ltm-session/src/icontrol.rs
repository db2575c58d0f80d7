//! iControl REST session
//!
//! Talks to the device's REST management API. Resources are addressed in
//! their partition-qualified form, `~Partition~name`.

use async_trait::async_trait;
use ltm_core::{LtmError, PluginConfig, PoolMember, PoolName, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::session::DeviceSession;

/// Health monitor attached to every pool the router creates.
const POOL_MONITOR: &str = "min 1 of /Common/http /Common/https";

/// VXLAN tunnel whose forwarding database receives node VTEPs.
const VXLAN_TUNNEL: &str = "~Common~vxlan5000";

#[derive(Debug, Deserialize)]
struct MemberList {
    #[serde(default)]
    items: Vec<MemberItem>,
}

#[derive(Debug, Deserialize)]
struct MemberItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeviceErrorBody {
    message: Option<String>,
}

/// REST session against one device
pub struct IControlSession {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    partition: String,
    http_vserver: String,
    https_vserver: String,
    private_key: String,
}

impl IControlSession {
    pub fn new(config: &PluginConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| LtmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = if config.host.starts_with("http://") || config.host.starts_with("https://") {
            config.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.host)
        };

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            partition: config.partition().to_string(),
            http_vserver: config.http_vserver.clone(),
            https_vserver: config.https_vserver.clone(),
            private_key: config.private_key.clone(),
        })
    }

    fn qualified(&self, name: &str) -> String {
        format!("~{}~{}", self.partition, name)
    }

    fn pool_url(&self, pool: &PoolName) -> String {
        format!("{}/mgmt/tm/ltm/pool/{}", self.base_url, self.qualified(pool.as_str()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(transport_error)
    }

    /// Issue a GET and report whether the resource exists.
    async fn exists(&self, url: &str) -> Result<bool> {
        let response = self.send(self.client.get(url)).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }

    async fn expect_success(&self, response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }
}

fn transport_error(err: reqwest::Error) -> LtmError {
    if err.is_timeout() {
        LtmError::Timeout(err.to_string())
    } else {
        LtmError::Network(err.to_string())
    }
}

async fn status_error(response: Response) -> LtmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<DeviceErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LtmError::Auth(message),
        StatusCode::NOT_FOUND => LtmError::NotFound(message),
        _ => LtmError::device(status.as_u16(), message),
    }
}

/// FDB record name for a VTEP: `0a:0a:` followed by the address octets.
fn vtep_mac(address: Ipv4Addr) -> String {
    let [a, b, c, d] = address.octets();
    format!("0a:0a:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d)
}

#[async_trait]
impl DeviceSession for IControlSession {
    async fn initialize(&self) -> Result<()> {
        let url = format!("{}/mgmt/tm/sys/version", self.base_url);
        let response = self.send(self.client.get(&url)).await?;
        self.expect_success(response).await?;

        for vserver in [&self.http_vserver, &self.https_vserver] {
            if vserver.is_empty() {
                continue;
            }
            if !self.vserver_exists(vserver).await? {
                return Err(LtmError::Config(format!(
                    "vserver {} not found in partition {}",
                    vserver, self.partition
                )));
            }
        }

        if !self.private_key.is_empty() && !Path::new(&self.private_key).exists() {
            warn!(path = %self.private_key, "SSH private key not found, certificate upload will fail");
        }

        info!(host = %self.base_url, partition = %self.partition, "iControl session initialized");
        Ok(())
    }

    async fn pool_exists(&self, pool: &PoolName) -> Result<bool> {
        self.exists(&self.pool_url(pool)).await
    }

    async fn create_pool(&self, pool: &PoolName) -> Result<()> {
        let url = format!("{}/mgmt/tm/ltm/pool", self.base_url);
        let body = json!({
            "name": pool.as_str(),
            "partition": self.partition,
            "monitor": POOL_MONITOR,
        });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        self.expect_success(response).await?;
        debug!(pool = %pool, "Pool created");
        Ok(())
    }

    async fn delete_pool(&self, pool: &PoolName) -> Result<()> {
        let response = self.send(self.client.delete(self.pool_url(pool))).await?;
        self.expect_success(response).await?;
        debug!(pool = %pool, "Pool deleted");
        Ok(())
    }

    async fn get_pool_members(&self, pool: &PoolName) -> Result<Vec<PoolMember>> {
        let url = format!("{}/members", self.pool_url(pool));
        let response = self.send(self.client.get(&url)).await?;
        let response = self.expect_success(response).await?;

        let list: MemberList = response
            .json()
            .await
            .map_err(|e| LtmError::Protocol(format!("Invalid member list for {}: {}", pool, e)))?;

        list.items.iter().map(|item| item.name.parse()).collect()
    }

    async fn add_pool_member(&self, pool: &PoolName, member: &PoolMember) -> Result<()> {
        let url = format!("{}/members", self.pool_url(pool));
        let body = json!({
            "name": member.to_string(),
            "partition": self.partition,
        });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn delete_pool_member(&self, pool: &PoolName, member: &PoolMember) -> Result<()> {
        let url = format!(
            "{}/members/{}",
            self.pool_url(pool),
            self.qualified(&member.to_string())
        );

        let response = self.send(self.client.delete(&url)).await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn vserver_exists(&self, vserver: &str) -> Result<bool> {
        let url = format!("{}/mgmt/tm/ltm/virtual/{}", self.base_url, self.qualified(vserver));
        self.exists(&url).await
    }

    async fn add_vtep(&self, address: Ipv4Addr) -> Result<()> {
        let url = format!(
            "{}/mgmt/tm/net/fdb/tunnel/{}/records",
            self.base_url, VXLAN_TUNNEL
        );
        let body = json!({
            "name": vtep_mac(address),
            "endpoint": address.to_string(),
        });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        if response.status() == StatusCode::CONFLICT {
            debug!(vtep = %address, "VTEP already registered");
            return Ok(());
        }
        self.expect_success(response).await?;
        info!(vtep = %address, "VTEP registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vtep_mac() {
        assert_eq!(vtep_mac(Ipv4Addr::new(10, 3, 89, 172)), "0a:0a:0a:03:59:ac");
    }

    #[test]
    fn test_base_url_and_partition() {
        let mut config = PluginConfig::new("10.3.88.146", "admin", "secret");
        config.partition_path = "/Tenant".into();
        let session = IControlSession::new(&config).unwrap();

        assert_eq!(
            session.pool_url(&PoolName::new("openshift_prod_web")),
            "https://10.3.88.146/mgmt/tm/ltm/pool/~Tenant~openshift_prod_web"
        );
    }
}
