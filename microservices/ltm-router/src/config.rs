//! LTM Router Configuration

use ltm_core::{LtmError, PluginConfig, Result};
use std::net::Ipv4Addr;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub plugin: PluginConfig,
    /// Nodes to register as VXLAN tunnel endpoints at startup.
    pub vtep_nodes: Vec<Ipv4Addr>,
    /// Run against an in-memory device instead of the real one.
    pub dry_run: bool,
    pub json_logs: bool,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl RouterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(default)
        };

        Ok(Self {
            vtep_nodes: parse_nodes(&lookup("LTM_VTEP_NODES").unwrap_or_default())?,
            dry_run: flag("LTM_DRY_RUN", false),
            json_logs: flag("JSON_LOGS", true),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            plugin: PluginConfig::from_lookup(&lookup)?,
        })
    }
}

fn parse_nodes(raw: &str) -> Result<Vec<Ipv4Addr>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e| LtmError::Config(format!("Invalid LTM_VTEP_NODES entry {}: {}", s, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_router_config() {
        let config = RouterConfig::from_lookup(lookup_from(&[
            ("LTM_HOST", "10.3.88.146"),
            ("LTM_USERNAME", "admin"),
            ("LTM_PASSWORD", "secret"),
            ("LTM_VTEP_NODES", "10.3.89.172, 10.3.89.173"),
            ("LTM_DRY_RUN", "1"),
        ]))
        .unwrap();

        assert_eq!(
            config.vtep_nodes,
            vec![Ipv4Addr::new(10, 3, 89, 172), Ipv4Addr::new(10, 3, 89, 173)]
        );
        assert!(config.dry_run);
        assert!(config.json_logs);
        assert_eq!(config.plugin.username, "admin");
    }

    #[test]
    fn test_log_level_ignores_rust_log() {
        let base = [
            ("LTM_HOST", "10.3.88.146"),
            ("LTM_USERNAME", "admin"),
            ("LTM_PASSWORD", "secret"),
        ];

        let config = RouterConfig::from_lookup(lookup_from(&base)).unwrap();
        assert_eq!(config.log_level, "info");

        let mut vars = base.to_vec();
        vars.push(("RUST_LOG", "trace"));
        vars.push(("LOG_LEVEL", "warn"));
        let config = RouterConfig::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_vtep_node() {
        let err = RouterConfig::from_lookup(lookup_from(&[
            ("LTM_HOST", "10.3.88.146"),
            ("LTM_USERNAME", "admin"),
            ("LTM_PASSWORD", "secret"),
            ("LTM_VTEP_NODES", "10.3.89.172,node-b"),
        ]))
        .unwrap_err();

        assert!(matches!(err, LtmError::Config(_)));
    }

    #[test]
    fn test_no_vtep_nodes() {
        assert!(parse_nodes("").unwrap().is_empty());
    }
}
