//! LTM Router
//!
//! Bootstraps the load-balancer plugin for a cluster:
//! - Loads device configuration from the environment
//! - Authenticates against the device management API
//! - Registers cluster nodes as VXLAN tunnel endpoints

use ltm_core::{LtmError, Result};
use ltm_plugin::LtmPlugin;
use ltm_session::InMemoryDevice;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::RouterConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RouterConfig::from_env()?;
    init_tracing(&config)?;

    info!(
        host = %config.plugin.host,
        partition = %config.plugin.partition(),
        vteps = config.vtep_nodes.len(),
        dry_run = config.dry_run,
        "Starting LTM Router"
    );

    let plugin = if config.dry_run {
        LtmPlugin::with_session(Arc::new(InMemoryDevice::new())).await
    } else {
        LtmPlugin::new(&config.plugin).await
    };

    let plugin = match plugin {
        Ok(plugin) => plugin,
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Failed to initialize LTM plugin");
            return Err(e);
        }
    };

    let mut failed = 0;
    for node in &config.vtep_nodes {
        match plugin.add_vtep(*node).await {
            Ok(()) => info!(vtep = %node, "VTEP added"),
            Err(e) => {
                failed += 1;
                warn!(vtep = %node, error = %e, "Error adding VTEP");
            }
        }
    }

    info!(
        registered = config.vtep_nodes.len() - failed,
        failed = failed,
        "LTM Router bootstrap complete"
    );

    Ok(())
}

fn init_tracing(config: &RouterConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level))
        .add_directive(
            "ltm_router=debug"
                .parse()
                .map_err(|e| LtmError::Config(format!("Invalid log directive: {}", e)))?,
        );

    if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .map_err(|e| LtmError::Internal(format!("Tracing initialization failed: {}", e)))?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .map_err(|e| LtmError::Internal(format!("Tracing initialization failed: {}", e)))?;
    }

    Ok(())
}
