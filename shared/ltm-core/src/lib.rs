//! LTM Core - Shared domain types for the load-balancer router
//!
//! This crate provides:
//! - Service identity and deterministic pool naming
//! - Pool member and endpoint types
//! - Error handling utilities
//! - Plugin configuration

pub mod config;
pub mod domain;
pub mod error;

pub use config::PluginConfig;
pub use domain::*;
pub use error::{LtmError, Result};
