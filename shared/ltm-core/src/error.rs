//! Error types for LTM device operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LtmError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LtmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Device rejected request ({status}): {message}")]
    Device { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LtmError {
    pub fn device(status: u16, message: impl Into<String>) -> Self {
        Self::Device {
            status,
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Device { .. } => "DEVICE_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<std::io::Error> for LtmError {
    fn from(err: std::io::Error) -> Self {
        LtmError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for LtmError {
    fn from(err: serde_json::Error) -> Self {
        LtmError::Protocol(err.to_string())
    }
}
