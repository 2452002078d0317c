//! Sluice Common Error Types
//!
//! Centralized error handling for all Sluice components

use thiserror::Error;

/// Main error type for Sluice operations
#[derive(Debug, Error)]
pub enum SluiceError {
    /// The requested agent does not exist or is not visible to the caller
    #[error("agent not found")]
    AgentNotFound,
    /// No provider configuration is registered for the agent's model provider
    #[error("provider config not found: {0}")]
    ProviderConfigNotFound(String),
    /// Caller supplied an invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
    /// Agent engine failures (model provider, execution)
    #[error("engine error: {0}")]
    Engine(String),
    #[error("tool error: {0}")]
    Tool(String),
    #[error("timed out: {0}")]
    Timeout(String),
    /// Anything else; the message is shown to clients verbatim
    #[error("{0}")]
    Internal(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SluiceError {
    /// Stable business code reported to API clients.
    pub fn code(&self) -> u32 {
        match self {
            SluiceError::AgentNotFound => 2001,
            SluiceError::ProviderConfigNotFound(_) => 2002,
            SluiceError::InvalidRequest(_) => 1001,
            SluiceError::Timeout(_) => 1002,
            SluiceError::Storage(_) => 3001,
            SluiceError::Config(_) | SluiceError::Toml(_) => 3002,
            SluiceError::Engine(_) => 4001,
            SluiceError::Tool(_) => 4002,
            SluiceError::Internal(_) | SluiceError::Io(_) | SluiceError::Serde(_) => 5000,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SluiceError::Internal(msg.into())
    }
}

impl From<anyhow::Error> for SluiceError {
    fn from(err: anyhow::Error) -> Self {
        SluiceError::Internal(err.to_string())
    }
}

/// Convenience result type for Sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;
