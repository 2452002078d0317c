//! Configuration types and utilities for Sluice

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::constants::{
    DATA_QUEUE_CAPACITY, ERROR_QUEUE_CAPACITY, HEARTBEAT_INTERVAL_SECS, timeouts,
};
use crate::error::{Result, SluiceError};
use crate::types::{AgentProfile, ModelParams};

/// Server configuration, loaded from TOML and overridden by CLI flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Upper bound for every non-streaming request
    pub request_timeout_secs: u64,
    /// Value of `Access-Control-Allow-Origin` on stream responses
    pub cors_origin: String,
    pub providers: Vec<ProviderConfig>,
    pub agents: Vec<AgentSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            request_timeout_secs: timeouts::DEFAULT_REQUEST_TIMEOUT,
            cors_origin: "*".to_string(),
            providers: Vec::new(),
            agents: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SluiceError::Config(format!("reading {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&raw)?;
        debug!(
            path = %path.display(),
            providers = config.providers.len(),
            agents = config.agents.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.provider.trim().is_empty() {
                return Err(SluiceError::Config("provider name must not be empty".into()));
            }
            if !seen.insert(provider.provider.as_str()) {
                return Err(SluiceError::Config(format!(
                    "provider '{}' configured twice",
                    provider.provider
                )));
            }
        }
        Ok(())
    }
}

/// Connection details for one model provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (e.g., "openai", "ollama", "qwen")
    pub provider: String,
    /// Base URL for API (optional, uses provider default)
    #[serde(default)]
    pub api_base: Option<String>,
    /// API key (optional, see `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_base: None,
            api_key: None,
            api_key_env: None,
        }
    }

    /// Explicit key first, then the named environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|name| std::env::var(name).ok())
        })
    }

    /// Copy safe to show to clients.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        }
    }
}

/// Agent declared in the config file and loaded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSeed {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
    pub model_provider: String,
    pub model_name: String,
    #[serde(default)]
    pub model_parameters: ModelParams,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl From<AgentSeed> for AgentProfile {
    fn from(seed: AgentSeed) -> Self {
        let mut profile = AgentProfile::new(
            seed.creator_id,
            seed.name,
            seed.model_provider,
            seed.model_name,
        );
        profile.id = seed.id;
        profile.description = seed.description;
        profile.system_prompt = seed.system_prompt;
        profile.model_parameters = seed.model_parameters;
        profile.tools = seed.tools;
        profile
    }
}

/// Per-session stream tunables. Fixed in production; tests shrink them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub heartbeat_interval: Duration,
    pub data_capacity: usize,
    pub error_capacity: usize,
    pub lookup_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
            data_capacity: DATA_QUEUE_CAPACITY,
            error_capacity: ERROR_QUEUE_CAPACITY,
            lookup_timeout: Duration::from_secs(timeouts::LOOKUP_TIMEOUT),
        }
    }
}
