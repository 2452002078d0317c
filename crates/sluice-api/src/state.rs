//! Shared state for all API endpoints

use std::sync::Arc;

use axum::http::HeaderValue;
use sluice_common::{AgentProfile, Result, ServerConfig, SluiceError};
use sluice_llm::ToolRegistry;
use sluice_stream::{AgentEngine, SessionController};
use tokio_util::sync::CancellationToken;

use crate::store::{InMemoryAgentStore, ProviderRegistry};

#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<InMemoryAgentStore>,
    pub providers: Arc<ProviderRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub sessions: SessionController,
    /// Cancelled on server shutdown; parent of every session's signal
    pub shutdown: CancellationToken,
    pub cors_origin: HeaderValue,
}

impl AppState {
    pub fn new(config: &ServerConfig, engine: Arc<dyn AgentEngine>, tools: Arc<ToolRegistry>) -> Result<Self> {
        let cors_origin = HeaderValue::from_str(&config.cors_origin)
            .map_err(|_| SluiceError::Config(format!("invalid cors_origin '{}'", config.cors_origin)))?;

        let agents = Arc::new(InMemoryAgentStore::with_agents(
            config.agents.iter().cloned().map(AgentProfile::from),
        ));
        let providers = Arc::new(ProviderRegistry::new(config.providers.iter().cloned()));
        let sessions = SessionController::new(engine, agents.clone(), providers.clone());

        Ok(Self {
            agents,
            providers,
            tools,
            sessions,
            shutdown: CancellationToken::new(),
            cors_origin,
        })
    }
}
