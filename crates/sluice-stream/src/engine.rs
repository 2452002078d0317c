//! Boundary between the orchestrator and the agent execution engine.
//!
//! The engine, the agent store and the provider store are external
//! collaborators. They are injected into the session controller as trait
//! objects so the orchestrator can be driven by scripted fakes in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use sluice_common::{AgentProfile, ModelParams, ProviderConfig, Result};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Event produced by the engine while it answers a query.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Output of one agent step. Either fragment may be empty.
    Output {
        agent_name: String,
        tool_name: Option<String>,
        content: String,
        reasoning_content: String,
    },
    /// A step or the engine itself failed.
    Failed {
        agent_name: String,
        failure: Failure,
    },
}

impl AgentEvent {
    pub fn content(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        AgentEvent::Output {
            agent_name: agent_name.into(),
            tool_name: None,
            content: content.into(),
            reasoning_content: String::new(),
        }
    }

    pub fn reasoning(agent_name: impl Into<String>, reasoning: impl Into<String>) -> Self {
        AgentEvent::Output {
            agent_name: agent_name.into(),
            tool_name: None,
            content: String::new(),
            reasoning_content: reasoning.into(),
        }
    }

    pub fn tool_output(agent_name: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        AgentEvent::Output {
            agent_name: agent_name.into(),
            tool_name: Some(tool_name.into()),
            content: content.into(),
            reasoning_content: String::new(),
        }
    }

    pub fn step_failed(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        AgentEvent::Failed {
            agent_name: agent_name.into(),
            failure: Failure::Step(message.into()),
        }
    }

    pub fn system_failed(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        AgentEvent::Failed {
            agent_name: agent_name.into(),
            failure: Failure::System(message.into()),
        }
    }
}

/// Classification of an engine failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Attributable to a single agent step; shown in-band and the stream
    /// still completes.
    Step(String),
    /// The engine cannot continue; the session fails.
    System(String),
}

/// Lazy, ordered, non-restartable sequence of engine events.
pub type AgentEventStream = BoxStream<'static, AgentEvent>;

/// Resolved model configuration for one session.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: ProviderConfig,
    pub model_name: String,
    pub params: ModelParams,
}

/// Everything the engine needs to build the agent for one query.
#[derive(Debug, Clone)]
pub struct AgentSetup {
    pub agent_name: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<String>,
    pub model: ModelConfig,
}

impl AgentSetup {
    pub fn new(agent: &AgentProfile, provider: ProviderConfig) -> Self {
        Self {
            agent_name: agent.name.clone(),
            description: agent.description.clone(),
            instruction: agent.system_prompt.clone(),
            tools: agent.tools.clone(),
            model: ModelConfig {
                provider,
                model_name: agent.model_name.clone(),
                params: agent.model_parameters.clone(),
            },
        }
    }
}

/// The agent execution engine.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Build the agent described by `setup` and start answering `query`.
    ///
    /// Failing here is an upstream failure: nothing has been streamed yet.
    /// The engine should stop promptly once `cancel` fires.
    async fn start(
        &self,
        setup: AgentSetup,
        query: String,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream>;
}

/// Read access to agent records.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Fetch an agent visible to `user_id`. `Ok(None)` when there is none.
    async fn find_agent(&self, user_id: Uuid, agent_id: Uuid) -> Result<Option<AgentProfile>>;
}

/// Read access to model provider configuration.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn find_provider(&self, provider: &str) -> Result<Option<ProviderConfig>>;
}

/// One client query against one agent.
#[derive(Debug, Clone)]
pub struct AgentQuery {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: Uuid,
    pub message: String,
}
