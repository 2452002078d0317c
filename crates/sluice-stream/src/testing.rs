//! Scripted collaborators for exercising sessions without a model provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sluice_common::{AgentProfile, ProviderConfig, Result, SluiceError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::encoder::{FrameSink, WireError};
use crate::engine::{
    AgentDirectory, AgentEngine, AgentEvent, AgentEventStream, AgentSetup, ProviderDirectory,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One step of a scripted engine run.
#[derive(Debug, Clone)]
pub enum Step {
    Emit(AgentEvent),
    Sleep(Duration),
    Panic(String),
    /// Never finishes; only cancellation ends the session.
    Hang,
}

/// Engine that replays a fixed script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    steps: Vec<Step>,
    start_error: Option<String>,
    runs: Arc<Mutex<Vec<(AgentSetup, String, CancellationToken)>>>,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn emitting(events: impl IntoIterator<Item = AgentEvent>) -> Self {
        Self::new(events.into_iter().map(Step::Emit).collect())
    }

    pub fn failing_start(message: impl Into<String>) -> Self {
        Self {
            start_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queries this engine was started with, in order.
    pub fn queries(&self) -> Vec<String> {
        lock(&self.runs).iter().map(|(_, query, _)| query.clone()).collect()
    }

    pub fn setups(&self) -> Vec<AgentSetup> {
        lock(&self.runs).iter().map(|(setup, _, _)| setup.clone()).collect()
    }

    /// Cancellation token handed to the most recent run.
    pub fn last_token(&self) -> Option<CancellationToken> {
        lock(&self.runs).last().map(|(_, _, token)| token.clone())
    }
}

#[async_trait]
impl AgentEngine for ScriptedEngine {
    async fn start(&self, setup: AgentSetup, query: String, cancel: CancellationToken) -> Result<AgentEventStream> {
        if let Some(message) = &self.start_error {
            return Err(SluiceError::Engine(message.clone()));
        }
        lock(&self.runs).push((setup, query, cancel));

        let steps = self.steps.clone();
        Ok(Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    Step::Emit(event) => yield event,
                    Step::Sleep(duration) => tokio::time::sleep(duration).await,
                    Step::Panic(message) => panic!("{message}"),
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        }))
    }
}

/// Sink that records every frame with the time it was written.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<(Instant, String)>>>,
    fail_after: Option<usize>,
    stall_after: Option<usize>,
    gone: CancellationToken,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` frames, then fail every write.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// Accept `count` frames, then block every write until the client
    /// disconnects, like a connected client that stopped reading.
    pub fn stalling_after(count: usize) -> Self {
        Self {
            stall_after: Some(count),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<String> {
        lock(&self.frames).iter().map(|(_, frame)| frame.clone()).collect()
    }

    pub fn timed_frames(&self) -> Vec<(Instant, String)> {
        lock(&self.frames).clone()
    }

    /// Concatenated wire output.
    pub fn transcript(&self) -> String {
        self.frames().concat()
    }

    /// Simulate the client hanging up.
    pub fn disconnect(&self) {
        self.gone.cancel();
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn write_frame(&mut self, frame: Bytes) -> std::result::Result<(), WireError> {
        if self.gone.is_cancelled() {
            return Err(WireError::Closed);
        }
        let stalled = {
            let mut frames = lock(&self.frames);
            if self.fail_after.is_some_and(|limit| frames.len() >= limit) {
                return Err(WireError::Closed);
            }
            if self.stall_after.is_some_and(|limit| frames.len() >= limit) {
                true
            } else {
                frames.push((Instant::now(), String::from_utf8_lossy(&frame).into_owned()));
                false
            }
        };
        if stalled {
            self.gone.cancelled().await;
            return Err(WireError::Closed);
        }
        Ok(())
    }

    async fn closed(&self) {
        self.gone.cancelled().await
    }
}

/// Fixed set of agents, visible to their creators only.
#[derive(Debug, Clone, Default)]
pub struct StaticAgents {
    agents: HashMap<Uuid, AgentProfile>,
    delay: Option<Duration>,
}

impl StaticAgents {
    pub fn new(agents: impl IntoIterator<Item = AgentProfile>) -> Self {
        Self {
            agents: agents.into_iter().map(|agent| (agent.id, agent)).collect(),
            delay: None,
        }
    }

    /// Answer every lookup after `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AgentDirectory for StaticAgents {
    async fn find_agent(&self, user_id: Uuid, agent_id: Uuid) -> Result<Option<AgentProfile>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .agents
            .get(&agent_id)
            .filter(|agent| agent.creator_id == user_id)
            .cloned())
    }
}

/// Provider directory with default settings for each named provider.
#[derive(Debug, Clone, Default)]
pub struct StaticProviders {
    providers: HashMap<String, ProviderConfig>,
}

impl StaticProviders {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            providers: names
                .into_iter()
                .map(|name| (name.to_string(), ProviderConfig::new(name)))
                .collect(),
        }
    }
}

#[async_trait]
impl ProviderDirectory for StaticProviders {
    async fn find_provider(&self, provider: &str) -> Result<Option<ProviderConfig>> {
        Ok(self.providers.get(provider).cloned())
    }
}

/// An agent named "helper" on the "openai" provider, owned by `creator_id`.
pub fn sample_agent(creator_id: Uuid) -> AgentProfile {
    let mut agent = AgentProfile::new(creator_id, "helper", "openai", "gpt-4o-mini");
    agent.system_prompt = "You are a helpful assistant.".to_string();
    agent
}
