//! In-memory agent records and the provider directory.

use std::collections::HashMap;

use async_trait::async_trait;
use sluice_common::{AgentProfile, AgentStatus, Pagination, ProviderConfig, Result, SluiceError};
use sluice_stream::{AgentDirectory, ProviderDirectory};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Filter for listing agents
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    /// Case-insensitive substring of the agent name
    pub name: Option<String>,
    pub status: Option<AgentStatus>,
}

impl AgentFilter {
    fn matches(&self, agent: &AgentProfile) -> bool {
        let name_ok = self.name.as_deref().is_none_or(|needle| {
            agent.name.to_lowercase().contains(&needle.to_lowercase())
        });
        let status_ok = self.status.is_none_or(|status| agent.status == status);
        name_ok && status_ok
    }
}

/// Agents keyed by id. Every read and write is scoped to the creator.
#[derive(Debug, Default)]
pub struct InMemoryAgentStore {
    agents: RwLock<HashMap<Uuid, AgentProfile>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: impl IntoIterator<Item = AgentProfile>) -> Self {
        Self {
            agents: RwLock::new(agents.into_iter().map(|agent| (agent.id, agent)).collect()),
        }
    }

    pub async fn create(&self, agent: AgentProfile) -> Result<AgentProfile> {
        let mut agents = self.agents.write().await;
        let duplicate = agents
            .values()
            .any(|existing| existing.creator_id == agent.creator_id && existing.name == agent.name);
        if duplicate {
            return Err(SluiceError::InvalidRequest(format!(
                "agent named '{}' already exists",
                agent.name
            )));
        }
        agents.insert(agent.id, agent.clone());
        debug!(agent_id = %agent.id, "agent stored");
        Ok(agent)
    }

    pub async fn get(&self, user_id: Uuid, agent_id: Uuid) -> Result<AgentProfile> {
        self.agents
            .read()
            .await
            .get(&agent_id)
            .filter(|agent| agent.creator_id == user_id)
            .cloned()
            .ok_or(SluiceError::AgentNotFound)
    }

    /// One page of the user's agents, newest first, plus the total match count.
    pub async fn list(&self, user_id: Uuid, filter: &AgentFilter, page: Pagination) -> (Vec<AgentProfile>, usize) {
        let agents = self.agents.read().await;
        let mut matching: Vec<&AgentProfile> = agents
            .values()
            .filter(|agent| agent.creator_id == user_id && filter.matches(agent))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .cloned()
            .collect();
        (items, total)
    }

    /// Apply `change` to the user's agent and bump its update time.
    pub async fn update<F>(&self, user_id: Uuid, agent_id: Uuid, change: F) -> Result<AgentProfile>
    where
        F: FnOnce(&mut AgentProfile),
    {
        let mut agents = self.agents.write().await;
        let agent = agents
            .get_mut(&agent_id)
            .filter(|agent| agent.creator_id == user_id)
            .ok_or(SluiceError::AgentNotFound)?;
        change(agent);
        agent.touch();
        Ok(agent.clone())
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentStore {
    async fn find_agent(&self, user_id: Uuid, agent_id: Uuid) -> Result<Option<AgentProfile>> {
        match self.get(user_id, agent_id).await {
            Ok(agent) => Ok(Some(agent)),
            Err(SluiceError::AgentNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Provider configuration from the server config, keyed by provider name
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new(providers: impl IntoIterator<Item = ProviderConfig>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| (provider.provider.clone(), provider))
                .collect(),
        }
    }

    /// All providers with secrets redacted, sorted by name.
    pub fn redacted(&self) -> Vec<ProviderConfig> {
        let mut providers: Vec<ProviderConfig> =
            self.providers.values().map(ProviderConfig::redacted).collect();
        providers.sort_by(|a, b| a.provider.cmp(&b.provider));
        providers
    }
}

#[async_trait]
impl ProviderDirectory for ProviderRegistry {
    async fn find_provider(&self, provider: &str) -> Result<Option<ProviderConfig>> {
        Ok(self.providers.get(provider).cloned())
    }
}
