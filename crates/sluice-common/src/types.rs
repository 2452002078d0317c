//! Domain records shared by the stream orchestrator and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Publication state of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Draft => write!(f, "draft"),
            AgentStatus::Published => write!(f, "published"),
            AgentStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Who may discover an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Public,
    LinkOnly,
}

/// Sampling parameters forwarded to the model provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// A persisted agent definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub system_prompt: String,
    pub model_provider: String,
    pub model_name: String,
    #[serde(default)]
    pub model_parameters: ModelParams,
    #[serde(default)]
    pub opening_dialogue: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub visibility: Visibility,
    /// Names of registered tools the agent may call
    #[serde(default)]
    pub tools: Vec<String>,
    pub version: u32,
    #[serde(default)]
    pub invocation_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentProfile {
    /// Create a draft agent owned by `creator_id`.
    pub fn new(creator_id: Uuid, name: impl Into<String>, model_provider: impl Into<String>, model_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_id,
            name: name.into(),
            description: String::new(),
            icon: String::new(),
            system_prompt: String::new(),
            model_provider: model_provider.into(),
            model_name: model_name.into(),
            model_parameters: ModelParams::default(),
            opening_dialogue: String::new(),
            status: AgentStatus::Draft,
            visibility: Visibility::Private,
            tools: Vec::new(),
            version: 1,
            invocation_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 1-based page request, clamped to sane bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(page: Option<usize>, page_size: Option<usize>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_clamps_and_offsets() {
        let page = Pagination::new(Some(0), Some(10_000));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination::new(Some(3), Some(5));
        assert_eq!(page.offset(), 10);
    }

    #[test]
    fn profile_serializes_camel_case() {
        let mut agent = AgentProfile::new(Uuid::new_v4(), "helper", "ollama", "qwen3:8b");
        agent.visibility = Visibility::LinkOnly;
        let value = serde_json::to_value(&agent).unwrap();
        assert_eq!(value["modelProvider"], "ollama");
        assert_eq!(value["visibility"], "link_only");
        assert_eq!(value["status"], "draft");
        assert!(value["modelParameters"].as_object().unwrap().is_empty());
    }
}
