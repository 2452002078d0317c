//! Agent management API endpoints
//!
//! Create, read, list and update agents owned by the calling user.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use sluice_common::{AgentProfile, AgentStatus, ModelParams, Pagination, Visibility};
use tracing::info;
use uuid::Uuid;

use crate::auth::UserId;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::AgentFilter;

/// Provider and model given to agents created without one
pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Structure for creating new agents
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<AgentStatus>,
    pub icon: Option<String>,
    pub system_prompt: Option<String>,
    pub model_provider: Option<String>,
    pub model_name: Option<String>,
    pub model_parameters: Option<ModelParams>,
}

/// Partial update; absent or blank fields are left unchanged
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub system_prompt: Option<String>,
    pub model_provider: Option<String>,
    pub model_name: Option<String>,
    pub model_parameters: Option<ModelParams>,
    pub opening_dialogue: Option<String>,
    pub status: Option<AgentStatus>,
    pub visibility: Option<Visibility>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AgentUpdate {
    pub fn apply(self, agent: &mut AgentProfile) {
        if let Some(name) = non_blank(self.name) {
            agent.name = name;
        }
        if let Some(description) = non_blank(self.description) {
            agent.description = description;
        }
        if let Some(icon) = non_blank(self.icon) {
            agent.icon = icon;
        }
        if let Some(prompt) = non_blank(self.system_prompt) {
            agent.system_prompt = prompt;
        }
        if let Some(provider) = non_blank(self.model_provider) {
            agent.model_provider = provider;
        }
        if let Some(model) = non_blank(self.model_name) {
            agent.model_name = model;
        }
        if let Some(params) = self.model_parameters {
            agent.model_parameters = params;
        }
        if let Some(opening) = non_blank(self.opening_dialogue) {
            agent.opening_dialogue = opening;
        }
        if let Some(status) = self.status {
            agent.status = status;
        }
        if let Some(visibility) = self.visibility {
            agent.visibility = visibility;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAgentsQuery {
    pub name: Option<String>,
    pub status: Option<AgentStatus>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPage {
    pub agents: Vec<AgentProfile>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateToolsRequest {
    pub tools: Vec<String>,
}

/// Create a new agent
pub async fn create_agent(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateAgentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Agent name is required"));
    }
    info!(user_id = %user_id, name = %name, "creating agent");

    let mut agent = AgentProfile::new(
        user_id,
        name,
        non_blank(request.model_provider).unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        non_blank(request.model_name).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    );
    agent.description = request.description;
    agent.status = request.status.unwrap_or_default();
    agent.icon = request.icon.unwrap_or_default();
    agent.system_prompt = request.system_prompt.unwrap_or_default();
    agent.model_parameters = request.model_parameters.unwrap_or_default();

    let agent = state.agents.create(agent).await?;
    info!(agent_id = %agent.id, "agent created");
    Ok((StatusCode::CREATED, Json(agent)))
}

/// List the caller's agents
pub async fn list_agents(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(query): Query<ListAgentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = Pagination::new(query.page, query.page_size);
    let filter = AgentFilter {
        name: non_blank(query.name),
        status: query.status,
    };
    let (agents, total) = state.agents.list(user_id, &filter, page).await;
    Ok(Json(AgentPage {
        agents,
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

/// Get a specific agent by ID
pub async fn get_agent(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(agent_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = state.agents.get(user_id, agent_id).await?;
    Ok(Json(agent))
}

/// Update an existing agent
pub async fn update_agent(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(agent_id): Path<Uuid>,
    Json(update): Json<AgentUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    info!(agent_id = %agent_id, "updating agent");
    let agent = state
        .agents
        .update(user_id, agent_id, |agent| update.apply(agent))
        .await?;
    Ok(Json(agent))
}

/// Replace the tools an agent may call
pub async fn update_agent_tools(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<UpdateToolsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.tools.is_empty() {
        return Err(ApiError::bad_request("At least one tool is required"));
    }
    let unknown = state.tools.unknown(&request.tools);
    if !unknown.is_empty() {
        return Err(ApiError::bad_request(format!("Unknown tools: {}", unknown.join(", "))));
    }

    info!(agent_id = %agent_id, tools = ?request.tools, "updating agent tools");
    let tools = request.tools;
    let agent = state
        .agents
        .update(user_id, agent_id, move |agent| agent.tools = tools)
        .await?;
    Ok(Json(agent))
}

pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/agents", get(list_agents).post(create_agent))
        .route("/api/v1/agents/:id", get(get_agent).put(update_agent))
        .route("/api/v1/agents/:id/tools", put(update_agent_tools))
}
