//! Agent execution engine backed by genai
//!
//! Each query gets its own genai client, pointed at the agent's provider.
//! The engine streams model turns, runs requested tools, feeds their
//! results back, and repeats until the model answers without tool calls.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent, ToolCall, ToolResponse};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use serde_json::Value;
use sluice_common::constants::{MAX_TOOL_ROUNDS, providers};
use sluice_common::{ModelParams, Result, SluiceError};
use sluice_stream::{AgentEngine, AgentEvent, AgentEventStream, AgentSetup, ModelConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::tools::{AgentTool, ToolRegistry};

pub struct GenaiEngine {
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
}

impl GenaiEngine {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            max_rounds: MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }
}

#[async_trait]
impl AgentEngine for GenaiEngine {
    async fn start(
        &self,
        setup: AgentSetup,
        query: String,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream> {
        if setup.model.model_name.trim().is_empty() {
            return Err(SluiceError::Config(format!(
                "agent '{}' has no model configured",
                setup.agent_name
            )));
        }

        let tools = self.tools.resolve(&setup.tools);
        let client = client_for(&setup.model);
        let options = chat_options(&setup.model.params);

        let mut request =
            ChatRequest::new(vec![ChatMessage::user(query)]).with_system(system_prompt(&setup, &tools));
        if !tools.is_empty() {
            request = request.with_tools(tools.iter().map(|tool| tool.to_genai_tool()).collect::<Vec<_>>());
        }

        info!(
            agent = %setup.agent_name,
            provider = %setup.model.provider.provider,
            model = %setup.model.model_name,
            tools = tools.len(),
            "starting agent"
        );

        let agent = setup.agent_name;
        let model = setup.model.model_name;
        let max_rounds = self.max_rounds;

        Ok(Box::pin(async_stream::stream! {
            for round in 0..max_rounds {
                if cancel.is_cancelled() {
                    return;
                }
                debug!(agent = %agent, round, "requesting model turn");

                let response = match client.exec_chat_stream(&model, request.clone(), Some(&options)).await {
                    Ok(response) => response,
                    Err(err) => {
                        yield AgentEvent::system_failed(&agent, err.to_string());
                        return;
                    }
                };

                let mut events = response.stream;
                let mut calls: Vec<ToolCall> = Vec::new();
                while let Some(event) = events.next().await {
                    match event {
                        Ok(ChatStreamEvent::Chunk(chunk)) => {
                            yield AgentEvent::content(&agent, chunk.content);
                        }
                        Ok(ChatStreamEvent::ReasoningChunk(chunk)) => {
                            yield AgentEvent::reasoning(&agent, chunk.content);
                        }
                        Ok(ChatStreamEvent::ToolCallChunk(chunk)) => {
                            merge_tool_call(&mut calls, chunk.tool_call);
                        }
                        Ok(_) => {}
                        Err(err) => {
                            yield AgentEvent::step_failed(&agent, err.to_string());
                            return;
                        }
                    }
                }

                if calls.is_empty() {
                    return;
                }

                request = request.append_message(calls.clone());
                for call in calls {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let output = run_tool(&tools, &call.fn_name, call.fn_arguments.clone()).await;
                    yield AgentEvent::tool_output(&agent, &call.fn_name, output.clone());
                    request = request.append_message(ToolResponse::new(call.call_id.clone(), output));
                }
            }

            warn!(agent = %agent, max_rounds, "tool round limit reached");
            yield AgentEvent::step_failed(&agent, format!("stopped after {max_rounds} tool rounds"));
        }))
    }
}

/// Streaming providers may send the same call several times as its
/// arguments fill in; keep the latest version of each call.
fn merge_tool_call(calls: &mut Vec<ToolCall>, call: ToolCall) {
    match calls.iter_mut().find(|existing| existing.call_id == call.call_id) {
        Some(existing) => *existing = call,
        None => calls.push(call),
    }
}

async fn run_tool(tools: &[Arc<dyn AgentTool>], name: &str, arguments: Value) -> String {
    let Some(tool) = tools.iter().find(|tool| tool.name() == name) else {
        warn!(tool = %name, "model requested unknown tool");
        return format!("error: unknown tool '{name}'");
    };

    // Some providers send arguments as a JSON-encoded string.
    let arguments = match arguments {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    };

    match tool.execute(arguments).await {
        Ok(Value::String(text)) => text,
        Ok(value) => value.to_string(),
        Err(err) => {
            debug!(tool = %name, error = %err, "tool call failed");
            format!("error: {err}")
        }
    }
}

/// genai adapter for a provider name. Unknown providers are treated as
/// OpenAI-compatible (qwen and friends).
pub fn adapter_kind_for(provider: &str) -> AdapterKind {
    match provider.to_ascii_lowercase().as_str() {
        providers::OLLAMA => AdapterKind::Ollama,
        providers::ANTHROPIC => AdapterKind::Anthropic,
        providers::GEMINI => AdapterKind::Gemini,
        providers::GROQ => AdapterKind::Groq,
        providers::DEEPSEEK => AdapterKind::DeepSeek,
        _ => AdapterKind::OpenAI,
    }
}

fn default_endpoint(kind: AdapterKind) -> &'static str {
    match kind {
        AdapterKind::Ollama => "http://localhost:11434/v1/",
        AdapterKind::Anthropic => "https://api.anthropic.com/v1/",
        AdapterKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/",
        AdapterKind::Groq => "https://api.groq.com/openai/v1/",
        AdapterKind::DeepSeek => "https://api.deepseek.com/v1/",
        _ => "https://api.openai.com/v1/",
    }
}

fn default_key_env(kind: AdapterKind) -> &'static str {
    match kind {
        AdapterKind::Anthropic => "ANTHROPIC_API_KEY",
        AdapterKind::Gemini => "GEMINI_API_KEY",
        AdapterKind::Groq => "GROQ_API_KEY",
        AdapterKind::DeepSeek => "DEEPSEEK_API_KEY",
        _ => "OPENAI_API_KEY",
    }
}

/// genai expects base URLs to end with a slash.
pub fn normalize_base(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

fn client_for(model: &ModelConfig) -> Client {
    let kind = adapter_kind_for(&model.provider.provider);
    let endpoint = model
        .provider
        .api_base
        .as_deref()
        .map(normalize_base)
        .unwrap_or_else(|| default_endpoint(kind).to_string());
    let auth = match model.provider.resolve_api_key() {
        Some(key) => AuthData::from_single(key),
        None if kind == AdapterKind::Ollama => AuthData::from_single("ollama"),
        None => AuthData::from_env(default_key_env(kind)),
    };

    let resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> std::result::Result<ServiceTarget, genai::resolver::Error> {
            let ServiceTarget { model, .. } = target;
            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(endpoint.clone()),
                auth: auth.clone(),
                model: ModelIden::new(kind, model.model_name),
            })
        },
    );

    Client::builder()
        .with_service_target_resolver(resolver)
        .build()
}

/// Chat options for an agent's sampling parameters.
pub fn chat_options(params: &ModelParams) -> ChatOptions {
    ChatOptions {
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        top_p: params.top_p,
        capture_content: Some(true),
        capture_reasoning_content: Some(true),
        capture_tool_calls: Some(true),
        ..Default::default()
    }
}

/// The agent's instruction followed by a catalog of its tools.
pub fn system_prompt(setup: &AgentSetup, tools: &[Arc<dyn AgentTool>]) -> String {
    let mut prompt = if setup.instruction.trim().is_empty() {
        format!("You are {}, a helpful assistant.", setup.agent_name)
    } else {
        setup.instruction.trim().to_string()
    };
    if !setup.description.trim().is_empty() {
        prompt.push_str(&format!("\n\nAbout you: {}", setup.description.trim()));
    }
    if !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:");
        for tool in tools {
            prompt.push_str(&format!("\n- {}: {}", tool.name(), tool.description()));
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use sluice_common::{AgentProfile, ProviderConfig};
    use uuid::Uuid;

    fn setup(tools: &[&str]) -> AgentSetup {
        let mut agent = AgentProfile::new(Uuid::new_v4(), "mathy", "ollama", "qwen3:8b");
        agent.system_prompt = "Answer with numbers.".to_string();
        agent.tools = tools.iter().map(|t| t.to_string()).collect();
        AgentSetup::new(&agent, ProviderConfig::new("ollama"))
    }

    #[test]
    fn maps_providers_to_adapters() {
        assert_eq!(adapter_kind_for("ollama"), AdapterKind::Ollama);
        assert_eq!(adapter_kind_for("Anthropic"), AdapterKind::Anthropic);
        assert_eq!(adapter_kind_for("qwen"), AdapterKind::OpenAI);
        assert_eq!(adapter_kind_for("openai"), AdapterKind::OpenAI);
    }

    #[test]
    fn forwards_sampling_parameters() {
        let options = chat_options(&ModelParams {
            max_tokens: Some(256),
            temperature: Some(0.2),
            top_p: None,
        });
        assert_eq!(options.max_tokens, Some(256));
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.top_p, None);
        assert_eq!(options.capture_tool_calls, Some(true));
    }

    #[test]
    fn system_prompt_lists_tools() {
        let registry = ToolRegistry::with_builtins();
        let setup = setup(&["calculator"]);
        let prompt = system_prompt(&setup, &registry.resolve(&setup.tools));
        assert!(prompt.starts_with("Answer with numbers."));
        assert!(prompt.contains("- calculator: "));
        assert!(!prompt.contains("current_time"));
    }

    #[test]
    fn base_urls_get_trailing_slash() {
        assert_eq!(normalize_base("http://localhost:11434/v1"), "http://localhost:11434/v1/");
        assert_eq!(normalize_base("https://x/v1/"), "https://x/v1/");
    }

    #[tokio::test]
    async fn runs_tools_with_string_encoded_arguments() {
        let tools = ToolRegistry::with_builtins().resolve(&["calculator".to_string()]);
        let output = run_tool(&tools, "calculator", json!("{\"expression\": \"1 + 2\"}")).await;
        assert_eq!(output, "3.0");

        let missing = run_tool(&tools, "weather", json!({})).await;
        assert!(missing.starts_with("error: unknown tool"));

        let failed = run_tool(&tools, "calculator", json!({"expression": "1 / 0"})).await;
        assert!(failed.starts_with("error: "));
    }

    #[tokio::test]
    async fn rejects_agent_without_model() {
        let engine = GenaiEngine::new(Arc::new(ToolRegistry::with_builtins()));
        let mut setup = setup(&[]);
        setup.model.model_name = String::new();
        let result = engine.start(setup, "hi".into(), CancellationToken::new()).await;
        assert!(matches!(result, Err(SluiceError::Config(_))));
    }
}
