//! HTTP-level tests for agent management and answer streaming.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sluice_api::{AppState, router};
use sluice_common::ServerConfig;
use sluice_llm::ToolRegistry;
use sluice_stream::AgentEvent;
use sluice_stream::testing::{ScriptedEngine, Step};
use tower::ServiceExt;

const OWNER: &str = "0b8f5d0e-1d55-4c55-8d36-2a0c6f3f7a01";
const AGENT: &str = "6f1c1c2a-3f44-4f4c-9a8e-0d6a4c1f2b11";

fn config() -> ServerConfig {
    ServerConfig::from_toml(&format!(
        r#"
[[providers]]
provider = "ollama"
api_base = "http://localhost:11434/v1/"
api_key = "not-shown"

[[agents]]
id = "{AGENT}"
creator_id = "{OWNER}"
name = "helper"
model_provider = "ollama"
model_name = "qwen3:8b"
tools = ["calculator"]
"#
    ))
    .unwrap()
}

fn test_app(engine: ScriptedEngine) -> Router {
    let state = AppState::new(
        &config(),
        Arc::new(engine),
        Arc::new(ToolRegistry::with_builtins()),
    )
    .unwrap();
    router(state, Duration::from_secs(10))
}

fn message_request(agent_id: &str, message: &str) -> Request<Body> {
    Request::post("/api/v1/agents/message")
        .header("content-type", "application/json")
        .header("x-user-id", OWNER)
        .body(Body::from(
            json!({ "agentId": agent_id, "message": message }).to_string(),
        ))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", OWNER)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn stream_sets_event_stream_headers_and_completes() {
    let app = test_app(ScriptedEngine::emitting([AgentEvent::content("helper", "Hello")]));

    let response = app.oneshot(message_request(AGENT, "hi")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::CONNECTION], "keep-alive");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let text = body_text(response).await;
    let (data, rest) = text.split_once("\n\n").unwrap();
    let payload: Value = serde_json::from_str(data.strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(
        payload,
        json!({
            "action": "agent_answer",
            "agentName": "helper",
            "toolName": "",
            "isErr": false,
            "content": "Hello",
            "reasoningContent": "",
        })
    );
    assert_eq!(rest, "[DONE]\n");
}

#[tokio::test]
async fn stream_resolves_agent_and_provider_for_engine() {
    let engine = ScriptedEngine::emitting([AgentEvent::content("helper", "ok")]);
    let app = test_app(engine.clone());

    let response = app.oneshot(message_request(AGENT, "2 + 2?")).await.unwrap();
    body_text(response).await;

    let setups = engine.setups();
    assert_eq!(setups.len(), 1);
    assert_eq!(setups[0].agent_name, "helper");
    assert_eq!(setups[0].tools, vec!["calculator".to_string()]);
    assert_eq!(setups[0].model.model_name, "qwen3:8b");
    assert_eq!(
        setups[0].model.provider.api_base.as_deref(),
        Some("http://localhost:11434/v1/")
    );
    assert_eq!(engine.queries(), vec!["2 + 2?".to_string()]);
}

#[tokio::test]
async fn unknown_agent_streams_single_error_line() {
    let app = test_app(ScriptedEngine::default());

    let response = app
        .oneshot(message_request("11111111-2222-4333-8444-555555555555", "hi"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "error: [ERROR]agent not found\n\n");
}

#[tokio::test]
async fn engine_failure_ends_with_error_and_no_done() {
    let app = test_app(ScriptedEngine::emitting([
        AgentEvent::content("helper", "partial"),
        AgentEvent::system_failed("helper", "upstream closed"),
    ]));

    let text = body_text(app.oneshot(message_request(AGENT, "hi")).await.unwrap()).await;

    assert!(text.starts_with("data: "));
    assert!(text.ends_with("upstream closed\n\n"));
    assert!(text.contains("\n\nerror: [ERROR]"));
    assert!(!text.contains("[DONE]"));
}

#[tokio::test]
async fn empty_message_is_rejected_before_streaming() {
    let app = test_app(ScriptedEngine::default());

    let response = app.oneshot(message_request(AGENT, "   ")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 1001);
}

#[tokio::test]
async fn missing_user_identity_is_unauthorized() {
    let app = test_app(ScriptedEngine::default());

    let response = app
        .oneshot(
            Request::post("/api/v1/agents/message")
                .header("content-type", "application/json")
                .body(Body::from(json!({"agentId": AGENT, "message": "hi"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dropping_the_response_cancels_the_engine() {
    let engine = ScriptedEngine::new(vec![
        Step::Emit(AgentEvent::content("helper", "first")),
        Step::Hang,
    ]);
    let app = test_app(engine.clone());

    let response = app.oneshot(message_request(AGENT, "hi")).await.unwrap();
    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    assert!(first.starts_with(b"data: "));
    drop(body);

    let token = engine.last_token().expect("engine started");
    tokio::time::timeout(Duration::from_secs(1), token.cancelled())
        .await
        .expect("engine should be cancelled after the client hangs up");
}

// ============================================================================
// Agent management
// ============================================================================

#[tokio::test]
async fn create_get_update_and_list_agents() {
    let app = test_app(ScriptedEngine::default());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/agents",
            json!({"name": "poet", "description": "writes verse"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["status"], "draft");
    assert_eq!(created["modelProvider"], "openai");
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/agents/{id}"),
            json!({"status": "published", "description": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["status"], "published");
    assert_eq!(updated["description"], "writes verse");

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/agents/{id}"))
                .header("x-user-id", OWNER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["name"], "poet");

    let response = app
        .oneshot(
            Request::get("/api/v1/agents?status=published&pageSize=10")
                .header("x-user-id", OWNER)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["pageSize"], 10);
    assert_eq!(page["agents"][0]["name"], "poet");
}

#[tokio::test]
async fn other_users_cannot_read_an_agent() {
    let app = test_app(ScriptedEngine::default());

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/agents/{AGENT}"))
                .header("x-user-id", "9d7a43f6-5ab2-4d17-8f70-3a8d3a6c9e10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], 2001);
}

#[tokio::test]
async fn tool_updates_are_validated() {
    let app = test_app(ScriptedEngine::default());
    let uri = format!("/api/v1/agents/{AGENT}/tools");

    let response = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({"tools": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({"tools": ["weather"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request("PUT", &uri, json!({"tools": ["calculator", "current_time"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["tools"],
        json!(["calculator", "current_time"])
    );
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn catalog_endpoints() {
    let app = test_app(ScriptedEngine::default());

    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "ok");

    let response = app
        .clone()
        .oneshot(Request::get("/api/v1/providers").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let providers = body_json(response).await;
    assert_eq!(providers[0]["provider"], "ollama");
    assert_eq!(providers[0]["api_key"], "***");

    let response = app
        .oneshot(Request::get("/api/v1/tools").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let tools = body_json(response).await;
    assert_eq!(tools.as_array().unwrap().len(), 2);
}
