//! Integration tests for the chat completions client.
//!
//! Each test serves a stub completions endpoint on an ephemeral local port
//! with `axum` and points a real `ChatCompletionsClient` at it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tutor_engine::{
    ChatCompletionsClient, GenerationClient, GenerationPrompt, PerformanceLevel, Phase,
    SessionOrchestrator, SessionSettings, TutorError,
};

/// What the stub answers with, and what it saw.
#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: Value,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn handle_completion(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    stub.seen.lock().expect("seen lock").push((auth, request));
    (stub.status, Json(stub.body.clone()))
}

/// Serves `stub` and returns the API base URL.
async fn serve(stub: Stub) -> String {
    let router = Router::new()
        .route("/v1/chat/completions", post(handle_completion))
        .with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{addr}/v1")
}

fn stub(status: StatusCode, body: Value) -> Stub {
    Stub {
        status,
        body,
        seen: Arc::new(Mutex::new(Vec::new())),
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "cmpl-1",
        "model": "tutor-test-model",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
    })
}

fn client(endpoint: &str) -> ChatCompletionsClient {
    ChatCompletionsClient::new(
        endpoint,
        "tutor-test-model",
        "sk-test",
        Duration::from_secs(5),
        0.3,
    )
    .expect("build client")
}

fn prompt() -> GenerationPrompt {
    GenerationPrompt {
        system: "Return JSON".to_string(),
        user: "Write module 1".to_string(),
    }
}

#[tokio::test]
async fn test_generate_returns_first_choice() {
    let stub = stub(StatusCode::OK, completion("{\"title\": \"Sets\"}"));
    let seen = Arc::clone(&stub.seen);
    let endpoint = serve(stub).await;

    let text = client(&endpoint).generate(&prompt()).await.expect("generate");
    assert_eq!(text, "{\"title\": \"Sets\"}");

    let seen = seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1);
    let (auth, request) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(request["model"], "tutor-test-model");
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(request["messages"][0]["content"], "Return JSON");
    assert_eq!(request["messages"][1]["role"], "user");
    assert_eq!(request["messages"][1]["content"], "Write module 1");
}

#[tokio::test]
async fn test_non_success_status_is_reported_once() {
    let stub = stub(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"error": {"message": "overloaded"}}),
    );
    let seen = Arc::clone(&stub.seen);
    let endpoint = serve(stub).await;

    let failure = client(&endpoint).generate(&prompt()).await.unwrap_err();
    assert_eq!(failure.status, Some(503));
    assert!(failure.message.contains("overloaded"));
    assert_eq!(seen.lock().expect("seen lock").len(), 1, "no retries");
}

#[tokio::test]
async fn test_empty_choices_is_a_failure() {
    let endpoint = serve(stub(StatusCode::OK, json!({"choices": []}))).await;

    let failure = client(&endpoint).generate(&prompt()).await.unwrap_err();
    assert_eq!(failure.status, None);
    assert!(failure.message.contains("no choices"));
}

#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let failure = client(&format!("http://{addr}/v1"))
        .generate(&prompt())
        .await
        .unwrap_err();
    assert_eq!(failure.status, None);
}

#[tokio::test]
async fn test_session_over_http_client() {
    let module = json!({
        "title": "Photosynthesis",
        "objectives": ["Explain how plants make sugar"],
        "introduction": "Plants are solar powered.",
        "explanation": "Light, water and carbon dioxide become glucose.",
        "practiceItems": [],
        "quizItems": [
            {
                "question": "Which gas do plants absorb?",
                "kind": "multiple_choice",
                "options": ["Oxygen", "Carbon dioxide"],
                "correctAnswer": 1,
                "explanation": "Carbon dioxide is fixed into sugar."
            }
        ],
        "summaryPoints": ["Light drives the reaction"],
        "nextModulePreview": "Cellular respiration"
    });
    let content = format!("```json\n{module}\n```");
    let endpoint = serve(stub(StatusCode::OK, completion(&content))).await;

    let orch = SessionOrchestrator::new(client(&endpoint), SessionSettings::default());
    let view = orch.start_session("Biology", None).await.expect("start");
    assert_eq!(view.module_title, "Photosynthesis");

    orch.jump_to(Phase::Quiz).await.expect("jump");
    orch.submit_answer(0, "carbon dioxide").await.expect("answer");
    let outcome = orch.evaluate().await.expect("evaluate");
    assert_eq!(outcome.score, 100);
    assert_eq!(outcome.performance_level, PerformanceLevel::Strong);
}

#[tokio::test]
async fn test_session_surfaces_service_failure() {
    let endpoint = serve(stub(StatusCode::INTERNAL_SERVER_ERROR, json!({}))).await;

    let orch = SessionOrchestrator::new(client(&endpoint), SessionSettings::default());
    let err = orch.start_session("Biology", None).await.unwrap_err();
    assert!(matches!(
        err,
        TutorError::ModuleGenerationFailed {
            module_number: 1,
            ..
        }
    ));
    assert!(err.to_string().contains("please retry"));
}
