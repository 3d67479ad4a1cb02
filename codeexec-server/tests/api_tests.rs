//! Router tests against the in-memory engine

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use codeexec_sandbox::{
    LanguageRegistry, MockEngine, ProgramBehavior, ResourceLimits, SandboxService,
};
use codeexec_server::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(engine: Arc<MockEngine>) -> Router {
    let registry = LanguageRegistry::builtin()
        .with_image_override("cpp", "gcc:13")
        .unwrap();
    let service = SandboxService::with_config(engine, registry, ResourceLimits::default());
    router(AppState::new(service))
}

fn echo_app() -> Router {
    app_with(Arc::new(MockEngine::echo()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn post_execute(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/execute")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(echo_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "code-execution"}));
}

#[tokio::test]
async fn test_languages_listing() {
    let request = Request::get("/languages").body(Body::empty()).unwrap();
    let (status, body) = send(echo_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["languages"],
        json!(["python", "javascript", "typescript", "java", "cpp"])
    );
    assert_eq!(body["images"]["python"], "python:3.11-alpine");
    assert_eq!(body["images"]["cpp"], "gcc:13");
}

#[tokio::test]
async fn test_execute_success() {
    let (status, body) = send(
        echo_app(),
        post_execute(json!({"code": "hi\n", "language": "python"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["output"], "hi\n");
    assert!(body["error"].is_null());
    assert!(body["execution_time"].as_f64().unwrap() >= 0.0);
    assert!(body["passed_tests"].is_null());
    assert!(body["total_tests"].is_null());
}

#[tokio::test]
async fn test_execute_program_failure_is_ok_response() {
    let engine = Arc::new(MockEngine::new(|_| {
        ProgramBehavior::exit(1, "ZeroDivisionError: division by zero\n")
    }));
    let (status, body) = send(
        app_with(engine),
        post_execute(json!({
            "code": "1/0",
            "language": "python",
            "test_cases": [{"input": "1", "expected": "2"}],
            "timeout": 5
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["output"].is_null());
    assert_eq!(body["error"], "ZeroDivisionError: division by zero\n");
}

#[tokio::test]
async fn test_execute_timeout() {
    let engine = Arc::new(MockEngine::new(|_| ProgramBehavior::Hang));
    let (status, body) = send(
        app_with(engine.clone()),
        post_execute(json!({"code": "while True: pass", "language": "python", "timeout": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Execution timeout");
    assert!(body["execution_time"].as_f64().unwrap() >= 1.0);
    assert_eq!(engine.live_count(), 0);
}

#[tokio::test]
async fn test_unsupported_language_is_bad_request() {
    let engine = Arc::new(MockEngine::echo());
    let (status, body) = send(
        app_with(engine.clone()),
        post_execute(json!({"code": "fn main() {}", "language": "rust"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unsupported language: rust");
    assert_eq!(engine.created_count(), 0);
}

#[tokio::test]
async fn test_invalid_timeout_is_bad_request() {
    let (status, body) = send(
        echo_app(),
        post_execute(json!({"code": "x", "language": "python", "timeout": 3600})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let (status, _) = send(echo_app(), post_execute(json!({"language": "python"}))).await;
    assert!(status.is_client_error());
}
