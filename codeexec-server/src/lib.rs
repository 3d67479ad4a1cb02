//! HTTP front end for the code execution sandbox
//!
//! Thin glue: request parsing, three routes and process setup. All execution
//! semantics live in `codeexec-sandbox`.

pub mod config;
pub mod error;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use codeexec_sandbox::SandboxService;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SandboxService>,
}

impl AppState {
    pub fn new(service: SandboxService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Create the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(routes::execute::execute_code))
        .route("/health", get(routes::health::health_check))
        .route("/languages", get(routes::languages::list_languages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
