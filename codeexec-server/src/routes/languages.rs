//! Supported language listing

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub async fn list_languages(State(state): State<AppState>) -> Json<Value> {
    let registry = state.service.registry();
    Json(json!({
        "languages": registry.languages(),
        "images": registry.images(),
    }))
}
