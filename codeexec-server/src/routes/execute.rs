//! Code execution endpoint

use crate::error::ApiError;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use codeexec_sandbox::{ExecutionRequest, ExecutionResult};

pub async fn execute_code(
    State(state): State<AppState>,
    Json(request): Json<ExecutionRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let result = state.service.execute(&request).await?;
    Ok(Json(result))
}
