use crate::models::{ApiResponse, HealthResponse};
use crate::server::AppState;
use crate::ApiResult;
use axum::Json;
use axum::extract::State;
use reqdesk_session::AuthCollaborator;
use std::sync::Arc;

/// # Errors
///
/// This function does not currently fail; the signature matches the other handlers.
pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiResponse<HealthResponse>>> {
    let session_status = if state.auth.is_locked() {
        "locked"
    } else if state.auth.is_authenticated() {
        "active"
    } else {
        "signed-out"
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        session_status: session_status.to_string(),
    };

    Ok(Json(ApiResponse::new(response)))
}
