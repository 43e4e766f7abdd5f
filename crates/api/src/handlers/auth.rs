use axum::Json;
use axum::extract::State;
use reqdesk_session::AuthCollaborator;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{ApiResponse, LoginRequest, LoginResponse};
use crate::server::AppState;

/// # Errors
///
/// This function returns an error if:
/// - The username is empty (`BadRequest`)
/// - The username or password is incorrect (Unauthorized)
/// - Token generation fails due to internal errors
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    let LoginRequest { username, password } = request;
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }

    let (token, expires_at) = state.auth.login(&username, Zeroizing::new(password)).await?;

    // Signing in arms the inactivity timeout
    state.layout.sync();

    let response = LoginResponse {
        token,
        expires_at,
        username,
        session: state.layout.snapshot().into(),
    };

    Ok(Json(ApiResponse::new(response)))
}

/// # Errors
///
/// This function returns an error if the authentication token is invalid or expired.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<String>>> {
    state.auth.logout();
    state.layout.sync();

    Ok(Json(ApiResponse::new("Logged out successfully".to_string())))
}
