use axum::Json;
use axum::extract::State;
use serde_json::json;
use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::layout::UnlockOutcome;
use crate::models::{
    ActivityRequest, ActivityResponse, ApiResponse, SessionStatusResponse, UnlockRequest, UnlockResponse,
};
use crate::server::AppState;

fn require_scope(claims: &crate::auth::TokenClaims, scope: &str) -> ApiResult<()> {
    if claims.has_scope(scope) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Current session chrome: timeout state, countdown and lock screen details.
///
/// # Errors
///
/// This function returns an error if:
/// - The authentication token is invalid or expired
/// - The token lacks the 'session:read' scope
pub async fn session_status(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<SessionStatusResponse>>> {
    require_scope(&claims, "session:read")?;

    let settings = state.layout.settings();
    let meta = json!({
        "timeout_ms": settings.timeout_ms,
        "lock_timeout_ms": settings.lock_timeout_ms,
        "warning_seconds": settings.warning_seconds,
    });

    Ok(Json(ApiResponse::with_meta(state.layout.snapshot().into(), meta)))
}

/// Forwards a browser input event. Events that arrive while the screen is locked are accepted
/// but have no effect.
///
/// # Errors
///
/// This function returns an error if:
/// - The authentication token is invalid or expired
/// - The token lacks the 'session:activity' scope
pub async fn record_activity(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ActivityRequest>,
) -> ApiResult<Json<ApiResponse<ActivityResponse>>> {
    require_scope(&claims, "session:activity")?;

    let accepted = state.layout.record_input(request.event);
    let response = ActivityResponse {
        accepted,
        state: state.layout.snapshot().state,
    };

    Ok(Json(ApiResponse::new(response)))
}

/// # Errors
///
/// This function returns an error if:
/// - The authentication token is invalid or expired
/// - The token lacks the 'session:lock' scope
pub async fn session_lock(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<SessionStatusResponse>>> {
    require_scope(&claims, "session:lock")?;

    state.layout.lock_now();

    Ok(Json(ApiResponse::new(state.layout.snapshot().into())))
}

/// # Errors
///
/// This function returns an error if:
/// - The authentication token is invalid or expired
/// - The token lacks the 'session:unlock' scope
/// - The password is incorrect (`IncorrectPassword`, carrying the attempt count)
pub async fn session_unlock(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<UnlockRequest>,
) -> ApiResult<Json<ApiResponse<UnlockResponse>>> {
    require_scope(&claims, "session:unlock")?;

    let password = zeroize::Zeroizing::new(request.password);
    match state.layout.unlock(&password).await {
        UnlockOutcome::Unlocked => Ok(Json(ApiResponse::new(UnlockResponse {
            unlocked: true,
            session: state.layout.snapshot().into(),
        }))),
        UnlockOutcome::Rejected { attempts } => Err(ApiError::IncorrectPassword { attempts }),
    }
}
