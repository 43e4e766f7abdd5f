use chrono::{DateTime, Utc};
use reqdesk_session::{InputEvent, SessionState, TimeoutMode};
use serde::{Deserialize, Serialize};

use crate::layout::SessionSnapshot;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub const fn new(data: T) -> Self {
        Self { data, meta: None }
    }

    pub const fn with_meta(data: T, meta: serde_json::Value) -> Self {
        Self { data, meta: Some(meta) }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub username: String,
    pub session: SessionStatusResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub unlocked: bool,
    pub session: SessionStatusResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ActivityRequest {
    pub event: InputEvent,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// Whether the event counted as activity and rearmed the timers
    pub accepted: bool,
    pub state: SessionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub state: SessionState,
    pub mode: TimeoutMode,
    pub authenticated: bool,
    pub locked: bool,
    pub locked_username: Option<String>,
    pub countdown_seconds: Option<u64>,
    pub failed_password_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_error: Option<String>,
}

impl From<SessionSnapshot> for SessionStatusResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            state: snapshot.state,
            mode: snapshot.mode,
            authenticated: snapshot.authenticated,
            locked: snapshot.locked,
            locked_username: snapshot.locked_username,
            countdown_seconds: snapshot.countdown_seconds,
            failed_password_attempts: snapshot.failed_password_attempts,
            unlock_error: snapshot.unlock_error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub session_status: String,
}
