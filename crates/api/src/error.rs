use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use color_eyre::eyre::Error;
use serde_json::json;
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    BadRequest(String),
    InternalError(String),
    /// The lock screen rejected a password. Carries the running attempt count.
    IncorrectPassword { attempts: u32 },
    /// The screen is locked for a different user.
    SessionLocked,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                String::from("Authentication required"),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", String::from("Access denied")),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::IncorrectPassword { attempts } => (
                StatusCode::UNAUTHORIZED,
                "INCORRECT_PASSWORD",
                format!("Incorrect password ({attempts} failed attempts)"),
            ),
            ApiError::SessionLocked => (
                StatusCode::LOCKED,
                "SESSION_LOCKED",
                String::from("The screen is locked for another user"),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message.as_str()
            }
        }));

        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
