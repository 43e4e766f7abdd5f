pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod layout;
pub mod models;
pub mod server;

pub use auth::{AuthStore, TokenClaims};
pub use config::{AppConfig, ServerSettings, UserAccount};
pub use credentials::{hash_password, verify_password};
pub use error::{ApiError, ApiResult};
pub use layout::{LockScreenView, SessionLayout, SessionSnapshot, UnlockOutcome};
pub use models::{SessionStatusResponse, UnlockResponse};
pub use server::ApiServer;

use color_eyre::Result;

/// Initializes the API server from the application config.
///
/// The lock flags are read from [`AppConfig::lock_store`], so a screen that was locked when the
/// previous process exited comes back locked.
///
/// # Arguments
///
/// * `config` - Accounts, inactivity settings and the lock state location.
/// * `bind_address` - A `&str` that specifies the address and port the server will bind to (e.g., "127.0.0.1:3000").
///
/// # Errors
///
/// This function may return an error if the server fails to bind to the specified address and port.
pub async fn init_api_server(config: &AppConfig, bind_address: &str) -> Result<ApiServer> {
    ApiServer::new(config, bind_address).await
}
