use axum_test::TestServer;
use reqdesk_api::models::{ApiResponse, LoginResponse, SessionStatusResponse};
use reqdesk_api::server::{AppState, build_router};
use reqdesk_api::{AppConfig, hash_password};
use reqdesk_session::{KeyValueStore, TimeoutSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use super::fixtures::{TEST_PASSWORD, TEST_USERNAME, relaxed_settings, sample_login_request};

pub struct TestContext {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub config: AppConfig,
    pub temp_dir: TempDir,
    pub auth_token: Option<String>,
}

impl TestContext {
    pub fn new() -> color_eyre::Result<Self> {
        Self::with_settings(relaxed_settings())
    }

    pub fn with_settings(settings: TimeoutSettings) -> color_eyre::Result<Self> {
        // Isolated directory for the persisted lock flags
        let temp_dir = tempfile::tempdir()?;

        let mut config = AppConfig {
            session: settings,
            lock_state_path: Some(temp_dir.path().join("session.json")),
            ..AppConfig::default()
        };
        config.upsert_user(TEST_USERNAME, hash_password(TEST_PASSWORD)?);

        Self::mount(config, temp_dir)
    }

    /// Builds a fresh server over an existing config and directory, as a restart would.
    pub fn mount(config: AppConfig, temp_dir: TempDir) -> color_eyre::Result<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(config.lock_store()?);
        let state = Arc::new(AppState::new(&config, store));
        let app = build_router(Arc::clone(&state))?;
        let server = TestServer::new(app).map_err(|e| color_eyre::eyre::eyre!("Failed to start test server: {e}"))?;

        Ok(Self {
            server,
            state,
            config,
            temp_dir,
            auth_token: None,
        })
    }

    /// Drops the running server and mounts a new one on the same files.
    pub fn restart(self) -> color_eyre::Result<Self> {
        let Self { config, temp_dir, .. } = self;
        Self::mount(config, temp_dir)
    }

    pub fn lock_state_path(&self) -> PathBuf {
        self.temp_dir.path().join("session.json")
    }

    pub async fn login(&mut self) -> color_eyre::Result<String> {
        let response = self
            .server
            .post("/api/v1/auth/login")
            .json(&sample_login_request())
            .await;

        if response.status_code() != 200 {
            return Err(color_eyre::eyre::eyre!(
                "Login failed with status: {}",
                response.status_code()
            ));
        }

        let body: ApiResponse<LoginResponse> = response.json();
        let token = body.data.token.clone();
        self.auth_token = Some(body.data.token);

        Ok(token)
    }

    pub fn token(&self) -> &str {
        self.auth_token.as_deref().expect("Not authenticated")
    }

    pub async fn status(&self) -> SessionStatusResponse {
        let response = self.server.get("/api/v1/session").authorization_bearer(self.token()).await;
        response.assert_status_ok();
        let body: ApiResponse<SessionStatusResponse> = response.json();
        body.data
    }

    pub async fn lock(&self) {
        self.server
            .post("/api/v1/session/lock")
            .authorization_bearer(self.token())
            .await
            .assert_status_ok();
    }
}
