use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post},
};
use reqdesk_session::KeyValueStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthStore, auth_middleware};
use crate::config::AppConfig;
use crate::handlers;
use crate::layout::SessionLayout;

pub struct ApiServer {
    app: Router,
    listener: TcpListener,
}

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthStore>,
    pub layout: Arc<SessionLayout>,
}

impl AppState {
    /// Builds the auth store over `store` and mounts the session layout on it.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let auth = Arc::new(AuthStore::new(config.users.clone(), store));
        let layout = Arc::new(SessionLayout::mount(auth.clone(), config.session.clone()));
        Self { auth, layout }
    }
}

impl ApiServer {
    /// # Errors
    /// This function will return an error if:
    /// - The TCP binding to the specified address fails.
    /// - There are issues configuring the router.
    pub async fn new(config: &AppConfig, bind_address: &str) -> color_eyre::Result<Self> {
        if config.users.is_empty() {
            warn!("No user accounts configured; nobody will be able to sign in");
        }

        let lock_store = config.lock_store()?;
        info!("Lock state stored at {}", lock_store.path().display());
        let store: Arc<dyn KeyValueStore> = Arc::new(lock_store);
        let state = AppState::new(config, store);

        let app = build_router(Arc::new(state))?;

        let listener = TcpListener::bind(bind_address).await?;
        info!("API server will bind to: {}", bind_address);

        Ok(Self { app, listener })
    }

    /// # Errors
    /// This function will return an error if:
    /// - Retrieving the local socket's address fails.
    /// - Axum fails to serve the application.
    pub async fn serve(self) -> color_eyre::Result<()> {
        let addr = self.listener.local_addr()?;
        info!("API server listening on http://{}", addr);

        axum::serve(self.listener, self.app).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if getting the local address from the TCP listener fails.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }
}

/// # Errors
///
/// Returns an error if there are any issues configuring the router or applying the middleware.
pub fn build_router(state: Arc<AppState>) -> color_eyre::Result<Router> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(Any);

    let app = Router::new()
        .route("/api/v1/health", get(handlers::health))
        // Authentication endpoints
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/logout", post(handlers::logout))
        // Session timeout and lock screen
        .route("/api/v1/session", get(handlers::session_status))
        .route("/api/v1/session/activity", post(handlers::record_activity))
        .route("/api/v1/session/lock", post(handlers::session_lock))
        .route("/api/v1/session/unlock", post(handlers::session_unlock))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state);

    Ok(app)
}
