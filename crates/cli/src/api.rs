use color_eyre::Result;
use reqdesk_api::{ApiServer, AppConfig};
use reqdesk_session::SessionTimeoutConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::Once;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Combines `--bind` and `--port`. A port replaces whatever port the bind address carried.
pub(crate) fn resolve_bind_address(bind: &str, port: Option<u16>) -> String {
    let Some(port) = port else {
        return bind.to_string();
    };

    if let Ok(addr) = bind.parse::<SocketAddr>() {
        return SocketAddr::new(addr.ip(), port).to_string();
    }
    if let Ok(ip) = bind.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }

    // Host names, with or without a port
    let host = bind.rsplit_once(':').map_or(bind, |(host, _)| host);
    let host = if host.is_empty() { "127.0.0.1" } else { host };
    format!("{host}:{port}")
}

pub async fn handle_serve_command(config: &AppConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    init_tracing();

    let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
    let bind_address = resolve_bind_address(&bind, port);

    println!("🚀 Starting reqdesk session server...");
    println!("📡 Binding to: {bind_address}");

    let api_server = ApiServer::new(config, &bind_address).await?;
    let addr = api_server.local_addr()?;

    println!("✅ reqdesk running on http://{addr}");
    println!("📖 Health check: http://{addr}/api/v1/health");
    println!("🔒 Login endpoint: http://{addr}/api/v1/auth/login");
    let timeout = SessionTimeoutConfig::from(&config.session).effective_timeout();
    println!(
        "⏱  Inactivity: {} after {} s, warning {} s before",
        config.session.mode,
        timeout.as_secs(),
        config.session.warning_seconds
    );
    println!("📋 Press Ctrl+C to stop the server");
    println!();

    println!("Example usage:");
    println!("  curl -X POST http://{addr}/api/v1/auth/login \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"username\": \"alice\", \"password\": \"your_password\"}}'");
    println!();
    println!("  curl -X POST -H 'Authorization: Bearer YOUR_TOKEN' \\");
    println!("    -H 'Content-Type: application/json' -d '{{\"event\": \"keydown\"}}' \\");
    println!("    http://{addr}/api/v1/session/activity");
    println!();

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = api_server.serve() => {
            if let Err(e) = result {
                warn!("API server error: {}", e);
                return Err(e);
            }
        }
        () = shutdown_signal => {
            info!("Shutting down API server...");
            println!("👋 Server shutting down...");
        }
    }

    Ok(())
}
