//! HTTP API for the marketplace. `run()` backs the `dealer-market-server` binary;
//! `router(state)` can be nested into a host axum app.

mod http;
mod http_admin;
mod http_auth;
mod http_errors;
mod http_listings;
mod http_parse;
mod http_types;
mod state;

pub use http::router;
pub use state::{build_state_from_env, build_state_with_pool, AppState};

use crate::infrastructure::AppConfig;
use anyhow::Context;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Standalone entrypoint for the `dealer-market-server` binary.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("load config")?;
    let state = build_state_from_env(config.clone()).await?;

    spawn_maintenance_sweep(&state, config.sweep_interval_secs);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("parse listen address")?;
    let listener = TcpListener::bind(addr).await.context("bind listener")?;

    info!(
        host = %config.server_host,
        port = config.server_port,
        "Server running"
    );
    info!(
        docs = %format!("http://{}:{}/docs", config.server_host, config.server_port),
        "API docs"
    );

    let app = router(state);
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}

/// Periodically expires lapsed subscriptions and purges expired sessions. `0` disables it.
pub fn spawn_maintenance_sweep(state: &AppState, interval_secs: u64) {
    if interval_secs == 0 {
        info!("Maintenance sweep disabled");
        return;
    }

    let subscriptions = Arc::clone(&state.subscriptions);
    let accounts = Arc::clone(&state.accounts);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = subscriptions.sweep_lapsed(Utc::now().date_naive()).await {
                error!(error = %e, "Subscription sweep failed");
            }
            if let Err(e) = accounts.purge_expired_sessions().await {
                error!(error = %e, "Session purge failed");
            }
        }
    });
}
