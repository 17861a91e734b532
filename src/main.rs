mod adapters;
mod api;
mod config;
mod controller;
mod core;
mod error;
mod telemetry;
mod views;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::adapters::backend::HttpBackend;
use crate::adapters::prefs::PrefsStore;
use crate::config::AppConfig;
use crate::controller::Dashboard;
use crate::telemetry::JsonLineFormatter;

pub struct AppState {
    pub dashboard: Dashboard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load();

    let rust_log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&rust_log_env))?;
    let subscriber = Registry::default().with(env_filter);

    if cfg.log_format == "json" {
        let formatter = JsonLineFormatter::new(
            "lab-dashboard".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
            cfg.env.clone(),
            cfg.node_name.clone(),
        );
        subscriber.with(fmt::layer().event_format(formatter)).init();
    } else {
        subscriber.with(fmt::layer().compact()).init();
    }

    info!(
        event = "SYSTEM_STARTUP",
        service.version = env!("CARGO_PKG_VERSION"),
        node.name = %cfg.node_name,
        backend.url = %cfg.backend_url,
        "Lab dashboard booting"
    );

    let backend = HttpBackend::new(&cfg.backend_url)?;
    let prefs = PrefsStore::new(&cfg.prefs_path);
    info!(event = "PREFS_STORE", path = %prefs.path().display(), "Preferences file selected");
    let dashboard = Dashboard::new(Arc::new(backend), prefs, cfg.timings());
    dashboard.bootstrap().await;

    let state = Arc::new(AppState { dashboard: dashboard.clone() });
    let app = api::routes::create_router(state, &cfg.ui_dir);
    let addr = format!("{}:{}", cfg.host, cfg.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(event = "HTTP_LISTENING", addr = %addr, "Dashboard available");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(event = "SYSTEM_SHUTDOWN", "Ctrl-C received");
        })
        .await?;

    dashboard.shutdown();
    Ok(())
}
