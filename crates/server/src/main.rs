// crates/server/src/main.rs
//! mediadl server binary.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mediadl_server::{create_app, init_metrics, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mediadl_server=debug".into()),
        )
        .init();

    let config = Config::parse();
    init_metrics();

    tokio::fs::create_dir_all(&config.downloads_dir)
        .await
        .with_context(|| {
            format!(
                "creating downloads directory {}",
                config.downloads_dir.display()
            )
        })?;

    let state = AppState::new(
        config.job_config(),
        config.tool_config(),
        config.probe_timeout(),
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    tracing::info!(
        addr = %config.addr,
        downloads_dir = %config.downloads_dir.display(),
        tool = %config.tool,
        "mediadl v{} listening",
        env!("CARGO_PKG_VERSION")
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
