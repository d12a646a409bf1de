// crates/server/src/main.rs
//! Splatserve server binary.
//!
//! Creates the output directories, starts the retention sweeper, then serves
//! the HTTP and WebSocket API until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use splatserve_server::{create_app, AppState, LogFormat, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "warn,splatserve_server=info,splatserve_jobs=info,tower_http=info";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_format);

    for dir in [&config.frames_dir, &config.colmap_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let state = AppState::new(&config);
    let sweeper = state.sweeper(&config).spawn();
    let app = create_app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        addr = %addr,
        frames_dir = %config.frames_dir.display(),
        ffmpeg = %config.ffmpeg.display(),
        "splatserve listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    Ok(())
}
