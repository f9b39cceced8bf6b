//! HTTP service command — `recap serve`.

use std::sync::Arc;

use anyhow::{Context, Result};
use recap::config::RecapConfig;
use recap::summary::api::AppState;
use recap::summary::server;
use tracing::info;

pub async fn cmd_serve(config: &RecapConfig) -> Result<()> {
    let runner = super::build_runner(config)?;
    let settled = runner
        .recover_interrupted()
        .await
        .context("Failed to settle jobs left by a previous run")?;
    if settled > 0 {
        info!(settled, "Marked jobs from a previous run as finished");
    }
    info!(
        model = %config.summarizer.model,
        store = %config.store.backend,
        host = %config.server.host,
        port = config.server.port,
        "Starting summary service"
    );

    let state = Arc::new(AppState { runner });
    server::start_server(&config.server, state).await
}
