use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState, SharedState};
use crate::config::ServerConfig;

/// Build the application router with request tracing and optional CORS.
pub fn build_router(state: SharedState, cors_allow_all: bool) -> Router {
    let mut app = api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_allow_all {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Bind to the configured address and serve until Ctrl+C.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    serve(
        listener,
        state,
        config.cors_allow_all,
        Duration::from_secs(config.shutdown_grace_secs),
        shutdown_signal(),
    )
    .await
}

/// Serve on an already-bound listener. When `shutdown` resolves the server
/// stops accepting requests, then running jobs get `grace` to finish.
pub async fn serve<F>(
    listener: TcpListener,
    state: SharedState,
    cors_allow_all: bool,
    grace: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, "Summary service listening");

    let app = build_router(Arc::clone(&state), cors_allow_all);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    let running = state.runner.running_jobs().await;
    if running > 0 {
        info!(running, grace_secs = grace.as_secs(), "Draining summary jobs");
    }
    state.runner.shutdown(grace).await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; shutting down");
        return;
    }
    info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::summary::models::{Document, SummaryStatus};
    use crate::summary::orchestrator::test_support::{ScriptedSummarizer, StalledSummarizer};
    use crate::summary::runner::{JobRunner, SHUTDOWN_ERROR};
    use crate::summary::store::InMemoryStore;
    use crate::summary::summarizer::Summarizer;

    fn test_state(summarizer: Arc<dyn Summarizer>) -> SharedState {
        Arc::new(AppState {
            runner: JobRunner::new(summarizer, Arc::new(InMemoryStore::new())),
        })
    }

    #[tokio::test]
    async fn test_cors_headers_present_when_enabled() {
        let app = build_router(test_state(Arc::new(ScriptedSummarizer::new())), true);
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .header("origin", "http://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_cors_headers_absent_when_disabled() {
        let app = build_router(test_state(Arc::new(ScriptedSummarizer::new())), false);
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .header("origin", "http://example.com")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = build_router(test_state(Arc::new(ScriptedSummarizer::new())), true);
        let request = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_answers_http_and_stops_on_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = test_state(Arc::new(ScriptedSummarizer::new()));
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            state,
            true,
            Duration::from_secs(1),
            async move {
                let _ = stop_rx.await;
            },
        ));

        let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_serve_abandons_stalled_jobs_after_grace() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let state = test_state(Arc::new(StalledSummarizer));
        state
            .runner
            .submit_with_id("stuck", vec![Document::new("A")])
            .await
            .unwrap();

        serve(
            listener,
            Arc::clone(&state),
            true,
            Duration::from_millis(100),
            async {},
        )
        .await
        .unwrap();

        let result = state.runner.get_result("stuck").await.unwrap().unwrap();
        assert_eq!(result.status, SummaryStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some(SHUTDOWN_ERROR));
    }
}
