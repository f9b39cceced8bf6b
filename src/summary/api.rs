use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::models::{Document, SummaryProgress, SummaryResult, SummaryStatus};
use super::runner::JobRunner;

pub const NOT_FOUND_MESSAGE: &str = "Summary request not found";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub runner: JobRunner,
}

pub type SharedState = Arc<AppState>;

// ── Request / response payload types ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSummaryRequest {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSummaryResponse {
    pub request_id: String,
    pub status: SummaryStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub request_id: String,
    pub status: SummaryStatus,
    pub current_document_index: usize,
    pub total_documents: usize,
    pub current_summary: String,
}

impl From<SummaryProgress> for ProgressResponse {
    fn from(progress: SummaryProgress) -> Self {
        Self {
            request_id: progress.request_id,
            status: progress.status,
            current_document_index: progress.current_document_index,
            total_documents: progress.total_documents,
            current_summary: progress.current_summary,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub request_id: String,
    pub summary: String,
    pub status: SummaryStatus,
    pub error_message: Option<String>,
}

impl From<SummaryResult> for SummaryResponse {
    fn from(result: SummaryResult) -> Self {
        Self {
            request_id: result.request_id,
            summary: result.summary,
            status: result.status,
            error_message: result.error_message,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Validation(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/summaries", post(create_summary))
        .route("/summaries/{id}/status", get(get_summary_status))
        .route("/summaries/{id}", get(get_summary))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Service is running".to_string(),
    })
}

async fn create_summary(
    State(state): State<SharedState>,
    payload: Result<Json<CreateSummaryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    if req.documents.is_empty() {
        return Err(ApiError::Validation(
            "documents must contain at least one document".to_string(),
        ));
    }

    let submission = state.runner.submit(req.documents).await.map_err(|e| {
        error!(error = %e, "Failed to create summary request");
        ApiError::Internal(format!("Failed to create summary request: {}", e))
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateSummaryResponse {
            request_id: submission.request_id,
            status: submission.status,
            message: "Summary request created and processing started".to_string(),
        }),
    ))
}

async fn get_summary_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    debug!(request_id = %id, "Getting summary status");
    let progress = state.runner.get_status(&id).await.map_err(|e| {
        error!(request_id = %id, error = %e, "Failed to get summary status");
        ApiError::Internal(format!("Failed to get summary status: {}", e))
    })?;
    match progress {
        Some(progress) => Ok(Json(progress.into())),
        None => Err(ApiError::NotFound(NOT_FOUND_MESSAGE.to_string())),
    }
}

async fn get_summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    debug!(request_id = %id, "Getting summary result");
    let result = state.runner.get_result(&id).await.map_err(|e| {
        error!(request_id = %id, error = %e, "Failed to get summary result");
        ApiError::Internal(format!("Failed to get summary: {}", e))
    })?;
    match result {
        Some(result) => Ok(Json(result.into())),
        None => Err(ApiError::NotFound(NOT_FOUND_MESSAGE.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::errors::StoreError;
    use crate::summary::orchestrator::test_support::{ScriptedSummarizer, StalledSummarizer};
    use crate::summary::store::{InMemoryStore, SummaryStore};
    use crate::summary::summarizer::Summarizer;

    fn test_state(summarizer: Arc<dyn Summarizer>) -> SharedState {
        Arc::new(AppState {
            runner: JobRunner::new(summarizer, Arc::new(InMemoryStore::new())),
        })
    }

    fn test_app(state: SharedState) -> Router {
        api_router().with_state(state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app(test_state(Arc::new(ScriptedSummarizer::new())));

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = body_json(response.into_body()).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.message, "Service is running");
    }

    #[tokio::test]
    async fn test_create_summary_returns_accepted() {
        let state = test_state(Arc::new(StalledSummarizer));
        let app = test_app(state.clone());

        let body = serde_json::json!({
            "documents": [
                {"content": "# One", "title": "First"},
                {"content": "# Two", "metadata": {"source": "wiki"}}
            ]
        });
        let response = app.oneshot(post_json("/summaries", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let created: CreateSummaryResponse = body_json(response.into_body()).await;
        assert_eq!(created.status, SummaryStatus::Pending);
        assert!(!created.message.is_empty());

        let progress = state.runner.get_status(&created.request_id).await.unwrap().unwrap();
        assert_eq!(progress.total_documents, 2);
    }

    #[tokio::test]
    async fn test_create_summary_rejects_empty_documents() {
        let app = test_app(test_state(Arc::new(ScriptedSummarizer::new())));

        let response = app
            .oneshot(post_json("/summaries", serde_json::json!({"documents": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("at least one"));
    }

    #[tokio::test]
    async fn test_create_summary_rejects_malformed_body() {
        let app = test_app(test_state(Arc::new(ScriptedSummarizer::new())));

        let response = app
            .oneshot(post_json(
                "/summaries",
                serde_json::json!({"documents": [{"title": "no content"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let state = test_state(Arc::new(ScriptedSummarizer::new()));

        for uri in ["/summaries/missing/status", "/summaries/missing"] {
            let response = test_app(state.clone()).oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            let body: serde_json::Value = body_json(response.into_body()).await;
            assert_eq!(body["error"], NOT_FOUND_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_status_and_result_after_completion() {
        let state = test_state(Arc::new(ScriptedSummarizer::new()));
        let submission = state
            .runner
            .submit_with_id("job-1", vec![Document::new("A"), Document::new("B")])
            .await
            .unwrap();
        state.runner.shutdown(Duration::from_secs(5)).await;

        let response = test_app(state.clone())
            .oneshot(get(&format!("/summaries/{}/status", submission.request_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let progress: ProgressResponse = body_json(response.into_body()).await;
        assert_eq!(progress.status, SummaryStatus::Completed);
        assert_eq!(progress.current_document_index, 2);
        assert_eq!(progress.total_documents, 2);
        assert_eq!(progress.current_summary, "S2");

        let response = test_app(state.clone())
            .oneshot(get("/summaries/job-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: SummaryResponse = body_json(response.into_body()).await;
        assert_eq!(result.summary, "S2");
        assert_eq!(result.status, SummaryStatus::Completed);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_result_falls_back_to_progress_while_running() {
        let state = test_state(Arc::new(StalledSummarizer));
        state
            .runner
            .submit_with_id("slow", vec![Document::new("A")])
            .await
            .unwrap();

        let response = test_app(state).oneshot(get("/summaries/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: SummaryResponse = body_json(response.into_body()).await;
        assert!(!result.status.is_terminal());
        assert_eq!(result.summary, "");
        assert!(result.error_message.is_none());
    }

    struct BrokenStore;

    #[async_trait]
    impl SummaryStore for BrokenStore {
        async fn save_progress(&self, _: &SummaryProgress) -> Result<(), StoreError> {
            Err(StoreError::LockPoisoned)
        }
        async fn get_progress(&self, _: &str) -> Result<Option<SummaryProgress>, StoreError> {
            Err(StoreError::LockPoisoned)
        }
        async fn save_result(&self, _: &SummaryResult) -> Result<(), StoreError> {
            Err(StoreError::LockPoisoned)
        }
        async fn get_result(&self, _: &str) -> Result<Option<SummaryResult>, StoreError> {
            Err(StoreError::LockPoisoned)
        }
        async fn unfinished_requests(&self) -> Result<Vec<SummaryProgress>, StoreError> {
            Err(StoreError::LockPoisoned)
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let state = Arc::new(AppState {
            runner: JobRunner::new(Arc::new(ScriptedSummarizer::new()), Arc::new(BrokenStore)),
        });

        let response = test_app(state.clone())
            .oneshot(get("/summaries/any/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = body_json(response.into_body()).await;
        assert!(body["error"].as_str().unwrap().contains("Store lock poisoned"));

        let response = test_app(state)
            .oneshot(post_json(
                "/summaries",
                serde_json::json!({"documents": [{"content": "x"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
