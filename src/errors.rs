//! Typed error hierarchy for recap.
//!
//! One enum per subsystem:
//! - `SummarizerError`: text-generation backend failures
//! - `StoreError`: progress/result persistence failures
//! - `JobError`: anything that ends a single job early (summarizer or store)
//! - `RunnerError`: submission failures surfaced to the caller

use thiserror::Error;

/// Errors from a `Summarizer` backend.
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("No API key configured for the summarizer (set ANTHROPIC_API_KEY)")]
    MissingApiKey,

    #[error("Summarizer request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Summarizer request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Summarizer API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Model {model} returned no text content")]
    EmptyResponse { model: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from a `SummaryStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Result for request {request_id} was already recorded")]
    ResultAlreadyRecorded { request_id: String },

    #[error("Corrupt record for request {request_id}: {message}")]
    CorruptRecord { request_id: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.into())
    }
}

/// Reasons a job stops before reaching `Completed`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Summarizer(#[from] SummarizerError),

    #[error("Failed to persist progress: {0}")]
    Store(#[from] StoreError),
}

/// Errors returned to callers of `JobRunner::submit*`.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Summary request {request_id} already exists")]
    DuplicateRequest { request_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
