//! Iterative summarization of one job.
//!
//! The first document is summarized, every following document is folded into
//! the running summary with a refine call, and a full progress snapshot is
//! written after each step so pollers can watch the job advance.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::models::{SummaryProgress, SummaryRequest, SummaryResult, SummaryStatus};
use super::store::SummaryStore;
use super::summarizer::Summarizer;
use crate::errors::JobError;

pub const NO_DOCUMENTS_ERROR: &str = "No documents provided";

/// Used when an underlying error renders as an empty string.
pub const GENERIC_FAILURE_ERROR: &str = "Summary generation failed";

pub struct SummaryOrchestrator {
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn SummaryStore>,
}

impl SummaryOrchestrator {
    pub fn new(summarizer: Arc<dyn Summarizer>, store: Arc<dyn SummaryStore>) -> Self {
        Self { summarizer, store }
    }

    pub fn store(&self) -> &Arc<dyn SummaryStore> {
        &self.store
    }

    /// Run a job to a terminal state. Never returns an error: every failure
    /// is recorded in the store and returned as a `Failed` result.
    pub async fn process(&self, request: SummaryRequest) -> SummaryResult {
        let request_id = request.request_id.as_str();
        let total = request.documents.len();

        if total == 0 {
            warn!(request_id, "Rejecting summary request with no documents");
            return self
                .record_failure(request_id, 0, NO_DOCUMENTS_ERROR.to_string())
                .await;
        }

        info!(request_id, total, "Starting summary job");
        match self.run_steps(&request).await {
            Ok(summary) => {
                let result = SummaryResult::completed(request_id, summary);
                if let Err(e) = self.store.save_result(&result).await {
                    error!(request_id, error = %e, "Failed to save completed result");
                }
                info!(request_id, total, "Summary job completed");
                result
            }
            Err(e) => {
                error!(request_id, error = %e, "Summary job failed");
                self.record_failure(request_id, total, e.to_string()).await
            }
        }
    }

    /// Steps 1..=N plus the Completed snapshot. Returns the final summary.
    async fn run_steps(&self, request: &SummaryRequest) -> Result<String, JobError> {
        let request_id = request.request_id.as_str();
        let total = request.documents.len();
        let mut progress = SummaryProgress::new(request_id, total, SummaryStatus::InProgress);
        self.store.save_progress(&progress).await?;

        let mut summary = String::new();
        for (index, document) in request.documents.iter().enumerate() {
            debug!(request_id, document = index + 1, total, "Summarizing document");
            summary = if index == 0 {
                self.summarizer.generate_initial(&document.content).await?
            } else {
                self.summarizer.refine(&summary, &document.content).await?
            };
            progress.advance(index + 1, summary.clone());
            self.store.save_progress(&progress).await?;
        }

        progress.set_status(SummaryStatus::Completed);
        self.store.save_progress(&progress).await?;
        Ok(summary)
    }

    /// Reset progress to zero, write the Failed result, and return it.
    /// Store errors here are logged and otherwise ignored.
    pub async fn record_failure(
        &self,
        request_id: &str,
        total_documents: usize,
        message: String,
    ) -> SummaryResult {
        let message = if message.trim().is_empty() {
            GENERIC_FAILURE_ERROR.to_string()
        } else {
            message
        };

        let progress = SummaryProgress::new(request_id, total_documents, SummaryStatus::Failed);
        if let Err(e) = self.store.save_progress(&progress).await {
            error!(request_id, error = %e, "Failed to save failed progress");
        }

        let result = SummaryResult::failed(request_id, message);
        if let Err(e) = self.store.save_result(&result).await {
            error!(request_id, error = %e, "Failed to save failed result");
        }
        result
    }
}
