use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::models::{Document, SummaryProgress, SummaryRequest, SummaryResult, SummaryStatus};
use super::orchestrator::SummaryOrchestrator;
use super::store::SummaryStore;
use super::summarizer::Summarizer;
use crate::errors::{RunnerError, StoreError};

pub const SHUTDOWN_ERROR: &str = "Service shut down before the job finished";

/// Recorded for jobs a previous process left unfinished.
pub const RESTART_ERROR: &str = "Service stopped before the job finished";

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What the submitter gets back: the job id and its status at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub request_id: String,
    pub status: SummaryStatus,
}

/// An entry in the running-jobs map. `handle` is `None` while the id is
/// reserved by a submission that has not spawned its task yet.
struct RunningJob {
    handle: Option<JoinHandle<()>>,
    total_documents: usize,
}

/// Launches summary jobs in the background and answers status queries.
///
/// Each non-empty job runs as its own tokio task. A job that errors or panics
/// only affects its own record in the store.
pub struct JobRunner {
    orchestrator: Arc<SummaryOrchestrator>,
    /// Map from request id to the task handle for jobs still running.
    running_jobs: Arc<tokio::sync::Mutex<HashMap<String, RunningJob>>>,
}

impl JobRunner {
    pub fn new(summarizer: Arc<dyn Summarizer>, store: Arc<dyn SummaryStore>) -> Self {
        Self {
            orchestrator: Arc::new(SummaryOrchestrator::new(summarizer, store)),
            running_jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        }
    }

    fn store(&self) -> &Arc<dyn SummaryStore> {
        self.orchestrator.store()
    }

    /// Submit a job under a freshly generated request id.
    pub async fn submit(&self, documents: Vec<Document>) -> Result<Submission, RunnerError> {
        self.submit_with_id(Uuid::new_v4().to_string(), documents)
            .await
    }

    /// Submit a job under a caller-chosen request id.
    ///
    /// Non-empty jobs are recorded as `Pending` and started in the background.
    /// Empty jobs fail inline and return `Failed` without starting a task.
    pub async fn submit_with_id(
        &self,
        request_id: impl Into<String>,
        documents: Vec<Document>,
    ) -> Result<Submission, RunnerError> {
        let request_id = request_id.into();
        {
            let mut jobs = self.running_jobs.lock().await;
            if jobs.contains_key(&request_id) {
                return Err(RunnerError::DuplicateRequest { request_id });
            }
            jobs.insert(
                request_id.clone(),
                RunningJob {
                    handle: None,
                    total_documents: documents.len(),
                },
            );
        }

        let outcome = self.start(&request_id, documents).await;
        if !matches!(outcome, Ok(SummaryStatus::Pending)) {
            self.running_jobs.lock().await.remove(&request_id);
        }
        Ok(Submission {
            status: outcome?,
            request_id,
        })
    }

    /// Everything after the id is reserved. Store calls run without the
    /// running-jobs lock; it is taken again only to register the task.
    async fn start(
        &self,
        request_id: &str,
        documents: Vec<Document>,
    ) -> Result<SummaryStatus, RunnerError> {
        if self.store().get_progress(request_id).await?.is_some()
            || self.store().get_result(request_id).await?.is_some()
        {
            return Err(RunnerError::DuplicateRequest {
                request_id: request_id.to_string(),
            });
        }

        let total = documents.len();
        if total == 0 {
            let result = self
                .orchestrator
                .process(SummaryRequest::new(request_id, documents))
                .await;
            return Ok(result.status);
        }

        let pending = SummaryProgress::new(request_id, total, SummaryStatus::Pending);
        self.store().save_progress(&pending).await?;

        // Held across the spawn so the task cannot deregister before it is registered.
        let mut jobs = self.running_jobs.lock().await;
        if !jobs.contains_key(request_id) {
            // Reservation drained by shutdown while the Pending write ran.
            drop(jobs);
            warn!(request_id, "Runner shut down during submission");
            record_abandoned(&self.orchestrator, request_id, total, SHUTDOWN_ERROR.to_string())
                .await;
            return Ok(SummaryStatus::Failed);
        }
        let handle = self.spawn_job(request_id.to_string(), documents);
        if let Some(job) = jobs.get_mut(request_id) {
            job.handle = Some(handle);
        }

        info!(request_id, total, "Submitted summary job");
        Ok(SummaryStatus::Pending)
    }

    fn spawn_job(&self, id: String, documents: Vec<Document>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let running_jobs = Arc::clone(&self.running_jobs);
        tokio::spawn(async move {
            let total = documents.len();
            let request = SummaryRequest::new(id.clone(), documents);
            let outcome = AssertUnwindSafe(orchestrator.process(request))
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                let message = panic_message(&*payload);
                error!(request_id = %id, panic = %message, "Summary job panicked");
                record_abandoned(
                    &orchestrator,
                    &id,
                    total,
                    format!("Summary job panicked: {}", message),
                )
                .await;
            }
            running_jobs.lock().await.remove(&id);
        })
    }

    pub async fn get_status(&self, request_id: &str) -> Result<Option<SummaryProgress>, StoreError> {
        self.store().get_progress(request_id).await
    }

    /// The terminal result if there is one, else the current progress in
    /// result shape, else `None`.
    pub async fn get_result(&self, request_id: &str) -> Result<Option<SummaryResult>, StoreError> {
        if let Some(result) = self.store().get_result(request_id).await? {
            return Ok(Some(result));
        }
        Ok(self
            .store()
            .get_progress(request_id)
            .await?
            .map(|progress| SummaryResult::from_progress(&progress)))
    }

    /// Number of jobs whose task has not finished yet, including submissions
    /// still in flight.
    pub async fn running_jobs(&self) -> usize {
        self.running_jobs.lock().await.len()
    }

    /// Settle jobs that a previous process left without a result.
    ///
    /// Jobs whose last snapshot is `Completed` get their Completed result.
    /// All others are marked Failed with `RESTART_ERROR`. Jobs owned by this
    /// runner are skipped. Returns the number of jobs settled.
    pub async fn recover_interrupted(&self) -> Result<usize, StoreError> {
        let unfinished = self.store().unfinished_requests().await?;
        let orphaned: Vec<SummaryProgress> = {
            let jobs = self.running_jobs.lock().await;
            unfinished
                .into_iter()
                .filter(|progress| !jobs.contains_key(&progress.request_id))
                .collect()
        };

        for progress in &orphaned {
            record_abandoned(
                &self.orchestrator,
                &progress.request_id,
                progress.total_documents,
                RESTART_ERROR.to_string(),
            )
            .await;
        }
        if !orphaned.is_empty() {
            warn!(count = orphaned.len(), "Settled summary jobs left unfinished by a previous run");
        }
        Ok(orphaned.len())
    }

    /// Wait up to `grace` for running jobs, then abort the rest and record
    /// them as failed.
    pub async fn shutdown(&self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let remaining = self.running_jobs().await;
            if remaining == 0 {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            info!(remaining, "Waiting for summary jobs to finish");
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }

        let abandoned: Vec<(String, RunningJob)> = self.running_jobs.lock().await.drain().collect();
        for (request_id, job) in abandoned {
            // Submissions still in flight notice the drained reservation themselves.
            let Some(handle) = job.handle else {
                continue;
            };
            warn!(request_id = %request_id, "Aborting summary job at shutdown");
            handle.abort();
            let _ = handle.await;
            record_abandoned(
                &self.orchestrator,
                &request_id,
                job.total_documents,
                SHUTDOWN_ERROR.to_string(),
            )
            .await;
        }
    }
}

/// Record a job that stopped without writing its result.
///
/// An existing result is left untouched. A job whose last snapshot is already
/// `Completed` keeps its summary and gets a Completed result. Anything else
/// is recorded as failed with `message`.
async fn record_abandoned(
    orchestrator: &SummaryOrchestrator,
    request_id: &str,
    total_documents: usize,
    message: String,
) {
    let store = orchestrator.store();
    match store.get_result(request_id).await {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            error!(request_id, error = %e, "Failed to check result of abandoned job");
            return;
        }
    }

    match store.get_progress(request_id).await {
        Ok(Some(progress)) if progress.status == SummaryStatus::Completed => {
            let result = SummaryResult::completed(request_id, progress.current_summary);
            if let Err(e) = store.save_result(&result).await {
                error!(request_id, error = %e, "Failed to save completed result");
            } else {
                info!(request_id, "Recorded result of a job that had already completed");
            }
        }
        Ok(_) => {
            orchestrator
                .record_failure(request_id, total_documents, message)
                .await;
        }
        Err(e) => {
            error!(request_id, error = %e, "Failed to check progress of abandoned job");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
