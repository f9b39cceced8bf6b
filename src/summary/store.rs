use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::models::{SummaryProgress, SummaryResult};
use crate::errors::StoreError;

/// Keyed persistence for progress snapshots and terminal results.
///
/// Progress is last-write-wins per request id. Results are write-once: a second
/// `save_result` for the same id fails with `StoreError::ResultAlreadyRecorded`.
/// Readers always observe a whole snapshot.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn save_progress(&self, progress: &SummaryProgress) -> Result<(), StoreError>;

    async fn get_progress(&self, request_id: &str) -> Result<Option<SummaryProgress>, StoreError>;

    async fn save_result(&self, result: &SummaryResult) -> Result<(), StoreError>;

    async fn get_result(&self, request_id: &str) -> Result<Option<SummaryResult>, StoreError>;

    /// Progress snapshots of every request that has no result yet.
    async fn unfinished_requests(&self) -> Result<Vec<SummaryProgress>, StoreError>;
}

/// Process-local store. All state is lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    progress: RwLock<HashMap<String, SummaryProgress>>,
    results: RwLock<HashMap<String, SummaryResult>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn save_progress(&self, progress: &SummaryProgress) -> Result<(), StoreError> {
        debug!(request_id = %progress.request_id, status = %progress.status, "Saving progress");
        self.progress
            .write()
            .await
            .insert(progress.request_id.clone(), progress.clone());
        Ok(())
    }

    async fn get_progress(&self, request_id: &str) -> Result<Option<SummaryProgress>, StoreError> {
        Ok(self.progress.read().await.get(request_id).cloned())
    }

    async fn save_result(&self, result: &SummaryResult) -> Result<(), StoreError> {
        debug!(request_id = %result.request_id, status = %result.status, "Saving result");
        match self.results.write().await.entry(result.request_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::ResultAlreadyRecorded {
                request_id: result.request_id.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(result.clone());
                Ok(())
            }
        }
    }

    async fn get_result(&self, request_id: &str) -> Result<Option<SummaryResult>, StoreError> {
        Ok(self.results.read().await.get(request_id).cloned())
    }

    async fn unfinished_requests(&self) -> Result<Vec<SummaryProgress>, StoreError> {
        let results = self.results.read().await;
        Ok(self
            .progress
            .read()
            .await
            .values()
            .filter(|progress| !results.contains_key(&progress.request_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::summary::models::SummaryStatus;

    #[tokio::test]
    async fn test_missing_keys_are_absent() {
        let store = InMemoryStore::new();
        assert!(store.get_progress("nope").await.unwrap().is_none());
        assert!(store.get_result("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_last_write_wins() {
        let store = InMemoryStore::new();
        let mut progress = SummaryProgress::new("req-1", 2, SummaryStatus::InProgress);
        store.save_progress(&progress).await.unwrap();

        progress.advance(1, "first".to_string());
        store.save_progress(&progress).await.unwrap();

        let stored = store.get_progress("req-1").await.unwrap().unwrap();
        assert_eq!(stored.current_document_index, 1);
        assert_eq!(stored.current_summary, "first");
    }

    #[tokio::test]
    async fn test_progress_and_results_are_separate() {
        let store = InMemoryStore::new();
        store
            .save_progress(&SummaryProgress::new("req-1", 1, SummaryStatus::InProgress))
            .await
            .unwrap();
        assert!(store.get_result("req-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_result_is_write_once() {
        let store = InMemoryStore::new();
        let first = SummaryResult::completed("req-1", "done".to_string());
        store.save_result(&first).await.unwrap();

        let second = SummaryResult::failed("req-1", "late failure".to_string());
        let err = store.save_result(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::ResultAlreadyRecorded { .. }));

        let stored = store.get_result("req-1").await.unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_unfinished_requests_skip_recorded_results() {
        let store = InMemoryStore::new();
        store
            .save_progress(&SummaryProgress::new("open", 2, SummaryStatus::InProgress))
            .await
            .unwrap();
        store
            .save_progress(&SummaryProgress::new("done", 1, SummaryStatus::Completed))
            .await
            .unwrap();
        store
            .save_result(&SummaryResult::completed("done", "final".to_string()))
            .await
            .unwrap();

        let unfinished = store.unfinished_requests().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].request_id, "open");
    }

    #[tokio::test]
    async fn test_concurrent_writers_on_distinct_keys() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let id = format!("req-{}", i);
                let mut progress = SummaryProgress::new(&id, 3, SummaryStatus::InProgress);
                for step in 1..=3 {
                    progress.advance(step, format!("summary {}", step));
                    store.save_progress(&progress).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        for i in 0..16 {
            let stored = store
                .get_progress(&format!("req-{}", i))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.current_document_index, 3);
            assert_eq!(stored.current_summary, "summary 3");
        }
    }
}
