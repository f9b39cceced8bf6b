use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One input document. Only `content` is fed to the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
            metadata: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A summarization job: documents are folded into the summary in order.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub request_id: String,
    pub documents: Vec<Document>,
}

impl SummaryRequest {
    pub fn new(request_id: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            request_id: request_id.into(),
            documents,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SummaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Completed and Failed are absorbing states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid summary status: {}", s)),
        }
    }
}

/// Full snapshot of a job's in-flight state. Every save replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryProgress {
    pub request_id: String,
    pub current_document_index: usize,
    pub total_documents: usize,
    pub current_summary: String,
    pub status: SummaryStatus,
    pub updated_at: DateTime<Utc>,
}

impl SummaryProgress {
    pub fn new(request_id: impl Into<String>, total_documents: usize, status: SummaryStatus) -> Self {
        Self {
            request_id: request_id.into(),
            current_document_index: 0,
            total_documents,
            current_summary: String::new(),
            status,
            updated_at: Utc::now(),
        }
    }

    /// Record that `document_count` documents are now folded into `summary`.
    pub fn advance(&mut self, document_count: usize, summary: String) {
        self.current_document_index = document_count;
        self.current_summary = summary;
        self.updated_at = Utc::now();
    }

    pub fn set_status(&mut self, status: SummaryStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Terminal outcome of a job. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub request_id: String,
    pub summary: String,
    pub status: SummaryStatus,
    pub error_message: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SummaryResult {
    pub fn completed(request_id: impl Into<String>, summary: String) -> Self {
        Self {
            request_id: request_id.into(),
            summary,
            status: SummaryStatus::Completed,
            error_message: None,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn failed(request_id: impl Into<String>, error_message: String) -> Self {
        Self {
            request_id: request_id.into(),
            summary: String::new(),
            status: SummaryStatus::Failed,
            error_message: Some(error_message),
            completed_at: Some(Utc::now()),
        }
    }

    /// Result-shaped view of a job that has not terminated yet.
    pub fn from_progress(progress: &SummaryProgress) -> Self {
        Self {
            request_id: progress.request_id.clone(),
            summary: progress.current_summary.clone(),
            status: progress.status,
            error_message: None,
            completed_at: None,
        }
    }
}
