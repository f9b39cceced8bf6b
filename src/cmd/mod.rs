//! CLI command implementations.
//!
//! | Module      | Commands handled          |
//! |-------------|---------------------------|
//! | `serve`     | `Serve`                   |
//! | `summarize` | `Summarize`               |
//! | `config`    | `Config` (`show`, `init`) |

pub mod config;
pub mod serve;
pub mod summarize;

pub use config::cmd_config;
pub use serve::cmd_serve;
pub use summarize::cmd_summarize;

use std::sync::Arc;

use anyhow::{Context, Result};
use recap::config::{RecapConfig, StoreBackend};
use recap::summary::db::SqliteStore;
use recap::summary::summarizer::AnthropicSummarizer;
use recap::{InMemoryStore, JobRunner, SummaryStore};

/// Wire the configured summarizer and store into a `JobRunner`.
pub fn build_runner(config: &RecapConfig) -> Result<JobRunner> {
    let summarizer = AnthropicSummarizer::from_config(&config.summarizer)
        .context("Failed to configure the summarizer")?;

    let store: Arc<dyn SummaryStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::open(&config.store.path).context("Failed to open summary database")?,
        ),
    };

    Ok(JobRunner::new(Arc::new(summarizer), store))
}
