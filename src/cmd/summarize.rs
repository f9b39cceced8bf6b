//! One-shot summarization command — `recap summarize`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use recap::config::RecapConfig;
use recap::{Document, JobRunner, SummaryResult, SummaryStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn cmd_summarize(
    config: &RecapConfig,
    files: &[PathBuf],
    output: Option<&Path>,
) -> Result<()> {
    let documents = read_documents(files)?;
    let runner = super::build_runner(config)?;
    let total = documents.len() as u64;

    let submission = runner.submit(documents).await?;
    let result = wait_with_progress(&runner, &submission.request_id, total).await?;

    match result.status {
        SummaryStatus::Completed => {
            match output {
                Some(path) => {
                    std::fs::write(path, &result.summary)
                        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
                    eprintln!(
                        "{} Summary written to {}",
                        style("✓").green(),
                        path.display()
                    );
                }
                None => println!("{}", result.summary),
            }
            Ok(())
        }
        _ => {
            let message = result
                .error_message
                .unwrap_or_else(|| "Summary generation failed".to_string());
            anyhow::bail!("Summary failed: {}", message)
        }
    }
}

/// Read markdown files as documents. The title is the file stem.
pub fn read_documents(files: &[PathBuf]) -> Result<Vec<Document>> {
    files
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mut document = Document::new(content);
            if let Some(stem) = path.file_stem() {
                document = document.with_title(stem.to_string_lossy());
            }
            let mut metadata = HashMap::new();
            metadata.insert(
                "path".to_string(),
                serde_json::Value::String(path.display().to_string()),
            );
            Ok(document.with_metadata(metadata))
        })
        .collect()
}

/// Poll the job until it reaches a terminal state, mirroring progress on a bar.
async fn wait_with_progress(runner: &JobRunner, request_id: &str, total: u64) -> Result<SummaryResult> {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓▒░"),
    );
    bar.set_prefix("Documents");
    bar.enable_steady_tick(Duration::from_millis(120));

    loop {
        if let Some(progress) = runner.get_status(request_id).await? {
            bar.set_position(progress.current_document_index as u64);
            bar.set_message(progress.status.to_string());
        }
        if let Some(result) = runner.get_result(request_id).await?
            && result.status.is_terminal()
        {
            bar.finish_and_clear();
            return Ok(result);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
