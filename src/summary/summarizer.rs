//! Text-generation capability used by the orchestrator.
//!
//! `Summarizer` is the seam: the orchestrator only ever sees the trait, the
//! service wires in `AnthropicSummarizer`, tests wire in scripted doubles.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::SummarizerConfig;
use crate::errors::SummarizerError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Produces a first-pass summary and folds new text into an existing one.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate_initial(&self, content: &str) -> Result<String, SummarizerError>;

    async fn refine(&self, existing_summary: &str, new_content: &str) -> Result<String, SummarizerError>;
}

pub fn initial_prompt(content: &str) -> String {
    format!(
        "Write a concise summary of the following markdown content: {}",
        content
    )
}

pub fn refine_prompt(existing_summary: &str, new_content: &str) -> String {
    format!(
        "Produce a final summary in markdown format.\n\n\
         Existing summary up to this point:\n\
         {}\n\n\
         New markdown content:\n\
         ------------\n\
         {}\n\
         ------------\n\n\
         Given the new content, refine the original summary. The output should be well-formatted markdown.",
        existing_summary, new_content
    )
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// `Summarizer` backed by the Anthropic Messages API.
pub struct AnthropicSummarizer {
    client: reqwest::Client,
    messages_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout_secs: u64,
}

impl AnthropicSummarizer {
    pub fn from_config(config: &SummarizerConfig) -> Result<Self, SummarizerError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SummarizerError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SummarizerError::Request)?;
        Ok(Self {
            client,
            messages_url: format!("{}/v1/messages", config.api_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: String) -> Result<String, SummarizerError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.messages_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.map_transport_error(e))?;
        if !status.is_success() {
            error!(model = %self.model, status = status.as_u16(), "Summarizer API returned an error");
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text).map_err(|e| {
            SummarizerError::Other(anyhow::anyhow!(
                "Failed to parse summarizer response: {}; body: {}",
                e,
                text
            ))
        })?;
        let output: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if output.trim().is_empty() {
            return Err(SummarizerError::EmptyResponse {
                model: self.model.clone(),
            });
        }
        Ok(output)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> SummarizerError {
        if err.is_timeout() {
            SummarizerError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            SummarizerError::Request(err)
        }
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    async fn generate_initial(&self, content: &str) -> Result<String, SummarizerError> {
        debug!(model = %self.model, "Generating initial summary");
        let summary = self.complete(initial_prompt(content)).await?;
        debug!(chars = summary.len(), "Generated initial summary");
        Ok(summary)
    }

    async fn refine(&self, existing_summary: &str, new_content: &str) -> Result<String, SummarizerError> {
        debug!(model = %self.model, "Refining existing summary with new content");
        let summary = self
            .complete(refine_prompt(existing_summary, new_content))
            .await?;
        debug!(chars = summary.len(), "Refined summary");
        Ok(summary)
    }
}
