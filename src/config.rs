//! Configuration for recap, read from `recap.toml`.
//!
//! Layered the same way for every command: file → environment → CLI flags.
//! Every field has a default, so an empty or missing file is valid.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! cors_allow_all = true
//! shutdown_grace_secs = 30
//!
//! [summarizer]
//! model = "claude-3-5-sonnet-latest"
//! api_url = "https://api.anthropic.com"
//! max_tokens = 4096
//! timeout_secs = 120
//!
//! [store]
//! backend = "sqlite"
//! path = ".recap/summaries.db"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! file = "logs/summary_service.log"
//! ```
//!
//! Environment overrides: `HOST`, `PORT`, `LOG_LEVEL`, `LOG_FILE`,
//! `ANTHROPIC_API_KEY`, `RECAP_MODEL`, `RECAP_STORE`, `RECAP_DB_PATH`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "recap.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecapConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow cross-origin requests from any origin
    #[serde(default = "default_cors_allow_all")]
    pub cors_allow_all: bool,
    /// How long shutdown waits for in-flight jobs before abandoning them
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_allow_all() -> bool {
    true
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allow_all: default_cors_allow_all(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Usually left unset in the file and supplied through `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_api_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            api_key: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            _ => anyhow::bail!("Invalid store backend '{}'. Valid values: memory, sqlite", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file, used when `backend = "sqlite"`
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".recap/summaries.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Optional log file, written in addition to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl RecapConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse recap.toml")
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load `path` if given (it must exist), else `recap.toml` in the working
    /// directory if present, else defaults. Environment overrides are applied.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::load(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` resolves a variable name to its value.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid PORT value '{}'", port))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Some(file) = lookup("LOG_FILE") {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.summarizer.api_key = Some(key);
        }
        if let Some(model) = lookup("RECAP_MODEL") {
            self.summarizer.model = model;
        }
        if let Some(backend) = lookup("RECAP_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(path) = lookup("RECAP_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Check values that serde alone cannot reject.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.summarizer.max_tokens == 0 {
            anyhow::bail!("summarizer.max_tokens must be greater than 0");
        }
        if self.summarizer.timeout_secs == 0 {
            anyhow::bail!("summarizer.timeout_secs must be greater than 0");
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            anyhow::bail!("store.path is required when store.backend = \"sqlite\"");
        }
        Ok(())
    }

    /// TOML for display, with the API key masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.summarizer.api_key.is_some() {
            shown.summarizer.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize configuration")
    }

    /// Write the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize recap.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}
