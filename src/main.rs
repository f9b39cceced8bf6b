use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use recap::config::RecapConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "recap")]
#[command(version, about = "Iterative document summarization service")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file. Defaults to ./recap.toml when it exists.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP summary service
    Serve {
        /// Address to bind (overrides server.host and HOST)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides server.port and PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Summarize markdown files in-process and print the result
    Summarize {
        /// Markdown files, summarized in the order given
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Write the summary to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Write a default recap.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Load config (file → env), then apply CLI overrides and validate.
fn load_config(cli: &Cli) -> Result<RecapConfig> {
    let mut config = RecapConfig::discover(cli.config.as_deref())?;
    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Config { command } => {
            cmd::cmd_config(cli.config.as_deref(), command.clone())?;
        }
        Commands::Serve { .. } => {
            let config = load_config(&cli)?;
            let _log_guard = recap::telemetry::init_logging(&config.logging, cli.verbose)?;
            cmd::cmd_serve(&config).await?;
        }
        Commands::Summarize { files, output } => {
            let config = load_config(&cli)?;
            let _log_guard = recap::telemetry::init_logging(&config.logging, cli.verbose)?;
            cmd::cmd_summarize(&config, files, output.as_deref()).await?;
        }
    }

    Ok(())
}
