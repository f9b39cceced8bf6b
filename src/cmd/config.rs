//! Configuration view and scaffolding commands — `recap config`.

use std::path::Path;

use anyhow::Result;
use recap::config::{CONFIG_FILE_NAME, RecapConfig};

use super::super::ConfigCommands;

pub fn cmd_config(config_path: Option<&Path>, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = RecapConfig::discover(config_path)?;
            let source = match config_path {
                Some(path) => Some(path.to_path_buf()),
                None => Some(Path::new(CONFIG_FILE_NAME).to_path_buf()).filter(|p| p.exists()),
            };
            match source {
                Some(path) => println!("# Config file: {}", path.display()),
                None => println!("# No {} found; showing defaults", CONFIG_FILE_NAME),
            }
            println!("# Effective values include environment overrides");
            println!();
            print!("{}", config.to_redacted_toml()?);

            if let Err(e) = config.validate() {
                eprintln!("Warning: configuration is invalid: {}", e);
            }
        }
        Some(ConfigCommands::Init { force }) => {
            let path = config_path.unwrap_or_else(|| Path::new(CONFIG_FILE_NAME));
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                );
            }
            RecapConfig::default().save(path)?;
            println!("Created {}", path.display());
        }
    }
    Ok(())
}
