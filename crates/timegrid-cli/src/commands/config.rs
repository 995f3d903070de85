//! Config command - view and validate configuration

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use timegrid_core::config::Config;

use crate::output::{Output, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, path: &Path, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);

        match self {
            ConfigCommand::Show => {
                if format.is_json() {
                    let json = serde_json::to_value(&config)
                        .context("Failed to serialize configuration to JSON")?;
                    out.document(&json);
                    return Ok(());
                }

                out.success(&format!("Configuration ({})", path.display()));
                let yaml = serde_yaml::to_string(&config)
                    .context("Failed to serialize configuration to YAML")?;
                for line in yaml.lines() {
                    out.info(line);
                }
            }
            ConfigCommand::Validate => {
                // Parse errors are reported here instead of falling back to defaults
                let config = if path.exists() {
                    Config::load(path)?
                } else {
                    out.warn(&format!("{} not found, checking defaults", path.display()));
                    config
                };

                let errors = config.validate();
                if format.is_json() {
                    out.document(&serde_json::json!({
                        "valid": errors.is_empty(),
                        "errors": errors
                            .iter()
                            .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
                            .collect::<Vec<_>>(),
                    }));
                } else if errors.is_empty() {
                    out.success("Configuration is valid");
                } else {
                    for e in &errors {
                        out.error(&format!("{}: {}", e.field, e.message));
                    }
                }

                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
            }
        }
        Ok(())
    }
}
