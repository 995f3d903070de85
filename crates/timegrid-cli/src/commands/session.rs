//! Session command - manage the encrypted session cache

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Deserialize;

use timegrid_core::config::Config;
use timegrid_core::domain::{AuthSession, SessionUser};

use crate::output::{Output, OutputFormat};
use crate::runtime::Runtime;

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show the cached session, if it is still valid
    Show,
    /// Cache a session from a login response saved as JSON
    Import {
        /// File with `user`, `token`, and `expiresAt`
        file: PathBuf,
    },
    /// Remove the cached session
    Clear,
}

/// Login response as returned by the API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: SessionUser,
    token: String,
    expires_at: DateTime<Utc>,
}

impl SessionCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);
        let runtime = Runtime::open(config).await?;

        match self {
            SessionCommand::Show => {
                let session = runtime.vault.load().await?;
                if format.is_json() {
                    out.document(&match &session {
                        Some(s) => serde_json::json!({
                            "user": s.user,
                            "expires_at": s.expires_at.to_rfc3339(),
                        }),
                        None => serde_json::Value::Null,
                    });
                    return Ok(());
                }
                match session {
                    Some(s) => {
                        out.success(&format!("Signed in as {}", s.user.email));
                        out.info(&format!(
                            "Expires: {}",
                            s.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                        ));
                    }
                    None => out.info("No valid cached session"),
                }
            }
            SessionCommand::Import { file } => {
                let raw = tokio::fs::read_to_string(file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let login: LoginResponse =
                    serde_json::from_str(&raw).context("File is not a login response")?;

                let session = AuthSession {
                    user: login.user,
                    token: login.token,
                    expires_at: login.expires_at,
                    device_id: runtime.vault.device_id().await?,
                };
                runtime
                    .vault
                    .store(&session)
                    .await
                    .context("Failed to cache session")?;
                out.success(&format!("Session cached for {}", session.user.email));
            }
            SessionCommand::Clear => {
                runtime.vault.clear().await?;
                out.success("Cached session removed");
            }
        }
        Ok(())
    }
}
