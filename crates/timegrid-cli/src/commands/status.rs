//! Status command - connectivity, queue, storage, and session at a glance

use anyhow::Result;
use clap::Args;

use timegrid_core::config::Config;

use crate::output::{Output, OutputFormat};
use crate::runtime::Runtime;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);
        let runtime = Runtime::open(config).await?;

        let queue_size = runtime.queue.size().await;
        let session = runtime.vault.load().await?;
        let engine = runtime
            .storage
            .snapshot()
            .await
            .map(|s| s.engine)
            .unwrap_or_else(|_| "unknown".to_string());

        if format.is_json() {
            out.document(&serde_json::json!({
                "backend": runtime.backend,
                "engine": engine,
                "queue_size": queue_size,
                "session": session.as_ref().map(|s| serde_json::json!({
                    "user": s.user.email,
                    "expires_at": s.expires_at.to_rfc3339(),
                })),
            }));
            return Ok(());
        }

        out.success("TimeGrid Status");
        out.info(&format!("Storage: {} ({})", runtime.backend, engine));
        out.info(&format!("Queued operations: {}", queue_size));
        match session {
            Some(s) => out.info(&format!(
                "Signed in as {} until {}",
                s.user.email,
                s.expires_at.format("%Y-%m-%d %H:%M UTC")
            )),
            None => out.info("Not signed in"),
        }
        Ok(())
    }
}
