//! Queue command - inspect and add queued operations

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::Value;
use tracing::info;

use timegrid_core::config::Config;
use timegrid_core::domain::{EntityType, OperationKind};

use crate::output::{Output, OutputFormat};
use crate::runtime::Runtime;

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// List pending operations in the order they will be applied
    List,
    /// Queue a write; it is sent right away unless --offline is given
    Add {
        /// Operation kind: create, update, or delete
        kind: OperationKind,
        /// Entity collection, e.g. time_entry
        entity: String,
        /// JSON payload; update and delete need an "id" field
        payload: String,
        /// Only queue the write, do not contact the API
        #[arg(long)]
        offline: bool,
    },
}

impl QueueCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        match self {
            QueueCommand::List => self.execute_list(config, format).await,
            QueueCommand::Add {
                kind,
                entity,
                payload,
                offline,
            } => {
                self.execute_add(config, *kind, entity, payload, *offline, format)
                    .await
            }
        }
    }

    async fn execute_list(&self, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);
        let runtime = Runtime::open(config).await?;
        let pending = runtime.queue.peek_all().await;

        if format.is_json() {
            out.document(&pending);
            return Ok(());
        }

        if pending.is_empty() {
            out.success("Queue is empty");
            return Ok(());
        }

        out.success(&format!("{} pending operation(s)", pending.len()));
        for op in &pending {
            out.info(&format!(
                "{}  {:<6} {:<12} retries={}  queued {}",
                op.id(),
                op.kind(),
                op.entity_type(),
                op.retry_count(),
                op.enqueued_at().format("%Y-%m-%d %H:%M:%S")
            ));
        }
        Ok(())
    }

    async fn execute_add(
        &self,
        config: Config,
        kind: OperationKind,
        entity: &str,
        payload: &str,
        offline: bool,
        format: OutputFormat,
    ) -> Result<()> {
        let out = Output::new(format);

        let entity_type = EntityType::new(entity)?;
        if !config.entity_types().contains(&entity_type) {
            bail!(
                "Unknown entity type '{}'; configured types: {}",
                entity,
                config.sync.entity_types.join(", ")
            );
        }
        let payload: Value = serde_json::from_str(payload).context("Payload is not valid JSON")?;

        let runtime = Runtime::open(config).await?;
        let orchestrator = runtime.orchestrator(!offline).await?;

        info!(%kind, entity = %entity_type, offline, "Queueing operation");
        let id = orchestrator
            .submit(kind, entity_type, payload)
            .await
            .context("The operation was not queued")?;
        let still_queued = runtime.queue.get(&id).await.is_some();

        if format.is_json() {
            out.document(&serde_json::json!({
                "id": id.to_string(),
                "queued": still_queued,
                "queue_size": runtime.queue.size().await,
            }));
        } else if still_queued {
            out.success(&format!("Queued {} ({} pending)", id, runtime.queue.size().await));
        } else {
            out.success(&format!("Applied {}", id));
        }
        Ok(())
    }
}
