//! Sync command - drain the queue to the API

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use timegrid_core::config::Config;
use timegrid_core::domain::DrainSummary;
use timegrid_sync::DrainOutcome;

use crate::output::{Output, OutputFormat};
use crate::runtime::Runtime;

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Keep draining on an interval until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Seconds between drains in watch mode
    #[arg(long, default_value_t = 30)]
    pub interval: u64,
}

impl SyncCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);
        let runtime = Runtime::open(config).await?;
        let orchestrator = runtime.orchestrator(true).await?;

        if !self.watch {
            report(out, orchestrator.drain().await);
            return Ok(());
        }

        info!(interval_secs = self.interval, "Watching queue");
        let mut ticker = tokio::time::interval(Duration::from_secs(self.interval.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Pick up writes queued by other processes
                    orchestrator.on_storage_changed().await?;
                    report(out, orchestrator.drain().await);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn report(out: Output, outcome: DrainOutcome) {
    match outcome {
        DrainOutcome::Completed(summary) if out.is_json() => out.document(&summary),
        DrainOutcome::Completed(summary) => human_summary(out, &summary),
        DrainOutcome::AlreadyRunning => out.warn("A drain is already running"),
        DrainOutcome::Offline => out.warn("Offline, nothing was sent"),
    }
}

fn human_summary(out: Output, summary: &DrainSummary) {
    if summary.failed_count == 0 {
        out.success(&format!("Synced {} operation(s)", summary.synced_count));
    } else {
        out.warn(&format!(
            "Synced {}, failed {} ({} dropped)",
            summary.synced_count, summary.failed_count, summary.dropped_count
        ));
    }
    out.info(&format!("Remaining in queue: {}", summary.remaining_queue_size));
}
