//! Quota command - storage usage of the resolved backend

use anyhow::{Context, Result};
use clap::Args;

use timegrid_cache::quota::format_bytes;
use timegrid_core::config::Config;

use crate::output::{Output, OutputFormat};
use crate::runtime::Runtime;

#[derive(Debug, Args)]
pub struct QuotaCommand {}

impl QuotaCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);
        let threshold = config.storage.warning_threshold_percent;
        let runtime = Runtime::open(config).await?;

        let snapshot = runtime
            .storage
            .snapshot()
            .await
            .context("Failed to estimate storage usage")?;
        let percent = snapshot.usage_percent();

        if format.is_json() {
            let mut json = serde_json::to_value(&snapshot)?;
            json["usagePercent"] = percent.into();
            json["warningThresholdPercent"] = threshold.into();
            out.document(&json);
            return Ok(());
        }

        out.success(&format!(
            "Storage: {} backend ({})",
            snapshot.backend_kind, snapshot.engine
        ));
        out.info(&format!(
            "Used: {} of {} ({}%)",
            format_bytes(snapshot.used_bytes),
            format_bytes(snapshot.capacity_bytes),
            percent
        ));
        out.info(&format!(
            "Persistent: {}",
            if snapshot.is_persistent { "yes" } else { "no" }
        ));
        if percent >= threshold {
            out.warn(&format!(
                "Usage is above the {}% warning threshold",
                threshold
            ));
        }
        Ok(())
    }
}
