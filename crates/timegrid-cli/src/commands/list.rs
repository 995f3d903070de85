//! List command - the offline view of one entity collection

use anyhow::Result;
use clap::Args;

use timegrid_core::config::Config;
use timegrid_core::domain::EntityType;
use timegrid_sync::OfflineReader;

use crate::output::{Output, OutputFormat};
use crate::runtime::Runtime;

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Entity collection, e.g. project
    pub entity: String,
}

impl ListCommand {
    pub async fn execute(&self, config: Config, format: OutputFormat) -> Result<()> {
        let out = Output::new(format);
        let entity_type = EntityType::new(&self.entity)?;
        let runtime = Runtime::open(config).await?;

        let entities = OfflineReader::new(runtime.engine()).list(&entity_type).await?;

        if format.is_json() {
            out.document(&serde_json::Value::Array(entities));
            return Ok(());
        }

        out.success(&format!("{} {} record(s)", entities.len(), entity_type));
        for entity in &entities {
            out.info(&entity.to_string());
        }
        Ok(())
    }
}
