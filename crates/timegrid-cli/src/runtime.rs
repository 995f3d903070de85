//! Wiring of the offline core from a [`Config`]
//!
//! Opens tiered storage (SQLite preferred, JSON file fallback, or memory
//! only when `storage.data_dir` is empty) with quota warnings attached,
//! rehydrates the queue and sweeps orphaned shadow records. The
//! orchestrator is built on demand because it needs the cached session for
//! API credentials.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use timegrid_cache::{
    FileEngineProvider, MemoryEngine, MemoryEngineProvider, QuotaMonitor, SqliteEngineProvider,
    TieredStorage,
};
use timegrid_core::config::Config;
use timegrid_core::domain::BackendKind;
use timegrid_core::ports::{IEngineProvider, IEntityClient, IEventSink, IStorageEngine};
use timegrid_remote::RestEntityClient;
use timegrid_sync::{
    HandlerRegistry, LoggingEventSink, MutationQueue, NetworkMonitor, OrchestratorSettings,
    ShadowStore, SyncOrchestrator,
};
use timegrid_vault::{SessionVault, VaultSettings};

const MIB: u64 = 1024 * 1024;
const KIB: u64 = 1024;

pub struct Runtime {
    pub config: Config,
    pub storage: Arc<TieredStorage>,
    pub backend: BackendKind,
    pub queue: Arc<MutationQueue>,
    pub network: Arc<NetworkMonitor>,
    pub vault: SessionVault,
    events: Arc<dyn IEventSink>,
}

impl Runtime {
    pub async fn open(config: Config) -> Result<Self> {
        let events: Arc<dyn IEventSink> = Arc::new(LoggingEventSink);
        let (preferred, fallback) = engine_providers(&config).await?;
        let storage = Arc::new(
            TieredStorage::new(preferred, fallback)
                .with_namespaces(config.known_namespaces())
                .with_migration(config.storage.migrate_legacy)
                .with_quota_monitor(QuotaMonitor::new(
                    events.clone(),
                    config.storage.warning_threshold_percent,
                )),
        );
        let backend = storage
            .initialize()
            .await
            .context("No storage backend is available")?;

        let engine: Arc<dyn IStorageEngine> = storage.clone();
        let queue = Arc::new(
            MutationQueue::open(engine.clone())
                .await
                .context("Failed to load the operation queue")?,
        );
        let swept = ShadowStore::new(engine.clone())
            .sweep_orphans(&queue, &config.entity_types())
            .await
            .context("Failed to sweep orphaned shadow records")?;
        if swept > 0 {
            info!(swept, "Removed orphaned shadow records");
        }

        let vault = SessionVault::new(engine).with_settings(VaultSettings::from(&config.session));

        Ok(Self {
            config,
            storage,
            backend,
            queue,
            network: Arc::new(NetworkMonitor::default()),
            vault,
            events,
        })
    }

    pub fn engine(&self) -> Arc<dyn IStorageEngine> {
        self.storage.clone()
    }

    /// Builds an orchestrator talking to the configured API
    ///
    /// The cached session, if any, supplies the bearer token. `online`
    /// seeds the network monitor; the CLI has no connectivity probe.
    pub async fn orchestrator(&self, online: bool) -> Result<SyncOrchestrator> {
        let mut client = RestEntityClient::from_config(&self.config.remote)
            .context("Invalid remote configuration")?;
        match self.vault.load().await.context("Failed to read cached session")? {
            Some(session) => client = client.with_access_token(session.token.clone()),
            None => warn!("No cached session, requests will be unauthenticated"),
        }

        let client: Arc<dyn IEntityClient> = Arc::new(client);
        let mut handlers = HandlerRegistry::new();
        for entity_type in self.config.entity_types() {
            handlers.register_entity(entity_type, client.clone());
        }

        self.network.set_online(online);
        Ok(SyncOrchestrator::new(
            self.engine(),
            self.queue.clone(),
            handlers,
            self.network.clone(),
            self.events.clone(),
        )
        .with_settings(OrchestratorSettings::from(&self.config.sync)))
    }
}

/// SQLite and JSON file engines under `data_dir`, or memory only without one
async fn engine_providers(
    config: &Config,
) -> Result<(Arc<dyn IEngineProvider>, Arc<dyn IEngineProvider>)> {
    let capacity = config.storage.preferred_capacity_mb.saturating_mul(MIB);

    if config.storage.data_dir.as_os_str().is_empty() {
        warn!("No data directory configured, nothing will be persisted");
        let memory = Arc::new(MemoryEngine::new(capacity));
        return Ok((
            Arc::new(MemoryEngineProvider::new(memory)),
            Arc::new(MemoryEngineProvider::unavailable()),
        ));
    }

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.storage.data_dir.display()
            )
        })?;

    Ok((
        Arc::new(SqliteEngineProvider::file(config.database_path(), capacity)),
        Arc::new(FileEngineProvider::new(
            config.fallback_path(),
            config.storage.fallback_quota_kb.saturating_mul(KIB),
        )),
    ))
}

#[cfg(test)]
mod tests {
    use timegrid_core::config::ConfigBuilder;
    use timegrid_core::domain::ConnectivityStatus;

    use super::*;

    #[tokio::test]
    async fn test_open_creates_preferred_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .storage_data_dir(dir.path().join("data"))
            .build();

        let runtime = Runtime::open(config).await.unwrap();
        assert_eq!(runtime.backend, BackendKind::Preferred);
        assert_eq!(runtime.queue.size().await, 0);
        assert!(dir.path().join("data").join("timegrid.db").exists());
    }

    #[tokio::test]
    async fn test_empty_data_dir_uses_memory() {
        let config = ConfigBuilder::new()
            .storage_data_dir(std::path::PathBuf::new())
            .build();

        let runtime = Runtime::open(config).await.unwrap();
        assert_eq!(runtime.backend, BackendKind::Preferred);
        assert_eq!(runtime.storage.snapshot().await.unwrap().engine, "memory");
    }

    #[tokio::test]
    async fn test_orchestrator_registers_configured_entities() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigBuilder::new()
            .storage_data_dir(dir.path().to_path_buf())
            .sync_entity_types(["time_entry"])
            .build();

        let runtime = Runtime::open(config).await.unwrap();
        let orchestrator = runtime.orchestrator(false).await.unwrap();
        assert_eq!(
            orchestrator.status().await.status,
            ConnectivityStatus::Offline
        );
    }
}
