//! Configuration module for the TimeGrid offline core.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{EntityType, NS_DEVICE_ID, NS_SESSION_ENCRYPTED, NS_SYNC_QUEUE};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub session: SessionConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Tiered storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the SQLite database and the fallback store; empty
    /// keeps everything in memory.
    pub data_dir: PathBuf,
    /// File name of the preferred (SQLite) database inside `data_dir`.
    pub database_file: String,
    /// File name of the fallback JSON store inside `data_dir`.
    pub fallback_file: String,
    /// Capacity reported for the preferred engine (in MiB).
    pub preferred_capacity_mb: u64,
    /// Hard quota of the fallback engine (in KiB).
    pub fallback_quota_kb: u64,
    /// Usage percentage that triggers a storage warning (1-100).
    pub warning_threshold_percent: u8,
    /// Copy legacy fallback data into the preferred engine on first use.
    pub migrate_legacy: bool,
}

/// Queue draining settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Retries granted to an operation after its first failed attempt.
    pub max_retries: u32,
    /// Pause between consecutive remote calls in one drain (milliseconds).
    pub request_spacing_ms: u64,
    /// Entity collections the client writes to.
    pub entity_types: Vec<String>,
}

/// Offline session cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// PBKDF2 iteration count for the device-bound key.
    pub kdf_iterations: u32,
    /// A cached session is treated as expired this many seconds early.
    pub expiry_buffer_secs: u64,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the REST API, e.g. `https://app.timegrid.io/api`.
    pub base_url: String,
    /// Transport timeout for a single request (seconds).
    pub timeout_secs: u64,
    /// Send the operation id as an `Idempotency-Key` header on creates.
    pub send_idempotency_key: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/timegrid/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("timegrid")
            .join("config.yaml")
    }

    /// Full path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.database_file)
    }

    /// Full path of the fallback JSON store.
    pub fn fallback_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.fallback_file)
    }

    /// Parsed entity types; invalid names are reported by [`Config::validate`].
    pub fn entity_types(&self) -> Vec<EntityType> {
        self.sync
            .entity_types
            .iter()
            .filter_map(|name| EntityType::new(name.as_str()).ok())
            .collect()
    }

    /// Every namespace the offline core writes, used by legacy migration.
    pub fn known_namespaces(&self) -> Vec<String> {
        let mut namespaces = vec![
            NS_SYNC_QUEUE.to_string(),
            NS_SESSION_ENCRYPTED.to_string(),
            NS_DEVICE_ID.to_string(),
        ];
        for entity in self.entity_types() {
            namespaces.push(entity.cached_namespace());
            namespaces.push(entity.offline_namespace());
        }
        namespaces
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("timegrid"),
            database_file: "timegrid.db".to_string(),
            fallback_file: "fallback-store.json".to_string(),
            preferred_capacity_mb: 512,
            fallback_quota_kb: 5 * 1024,
            warning_threshold_percent: 80,
            migrate_legacy: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_spacing_ms: 100,
            entity_types: ["time_entry", "project", "client", "invoice", "expense"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: 100_000,
            expiry_buffer_secs: 300,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
            send_idempotency_key: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.max_retries"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Lowest accepted PBKDF2 iteration count.
const MIN_KDF_ITERATIONS: u32 = 10_000;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- storage ---
        if self.storage.database_file.trim().is_empty() {
            push("storage.database_file", "must not be empty".into());
        }
        if self.storage.fallback_file.trim().is_empty() {
            push("storage.fallback_file", "must not be empty".into());
        }
        if self.storage.database_file == self.storage.fallback_file {
            push(
                "storage.fallback_file",
                "must differ from storage.database_file".into(),
            );
        }
        if self.storage.preferred_capacity_mb == 0 {
            push("storage.preferred_capacity_mb", "must be greater than 0".into());
        }
        if self.storage.fallback_quota_kb == 0 {
            push("storage.fallback_quota_kb", "must be greater than 0".into());
        }
        if self.storage.warning_threshold_percent == 0
            || self.storage.warning_threshold_percent > 100
        {
            push(
                "storage.warning_threshold_percent",
                "must be in range 1..=100".into(),
            );
        }

        // --- sync ---
        if self.sync.max_retries > 20 {
            push("sync.max_retries", "must be at most 20".into());
        }
        if self.sync.request_spacing_ms > 60_000 {
            push("sync.request_spacing_ms", "must be at most 60000".into());
        }
        if self.sync.entity_types.is_empty() {
            push("sync.entity_types", "must list at least one entity type".into());
        }
        for name in &self.sync.entity_types {
            if EntityType::new(name.as_str()).is_err() {
                push(
                    "sync.entity_types",
                    format!("invalid entity type '{name}'; use lowercase letters, digits and '_'"),
                );
            }
        }

        // --- session ---
        if self.session.kdf_iterations < MIN_KDF_ITERATIONS {
            push(
                "session.kdf_iterations",
                format!("must be at least {MIN_KDF_ITERATIONS}"),
            );
        }

        // --- remote ---
        if !(self.remote.base_url.starts_with("http://")
            || self.remote.base_url.starts_with("https://"))
        {
            push(
                "remote.base_url",
                format!("must be an http(s) URL, got '{}'", self.remote.base_url),
            );
        }
        if self.remote.timeout_secs == 0 {
            push("remote.timeout_secs", "must be greater than 0".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use timegrid_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .storage_data_dir(PathBuf::from("/tmp/timegrid"))
///     .sync_request_spacing_ms(0)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- storage ---

    pub fn storage_data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_dir = dir;
        self
    }

    pub fn storage_preferred_capacity_mb(mut self, mb: u64) -> Self {
        self.config.storage.preferred_capacity_mb = mb;
        self
    }

    pub fn storage_fallback_quota_kb(mut self, kb: u64) -> Self {
        self.config.storage.fallback_quota_kb = kb;
        self
    }

    pub fn storage_warning_threshold_percent(mut self, percent: u8) -> Self {
        self.config.storage.warning_threshold_percent = percent;
        self
    }

    pub fn storage_migrate_legacy(mut self, enabled: bool) -> Self {
        self.config.storage.migrate_legacy = enabled;
        self
    }

    // --- sync ---

    pub fn sync_max_retries(mut self, n: u32) -> Self {
        self.config.sync.max_retries = n;
        self
    }

    pub fn sync_request_spacing_ms(mut self, ms: u64) -> Self {
        self.config.sync.request_spacing_ms = ms;
        self
    }

    pub fn sync_entity_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.sync.entity_types = types.into_iter().map(Into::into).collect();
        self
    }

    // --- session ---

    pub fn session_kdf_iterations(mut self, n: u32) -> Self {
        self.config.session.kdf_iterations = n;
        self
    }

    pub fn session_expiry_buffer_secs(mut self, secs: u64) -> Self {
        self.config.session.expiry_buffer_secs = secs;
        self
    }

    // --- remote ---

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_timeout_secs(mut self, secs: u64) -> Self {
        self.config.remote.timeout_secs = secs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.storage.database_file, "timegrid.db");
        assert_eq!(cfg.storage.preferred_capacity_mb, 512);
        assert_eq!(cfg.storage.fallback_quota_kb, 5120);
        assert_eq!(cfg.storage.warning_threshold_percent, 80);
        assert!(cfg.storage.migrate_legacy);
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.sync.request_spacing_ms, 100);
        assert!(cfg.sync.entity_types.contains(&"time_entry".to_string()));
        assert_eq!(cfg.session.kdf_iterations, 100_000);
        assert_eq!(cfg.session.expiry_buffer_secs, 300);
        assert_eq!(cfg.remote.timeout_secs, 30);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.storage.data_dir.to_string_lossy().contains("timegrid"));
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
storage:
  data_dir: /tmp/timegrid-test
  fallback_quota_kb: 1024
  warning_threshold_percent: 90
sync:
  request_spacing_ms: 0
  entity_types: [time_entry, invoice]
session:
  kdf_iterations: 20000
remote:
  base_url: https://api.example.com/v1
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/timegrid-test"));
        assert_eq!(cfg.storage.fallback_quota_kb, 1024);
        assert_eq!(cfg.storage.warning_threshold_percent, 90);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.storage.database_file, "timegrid.db");
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.sync.request_spacing_ms, 0);
        assert_eq!(cfg.entity_types().len(), 2);
        assert_eq!(cfg.session.kdf_iterations, 20_000);
        assert_eq!(cfg.remote.base_url, "https://api.example.com/v1");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(
            cfg.database_path(),
            PathBuf::from("/tmp/timegrid-test/timegrid.db")
        );
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/timegrid/config.yaml"));
        assert_eq!(cfg.sync.max_retries, 3);
    }

    #[test]
    fn load_rejects_malformed_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"storage: [unclosed").unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_reports_every_problem() {
        let cfg = ConfigBuilder::new()
            .storage_warning_threshold_percent(0)
            .storage_fallback_quota_kb(0)
            .sync_entity_types(["time_entry", "Bad Name"])
            .session_kdf_iterations(10)
            .remote_base_url("ftp://nope")
            .logging_level("loud")
            .build();

        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"storage.warning_threshold_percent".to_string()));
        assert!(fields.contains(&"storage.fallback_quota_kb".to_string()));
        assert!(fields.contains(&"sync.entity_types".to_string()));
        assert!(fields.contains(&"session.kdf_iterations".to_string()));
        assert!(fields.contains(&"remote.base_url".to_string()));
        assert!(fields.contains(&"logging.level".to_string()));
    }

    #[test]
    fn build_validated_ok() {
        let cfg = ConfigBuilder::new()
            .sync_request_spacing_ms(0)
            .build_validated()
            .expect("valid config");
        assert_eq!(cfg.sync.request_spacing_ms, 0);
    }

    #[test]
    fn known_namespaces_cover_entities() {
        let cfg = ConfigBuilder::new().sync_entity_types(["project"]).build();
        let namespaces = cfg.known_namespaces();
        assert!(namespaces.contains(&"sync_queue".to_string()));
        assert!(namespaces.contains(&"session_encrypted".to_string()));
        assert!(namespaces.contains(&"device_id".to_string()));
        assert!(namespaces.contains(&"cached_project".to_string()));
        assert!(namespaces.contains(&"offline_project".to_string()));
        assert_eq!(namespaces.len(), 5);
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "sync.max_retries".into(),
            message: "must be at most 20".into(),
        };
        assert_eq!(err.to_string(), "sync.max_retries: must be at most 20");
    }
}
