use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment-driven process settings: everything about *how this process
/// runs* rather than the durable graph metadata in [`chunkedgraph_store::GraphMeta`]
/// (layer count, fanout, bit widths -- that lives in storage, written once
/// at graph creation, and is loaded separately via `GraphMeta::read_or_err`).
///
/// Mirrors the teacher's pattern of a flat config struct overridable by
/// environment variables via `clap`'s `env` feature, validated once before
/// any storage connection is attempted.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Path to the RocksDB data directory.
    #[arg(long, env = "CHUNKEDGRAPH_STORAGE_PATH")]
    pub storage_path: PathBuf,

    /// Default TTL for root locks acquired by the edit path, in milliseconds.
    #[arg(long, env = "CHUNKEDGRAPH_LOCK_TTL_MS", default_value_t = 60_000)]
    pub lock_ttl_ms: u64,

    /// Worker count for the ingest scheduler's thread pool. `0` means
    /// "use the number of logical CPUs", resolved in [`ProcessConfig::validate`].
    #[arg(long, env = "CHUNKEDGRAPH_INGEST_WORKERS", default_value_t = 0)]
    pub ingest_workers: usize,

    /// `tracing_subscriber::EnvFilter` directive string.
    #[arg(long, env = "CHUNKEDGRAPH_LOG_FILTER", default_value = "info")]
    pub log_filter: String,

    /// Emit structured JSON log lines instead of the human-readable format.
    #[arg(long, env = "CHUNKEDGRAPH_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Optional path to a virtual-table alias file (§4.K); absent means no
    /// aliases are configured and callers must pass graph ids directly.
    #[arg(long, env = "CHUNKEDGRAPH_VIRTUAL_TABLES")]
    pub virtual_tables_path: Option<PathBuf>,
}

impl ProcessConfig {
    /// Validate and normalize the configuration loaded from the environment
    /// or a config file. Called once, before any storage connection is
    /// opened; a failure here maps to exit code `2` at the CLI boundary.
    pub fn validate(mut self) -> ConfigResult<Self> {
        if self.lock_ttl_ms == 0 {
            return Err(ConfigError::Invalid("lock_ttl_ms must be greater than zero".into()));
        }
        if self.ingest_workers == 0 {
            self.ingest_workers = num_cpus::get().max(1);
        }
        Ok(self)
    }

    pub fn log_config(&self) -> chunkedgraph_o11y::LogConfig {
        chunkedgraph_o11y::LogConfig { filter: self.log_filter.clone(), json: self.log_json }
    }
}

/// A named alias for a dataset pinned to a `graph_id` and, optionally, a
/// historical commit timestamp, so operators and tooling can refer to a
/// stable view without threading an explicit `at` through every call.
///
/// Supplemented from the Python original's `VIRTUAL_TABLES` config dict
/// (`{alias: {table_id, timestamp}}`); `pinned_at: None` means "track head".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualTable {
    pub alias: String,
    pub graph_id: String,
    pub pinned_at: Option<chunkedgraph_store::Timestamp>,
}

/// A loaded table of virtual-table aliases, keyed by alias.
#[derive(Debug, Clone, Default)]
pub struct VirtualTables(std::collections::HashMap<String, VirtualTable>);

impl VirtualTables {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<VirtualTable>) -> Self {
        Self(entries.into_iter().map(|e| (e.alias.clone(), e)).collect())
    }

    /// Load a JSON array of [`VirtualTable`] entries from `path`.
    pub fn load(path: &std::path::Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::VirtualTableFile { path: path.to_path_buf(), reason: e.to_string() })?;
        let entries: Vec<VirtualTable> = serde_json::from_str(&text)
            .map_err(|e| ConfigError::VirtualTableFile { path: path.to_path_buf(), reason: e.to_string() })?;
        Ok(Self::from_entries(entries))
    }

    pub fn resolve(&self, alias: &str) -> ConfigResult<&VirtualTable> {
        self.0.get(alias).ok_or_else(|| ConfigError::UnknownVirtualTable(alias.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ProcessConfig {
        ProcessConfig {
            storage_path: PathBuf::from("/tmp/does-not-matter"),
            lock_ttl_ms: 60_000,
            ingest_workers: 0,
            log_filter: "info".into(),
            log_json: false,
            virtual_tables_path: None,
        }
    }

    #[test]
    fn zero_workers_resolves_to_cpu_count() {
        let cfg = base_config().validate().unwrap();
        assert!(cfg.ingest_workers >= 1);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut cfg = base_config();
        cfg.lock_ttl_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_alias_errors() {
        let tables = VirtualTables::from_entries(vec![VirtualTable {
            alias: "pinky100_sv16".into(),
            graph_id: "pinky100".into(),
            pinned_at: Some(42),
        }]);
        assert!(tables.resolve("pinky100_sv16").is_ok());
        assert!(tables.resolve("missing").is_err());
    }
}
