//! TOML configuration for the `skeind` client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use skein_types::TransferConfig;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Blob and checkpoint storage.
    pub storage: StorageSection,
    /// Chunking and download tuning.
    pub transfer: TransferSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[storage]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend type: `"file"` (default) or `"memory"`.
    pub backend: String,
    /// Directory holding blobs and upload checkpoints.
    pub data_dir: PathBuf,
    /// Rebuild the storage client once it is older than this.
    pub client_max_age_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".skein"))
            .unwrap_or_else(|| PathBuf::from(".skein"));
        Self {
            backend: "file".to_string(),
            data_dir,
            client_max_age_secs: 300,
        }
    }
}

/// `[transfer]` section. Unset keys keep the built-in defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransferSection {
    pub app_name: Option<String>,
    /// Segment length in base64 characters.
    pub chunk_size: Option<usize>,
    /// Concurrent fetches per download batch.
    pub batch_width: Option<usize>,
    /// Pause between download batches; 0 only yields.
    pub batch_pause_ms: Option<u64>,
    pub hash_prefix_len: Option<usize>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective transfer settings.
    pub fn transfer_config(&self) -> TransferConfig {
        let mut config = TransferConfig::default();
        let t = &self.transfer;
        if let Some(name) = &t.app_name {
            config.app_name = name.clone();
        }
        if let Some(size) = t.chunk_size {
            config.chunk_size = size;
        }
        if let Some(width) = t.batch_width {
            config.batch_width = width;
        }
        if let Some(ms) = t.batch_pause_ms {
            config.batch_pause = Duration::from_millis(ms);
        }
        if let Some(len) = t.hash_prefix_len {
            config.hash_prefix_len = len;
        }
        config
    }

    /// Maximum age of the storage client.
    pub fn client_max_age(&self) -> Duration {
        Duration::from_secs(self.storage.client_max_age_secs)
    }

    /// Where file-backed blobs live.
    pub fn blob_dir(&self) -> PathBuf {
        self.storage.data_dir.join("blobs")
    }

    /// Where upload checkpoints live.
    pub fn progress_dir(&self) -> PathBuf {
        self.storage.data_dir.join("progress")
    }
}
