//! Node configuration.
//!
//! Example TOML:
//!
//! ```toml
//! [node]
//! data_dir = "./data"
//!
//! [rpc]
//! listen_addr = "0.0.0.0:8080"
//!
//! [storage]
//! sync_writes = true
//! compression = "lz4"
//!
//! [metrics]
//! enabled = true
//!
//! [telemetry]
//! log_file = "./logs/kvstore.log"
//! ```

use crate::rpc::RpcServerConfig;
use anyhow::{Context, Result};
use kvstore_storage_rocksdb::RocksDbConfig;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Node storage location
    #[serde(default)]
    pub node: NodeSettings,

    /// RPC server configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// RocksDB tunables
    #[serde(default)]
    pub storage: RocksDbConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// `[node]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSettings {
    /// Data directory for storage
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Keep state in memory only. Nothing survives a restart.
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            in_memory: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// `[rpc]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// HTTP listen address
    #[serde(default = "default_rpc_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_rpc_addr(),
        }
    }
}

fn default_rpc_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Serve `GET /metrics`
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// `[telemetry]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Optional log file path. If provided, logs are written to this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub listen_addr: Option<SocketAddr>,
    pub log_file: Option<PathBuf>,
    pub in_memory: bool,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref data_dir) = overrides.data_dir {
            self.node.data_dir = data_dir.clone();
        }

        if let Some(listen_addr) = overrides.listen_addr {
            self.rpc.listen_addr = listen_addr;
        }

        if let Some(ref log_file) = overrides.log_file {
            self.telemetry.log_file = Some(log_file.clone());
        }

        if overrides.in_memory {
            self.node.in_memory = true;
        }
    }

    /// Settings for [`crate::RpcServer`].
    pub fn rpc_server_config(&self) -> RpcServerConfig {
        RpcServerConfig {
            listen_addr: self.rpc.listen_addr,
            metrics_enabled: self.metrics.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvstore_storage_rocksdb::CompressionType;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config.node.data_dir, PathBuf::from("./data"));
        assert!(!config.node.in_memory);
        assert_eq!(config.rpc.listen_addr.port(), 8080);
        assert!(config.metrics.enabled);
        assert!(config.storage.sync_writes);
        assert!(config.telemetry.log_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("node.toml");
        fs::write(
            &path,
            r#"
[node]
data_dir = "/var/lib/kvstore"

[rpc]
listen_addr = "127.0.0.1:26658"

[storage]
sync_writes = false
compression = "zstd"
max_write_scope_bytes = 1048576

[metrics]
enabled = false
"#,
        )
        .unwrap();

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.node.data_dir, PathBuf::from("/var/lib/kvstore"));
        assert_eq!(config.rpc.listen_addr, "127.0.0.1:26658".parse().unwrap());
        assert!(!config.storage.sync_writes);
        assert!(matches!(config.storage.compression, CompressionType::Zstd));
        assert_eq!(config.storage.max_write_scope_bytes, Some(1024 * 1024));

        let rpc = config.rpc_server_config();
        assert!(!rpc.metrics_enabled);
        assert_eq!(rpc.listen_addr.port(), 26658);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let err = NodeConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "[rpc]\nlisten_addr = \"not an address\"\n").unwrap();
        let err = NodeConfig::load(&broken).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = NodeConfig::default();
        config.apply_overrides(&ConfigOverrides {
            data_dir: Some(PathBuf::from("/tmp/kv")),
            listen_addr: Some("127.0.0.1:9000".parse().unwrap()),
            log_file: Some(PathBuf::from("/tmp/kv.log")),
            in_memory: true,
        });
        assert_eq!(config.node.data_dir, PathBuf::from("/tmp/kv"));
        assert_eq!(config.rpc.listen_addr.port(), 9000);
        assert_eq!(config.telemetry.log_file, Some(PathBuf::from("/tmp/kv.log")));
        assert!(config.node.in_memory);

        // Absent overrides leave the file's values alone
        let mut config = NodeConfig::default();
        config.apply_overrides(&ConfigOverrides::default());
        assert_eq!(config.node.data_dir, PathBuf::from("./data"));
        assert!(!config.node.in_memory);
    }
}
