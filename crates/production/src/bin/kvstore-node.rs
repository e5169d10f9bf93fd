//! kvstore Node
//!
//! Production binary serving the key/value application to a consensus driver.
//!
//! # Usage
//!
//! ```bash
//! # Start with configuration file
//! kvstore-node --config node.toml
//!
//! # Override data directory and listen address
//! kvstore-node --config node.toml --data-dir /var/lib/kvstore --listen-addr 127.0.0.1:26658
//!
//! # Throwaway node with no durable state
//! kvstore-node --in-memory
//! ```
//!
//! See `NodeConfig` for the TOML layout.

use anyhow::{Context, Result};
use clap::Parser;
use kvstore_app::KvStoreApp;
use kvstore_production::{init_logging, ConfigOverrides, ExitOnFatal, NodeConfig, RpcServer};
use kvstore_storage::KvStore;
use kvstore_storage_memory::MemStorage;
use kvstore_storage_rocksdb::RocksDbStorage;
use kvstore_types::RequestInfo;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

/// kvstore Node
///
/// Serves the replicated key/value application over HTTP.
#[derive(Parser, Debug)]
#[command(name = "kvstore-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for RocksDB (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC listen address (overrides config)
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Clean the data directory on startup
    #[arg(long)]
    clean: bool,

    /// Path to log file (redirects all logs to this file)
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Keep state in memory only
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    config.apply_overrides(&ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        listen_addr: cli.listen_addr,
        log_file: cli.logfile.clone(),
        in_memory: cli.in_memory,
    });

    let _log_guard = init_logging(&cli.log_level, config.telemetry.log_file.as_deref())?;

    info!(version = env!("CARGO_PKG_VERSION"), "kvstore node starting...");

    if config.metrics.enabled {
        kvstore_metrics_prometheus::install();
    }

    if config.node.in_memory {
        info!("Using in-memory storage, state will not survive a restart");
        let storage = match config.storage.max_write_scope_bytes {
            Some(limit) => MemStorage::with_write_limit(limit),
            None => MemStorage::new(),
        };
        return run(config, storage).await;
    }

    // Clean data directory if requested via cli parameter
    if cli.clean {
        if config.node.data_dir.exists() {
            info!(
                "Cleaning data directory: {}",
                config.node.data_dir.display()
            );
            fs::remove_dir_all(&config.node.data_dir).with_context(|| {
                format!(
                    "Failed to clean data directory: {}",
                    config.node.data_dir.display()
                )
            })?;
        } else {
            info!(
                "Skipping clean: Data directory does not exist: {}",
                config.node.data_dir.display()
            );
        }
    }

    fs::create_dir_all(&config.node.data_dir).with_context(|| {
        format!(
            "Failed to create data directory: {}",
            config.node.data_dir.display()
        )
    })?;
    let storage = RocksDbStorage::open_with_config(&config.node.data_dir, config.storage.clone())
        .with_context(|| {
            format!(
                "Failed to open database at {}",
                config.node.data_dir.display()
            )
        })?;
    run(config, storage).await
}

async fn run<S: KvStore + 'static>(config: NodeConfig, storage: S) -> Result<()> {
    let app = KvStoreApp::new(Arc::new(storage));
    let info = app
        .info(&RequestInfo::default())
        .context("Failed to read committed height")?;
    info!(last_block_height = %info.last_block_height, "Application state loaded");

    let handle = RpcServer::new(config.rpc_server_config(), app, Arc::new(ExitOnFatal))
        .start()
        .await
        .context("Failed to start RPC server")?;
    handle.set_ready(true);

    info!(addr = %handle.local_addr(), "kvstore node started, press Ctrl+C to stop");

    wait_for_shutdown().await?;

    // An open block is dropped here; the driver replays it from the last commit
    handle.abort();
    info!("kvstore node shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C");
            }
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
