//! Configuration for rawkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{RawKvError, Result};

/// Main configuration for a rawkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── checkpoint.dat   (state written on clean shutdown)
    pub data_dir: PathBuf,

    /// Largest accepted physical key (column family prefix included)
    pub max_key_size: usize,

    /// Largest accepted value
    pub max_value_size: usize,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Number of worker threads serving connections
    pub worker_threads: usize,

    /// Max connections waiting for a worker, idle ones included
    pub max_connections: usize,

    /// Bound on reading the rest of a frame once it started (milliseconds,
    /// 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    /// Close connections that sent nothing for this long (milliseconds,
    /// 0 = never)
    pub idle_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./rawkv_data"),
            max_key_size: 65_000,
            max_value_size: 16 * 1024 * 1024 - 64 * 1024,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            listen_addr: "127.0.0.1:20160".to_string(),
            worker_threads: 8,
            max_connections: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            idle_timeout_ms: 600_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(RawKvError::Config("worker_threads must be at least 1".into()));
        }
        if self.max_connections == 0 {
            return Err(RawKvError::Config("max_connections must be at least 1".into()));
        }
        if self.max_key_size == 0 {
            return Err(RawKvError::Config("max_key_size must be at least 1".into()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(RawKvError::Config("WAL sync interval must be at least 1 entry".into()));
        }
        Ok(())
    }

    /// Path of the write-ahead log inside `data_dir`
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("wal.log")
    }

    /// Path of the shutdown checkpoint inside `data_dir`
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("checkpoint.dat")
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the largest accepted key (in bytes)
    pub fn max_key_size(mut self, size: usize) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the largest accepted value (in bytes)
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the number of connection worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the maximum number of queued connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the idle connection timeout (in milliseconds)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
