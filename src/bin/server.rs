//! rawkv Server Binary
//!
//! Starts the TCP server for rawkv.

use std::sync::Arc;

use clap::Parser;
use rawkv::network::Server;
use rawkv::{Config, RawApi, StandaloneStorage, Storage};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{fmt, EnvFilter};

/// rawkv Server
#[derive(Parser, Debug)]
#[command(name = "rawkv-server")]
#[command(about = "Single-node raw key-value server with column families")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./rawkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:20160")]
    listen: String,

    /// Worker threads serving connections
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Maximum queued connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Close connections idle this long (seconds, 0 = never)
    #[arg(long, default_value = "600")]
    idle_timeout_secs: u64,

    /// fsync the WAL after every batch
    #[arg(long)]
    sync_every_write: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rawkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("rawkv server v{}", rawkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .worker_threads(args.workers)
        .max_connections(args.max_connections)
        .idle_timeout_ms(args.idle_timeout_secs.saturating_mul(1000));
    if args.sync_every_write {
        builder = builder.wal_sync_strategy(rawkv::config::WalSyncStrategy::EveryWrite);
    }
    let config = builder.build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let storage = Arc::new(StandaloneStorage::<rawkv::MvccEngine>::new(config.clone()));
    if let Err(e) = storage.start() {
        tracing::error!("Failed to start storage: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Storage started successfully");

    let mut server = Server::new(config, RawApi::new(storage.clone()));

    // SIGINT / SIGTERM flip the server's shutdown flag
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, server.shutdown_flag()) {
            tracing::error!("Failed to install signal handler: {}", e);
            std::process::exit(1);
        }
    }

    let result = server.run();

    if let Err(e) = storage.stop() {
        tracing::error!("Failed to stop storage cleanly: {}", e);
    }

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
