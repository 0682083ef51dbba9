//! # rawkv
//!
//! A single-node raw key-value server with:
//! - Column families (independent namespaces over one keyspace)
//! - Atomic write batches
//! - Snapshot-isolated reads and ordered scans
//! - Write-Ahead Logging (WAL) for durability
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │              (Acceptor + Worker Threads)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Raw API                                 │
//! │           (Get / Put / Delete / Scan handlers)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Standalone Storage                           │
//! │        (batches, readers, column-family codec)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │ MVCC Store  │
//!   │  (Append)   │          │  (RwLock)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod engine;
pub mod storage;
pub mod kvrpc;
pub mod server;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RawKvError, Result};
pub use config::Config;
pub use engine::MvccEngine;
pub use server::RawApi;
pub use storage::{Modify, StandaloneStorage, Storage, StorageReader};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rawkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
