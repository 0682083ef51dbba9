//! Storage Module
//!
//! Column-family-partitioned access to the engine.
//!
//! ## Responsibilities
//! - Map `(cf, key)` pairs onto engine keys without collisions
//! - Apply write batches atomically
//! - Hand out snapshot readers with point lookups and ordered scans
//!
//! ## Layering
//! ```text
//! ┌───────────────────────────────┐
//! │ Storage / StorageReader       │  object-safe, used by the server
//! ├───────────────────────────────┤
//! │ StandaloneStorage<E>          │  owns the engine handle
//! ├───────────────────────────────┤
//! │ codec (cf, key) → engine key  │
//! ├───────────────────────────────┤
//! │ KvEngine (MvccEngine)         │
//! └───────────────────────────────┘
//! ```

pub mod codec;
mod reader;
mod standalone;

pub use reader::{CfIterator, EngineReader};
pub use standalone::StandaloneStorage;

use crate::error::Result;
use crate::kvrpc::Context;

// Conventional column family names. Any string names a column family;
// these carry no special behavior.

/// Default column family
pub const CF_DEFAULT: &str = "default";
pub const CF_LOCK: &str = "lock";
pub const CF_WRITE: &str = "write";

/// One operation of a write batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modify {
    Put {
        cf: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: String,
        key: Vec<u8>,
    },
}

impl Modify {
    pub fn put(cf: impl Into<String>, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Modify::Put {
            cf: cf.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(cf: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Modify::Delete {
            cf: cf.into(),
            key: key.into(),
        }
    }

    pub fn cf(&self) -> &str {
        match self {
            Modify::Put { cf, .. } => cf,
            Modify::Delete { cf, .. } => cf,
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Modify::Put { key, .. } => key,
            Modify::Delete { key, .. } => key,
        }
    }

    /// Value for a put, `None` for a delete
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Modify::Put { value, .. } => Some(value),
            Modify::Delete { .. } => None,
        }
    }
}

/// Server-facing storage
///
/// `StandaloneStorage` is the single-node implementation; other
/// implementations (e.g. replicated) satisfy the same contract.
pub trait Storage: Send + Sync {
    /// Open the underlying engine. Idempotent.
    fn start(&self) -> Result<()>;

    /// Flush and close the underlying engine. Idempotent.
    fn stop(&self) -> Result<()>;

    /// Apply `batch` atomically, in order
    ///
    /// Deleting an absent key is not an error.
    fn write(&self, ctx: &Context, batch: Vec<Modify>) -> Result<()>;

    /// Open a reader over a snapshot of the current state
    fn reader(&self, ctx: &Context) -> Result<Box<dyn StorageReader>>;
}

/// Snapshot reader
///
/// The snapshot is released by `close` or when the reader is dropped,
/// whichever comes first.
pub trait StorageReader: Send {
    /// Value of `key` in `cf`; `Ok(None)` when absent
    fn get_cf(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Iterator over `cf`, ascending by raw key, positioned at its first key
    fn iter_cf(&self, cf: &str) -> Result<Box<dyn DbIterator>>;

    /// Release the snapshot. Idempotent.
    fn close(&mut self);
}

/// Cursor over one column family; keys are raw (cf prefix stripped)
pub trait DbIterator: Send {
    /// Position at the first key `>= key`
    fn seek(&mut self, key: &[u8]);

    fn valid(&self) -> bool;

    fn next(&mut self);

    /// Current raw key; empty when not valid
    fn key(&self) -> &[u8];

    fn value(&self) -> Result<Vec<u8>>;

    /// Release the iterator. Idempotent.
    fn close(&mut self);
}
