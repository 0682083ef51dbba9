//! Engine Module
//!
//! The transactional key-value engine underneath the storage layer.
//!
//! ## Responsibilities
//! - Point reads, writes and deletes by opaque byte key
//! - Read-only transactions over an immutable snapshot
//! - Read-write transactions committed atomically
//! - Ordered iteration with seek, in plain byte order
//!
//! The storage layer only talks to the traits below, so any engine that
//! satisfies them can be dropped in. [`MvccEngine`] is the bundled one.

mod checkpoint;
mod iter;
mod mvcc;
mod txn;

pub use checkpoint::Checkpoint;
pub use iter::MvccIterator;
pub use mvcc::MvccEngine;
pub use txn::{MvccReadTxn, MvccWriteTxn};

use crate::config::Config;
use crate::error::Result;

/// A transactional key-value engine
pub trait KvEngine: Send + Sync + Sized + 'static {
    type ReadTxn: EngineReadTxn;
    type WriteTxn: EngineWriteTxn;

    /// Open or create the engine described by `config`
    fn open(config: &Config) -> Result<Self>;

    /// Start a read-only transaction pinned to the latest committed state
    fn begin_read(&self) -> Result<Self::ReadTxn>;

    /// Start a read-write transaction
    fn begin_write(&self) -> Result<Self::WriteTxn>;

    /// Flush and close; later transactions fail. Idempotent.
    fn close(&self) -> Result<()>;
}

/// A read-only transaction
pub trait EngineReadTxn: Send + 'static {
    type Iter: EngineIterator;

    /// Value of `key`, or `KeyNotFound`
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Iterator over every key in the snapshot, positioned at the first one
    fn iter(&self) -> Result<Self::Iter>;

    /// Release the snapshot. Idempotent.
    fn discard(&mut self);
}

/// A read-write transaction
///
/// Writes are invisible to everyone else until `commit`. Dropping an
/// uncommitted transaction discards it.
pub trait EngineWriteTxn: Send {
    /// Buffer `key = value`
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Buffer the removal of `key`
    ///
    /// Returns `KeyNotFound` if the key is absent in this transaction's
    /// view; the removal is still buffered and the transaction stays usable.
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Apply every buffered write atomically
    fn commit(self) -> Result<()>;

    /// Drop every buffered write
    fn discard(self);
}

/// Ordered cursor over a snapshot
pub trait EngineIterator: Send + 'static {
    /// Position at the first key `>= key`
    fn seek(&mut self, key: &[u8]);

    /// Position at the first key
    fn rewind(&mut self);

    fn valid(&self) -> bool;

    /// Advance to the next key
    fn next(&mut self);

    /// Current key; empty when not valid
    fn key(&self) -> &[u8];

    /// Current value
    fn value(&self) -> Result<Vec<u8>>;
}
