//! MVCC transactions

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{RawKvError, Result};
use crate::wal::Mutation;

use super::iter::MvccIterator;
use super::mvcc::Inner;
use super::{EngineReadTxn, EngineWriteTxn};

/// A registered read version; unregistered when the last holder drops it
pub(crate) struct Snapshot {
    inner: Arc<Inner>,
    read_ts: u64,
}

impl Snapshot {
    pub(crate) fn acquire(inner: Arc<Inner>) -> Arc<Self> {
        let read_ts = inner.store.register_reader();
        Arc::new(Self { inner, read_ts })
    }

    pub(crate) fn read_ts(&self) -> u64 {
        self.read_ts
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.store.get(key, self.read_ts)
    }

    pub(crate) fn next_visible(
        &self,
        from: std::ops::Bound<&[u8]>,
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        self.inner.store.next_visible(from, self.read_ts)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.inner.store.release_reader(self.read_ts);
    }
}

// =============================================================================
// Read-only transaction
// =============================================================================

/// Read-only transaction over one snapshot
pub struct MvccReadTxn {
    snapshot: Option<Arc<Snapshot>>,
}

impl MvccReadTxn {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self {
            snapshot: Some(Snapshot::acquire(inner)),
        }
    }

    /// Version this transaction reads at, if still open
    pub fn read_ts(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.read_ts())
    }

    fn snapshot(&self) -> Result<&Arc<Snapshot>> {
        self.snapshot.as_ref().ok_or(RawKvError::TxnClosed)
    }
}

impl EngineReadTxn for MvccReadTxn {
    type Iter = MvccIterator;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.snapshot()?.get(key).ok_or(RawKvError::KeyNotFound)
    }

    fn iter(&self) -> Result<MvccIterator> {
        Ok(MvccIterator::new(Arc::clone(self.snapshot()?)))
    }

    fn discard(&mut self) {
        self.snapshot = None;
    }
}

// =============================================================================
// Read-write transaction
// =============================================================================

/// Read-write transaction
///
/// Writes are buffered per key (last write wins inside the transaction)
/// and reach the engine in one commit.
pub struct MvccWriteTxn {
    snapshot: Arc<Snapshot>,

    /// key → Some(value) for a set, None for a delete
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MvccWriteTxn {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self {
            snapshot: Snapshot::acquire(inner),
            pending: BTreeMap::new(),
        }
    }

    /// Number of distinct keys written so far
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(RawKvError::InvalidArgument("key cannot be empty".to_string()));
        }
        let max = self.snapshot.inner.config.max_key_size;
        if key.len() > max {
            return Err(RawKvError::InvalidArgument(format!(
                "key of {} bytes exceeds maximum {}",
                key.len(),
                max
            )));
        }
        Ok(())
    }

    /// Whether `key` holds a value in this transaction's view
    fn exists(&self, key: &[u8]) -> bool {
        match self.pending.get(key) {
            Some(pending) => pending.is_some(),
            None => self.snapshot.get(key).is_some(),
        }
    }
}

impl EngineWriteTxn for MvccWriteTxn {
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let max = self.snapshot.inner.config.max_value_size;
        if value.len() > max {
            return Err(RawKvError::InvalidArgument(format!(
                "value of {} bytes exceeds maximum {}",
                value.len(),
                max
            )));
        }
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        let existed = self.exists(key);
        self.pending.insert(key.to_vec(), None);
        if existed {
            Ok(())
        } else {
            Err(RawKvError::KeyNotFound)
        }
    }

    fn commit(self) -> Result<()> {
        let Self { snapshot, pending } = self;
        if pending.is_empty() {
            return Ok(());
        }

        // Release the read version first so it does not hold back pruning
        let inner = Arc::clone(&snapshot.inner);
        drop(snapshot);

        let batch: Vec<Mutation> = pending
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => Mutation::Set { key, value },
                None => Mutation::Delete { key },
            })
            .collect();
        inner.commit(batch)?;
        Ok(())
    }

    fn discard(self) {}
}
