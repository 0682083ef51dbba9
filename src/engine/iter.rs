//! Snapshot iterator
//!
//! Lazy cursor over one snapshot. Each step looks up the next visible key
//! under a short read lock, so an open iterator never blocks commits.

use std::ops::Bound;
use std::sync::Arc;

use crate::error::{RawKvError, Result};

use super::txn::Snapshot;
use super::EngineIterator;

/// Iterator over the live keys of a snapshot, ascending
pub struct MvccIterator {
    snapshot: Arc<Snapshot>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl MvccIterator {
    pub(crate) fn new(snapshot: Arc<Snapshot>) -> Self {
        let mut iter = Self {
            snapshot,
            current: None,
        };
        iter.rewind();
        iter
    }
}

impl EngineIterator for MvccIterator {
    fn seek(&mut self, key: &[u8]) {
        self.current = self.snapshot.next_visible(Bound::Included(key));
    }

    fn rewind(&mut self) {
        self.current = self.snapshot.next_visible(Bound::Unbounded);
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.current = self.snapshot.next_visible(Bound::Excluded(key.as_slice()));
        }
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_slice()).unwrap_or(&[])
    }

    fn value(&self) -> Result<Vec<u8>> {
        self.current
            .as_ref()
            .map(|(_, v)| v.clone())
            .ok_or_else(|| RawKvError::Storage("iterator is not positioned on a key".to_string()))
    }
}
