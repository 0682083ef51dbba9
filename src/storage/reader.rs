//! Storage reader
//!
//! Wraps a read-only engine transaction as a [`StorageReader`].

use crate::engine::{EngineIterator, EngineReadTxn};
use crate::error::{RawKvError, Result};

use super::codec::{cf_prefix, key_with_cf};
use super::{DbIterator, StorageReader};

/// [`StorageReader`] over one engine snapshot
pub struct EngineReader<T: EngineReadTxn> {
    txn: T,
    closed: bool,
}

impl<T: EngineReadTxn> EngineReader<T> {
    pub fn new(txn: T) -> Self {
        Self { txn, closed: false }
    }
}

impl<T: EngineReadTxn> StorageReader for EngineReader<T> {
    fn get_cf(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.txn.get(&key_with_cf(cf, key)) {
            Ok(value) => Ok(Some(value)),
            Err(RawKvError::KeyNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn iter_cf(&self, cf: &str) -> Result<Box<dyn DbIterator>> {
        Ok(Box::new(CfIterator::new(self.txn.iter()?, cf)))
    }

    fn close(&mut self) {
        if !self.closed {
            self.txn.discard();
            self.closed = true;
        }
    }
}

impl<T: EngineReadTxn> Drop for EngineReader<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Engine iterator restricted to one column family
pub struct CfIterator<I: EngineIterator> {
    iter: Option<I>,
    prefix: Vec<u8>,
}

impl<I: EngineIterator> CfIterator<I> {
    pub fn new(mut iter: I, cf: &str) -> Self {
        let prefix = cf_prefix(cf);
        iter.seek(&prefix);
        Self {
            iter: Some(iter),
            prefix,
        }
    }
}

impl<I: EngineIterator> DbIterator for CfIterator<I> {
    fn seek(&mut self, key: &[u8]) {
        if let Some(iter) = self.iter.as_mut() {
            let mut target = self.prefix.clone();
            target.extend_from_slice(key);
            iter.seek(&target);
        }
    }

    fn valid(&self) -> bool {
        match &self.iter {
            Some(iter) => iter.valid() && iter.key().starts_with(&self.prefix),
            None => false,
        }
    }

    fn next(&mut self) {
        if let Some(iter) = self.iter.as_mut() {
            iter.next();
        }
    }

    fn key(&self) -> &[u8] {
        if !self.valid() {
            return &[];
        }
        match &self.iter {
            Some(iter) => &iter.key()[self.prefix.len()..],
            None => &[],
        }
    }

    fn value(&self) -> Result<Vec<u8>> {
        if !self.valid() {
            return Err(RawKvError::Storage(
                "iterator is not positioned on a key".to_string(),
            ));
        }
        match &self.iter {
            Some(iter) => iter.value(),
            None => Err(RawKvError::Storage("iterator closed".to_string())),
        }
    }

    fn close(&mut self) {
        self.iter = None;
    }
}
