//! Standalone storage
//!
//! Single-node [`Storage`]: all data lives in the local engine and nothing
//! is replicated.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::engine::{EngineWriteTxn, KvEngine, MvccEngine};
use crate::error::{RawKvError, Result};
use crate::kvrpc::Context;

use super::codec::key_with_cf;
use super::reader::EngineReader;
use super::{Modify, Storage, StorageReader};

/// Single-node storage over one engine handle
///
/// ## Concurrency
/// The lock only guards the handle's lifetime (start/stop). Each call
/// clones the `Arc` out and releases the lock before touching the engine;
/// isolation between calls is the engine's job.
pub struct StandaloneStorage<E: KvEngine = MvccEngine> {
    config: Config,
    engine: RwLock<Option<Arc<E>>>,
}

impl<E: KvEngine> StandaloneStorage<E> {
    /// Create a stopped storage; call [`Storage::start`] before use
    pub fn new(config: Config) -> Self {
        Self {
            config,
            engine: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.engine.read().is_some()
    }

    /// The running engine handle
    pub fn engine(&self) -> Result<Arc<E>> {
        self.engine.read().clone().ok_or(RawKvError::NotStarted)
    }
}

impl<E: KvEngine> Storage for StandaloneStorage<E> {
    fn start(&self) -> Result<()> {
        let mut engine = self.engine.write();
        if engine.is_some() {
            return Ok(());
        }
        *engine = Some(Arc::new(E::open(&self.config)?));
        tracing::info!("Standalone storage started at {:?}", self.config.data_dir);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let engine = self.engine.write().take();
        if let Some(engine) = engine {
            engine.close()?;
            tracing::info!("Standalone storage stopped");
        }
        Ok(())
    }

    /// Write a batch in one engine transaction
    ///
    /// Any failing operation discards the transaction, so nothing of the
    /// batch is applied. `KeyNotFound` from a delete is not a failure.
    fn write(&self, ctx: &Context, batch: Vec<Modify>) -> Result<()> {
        let engine = self.engine()?;
        tracing::trace!("write of {} ops, region {}", batch.len(), ctx.region_id);

        let mut txn = engine.begin_write()?;
        for modify in &batch {
            let key = key_with_cf(modify.cf(), modify.key());
            let result = match modify.value() {
                Some(value) => txn.set(&key, value),
                None => match txn.delete(&key) {
                    Err(e) if e.is_key_not_found() => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = result {
                txn.discard();
                return Err(e);
            }
        }
        txn.commit()
    }

    fn reader(&self, ctx: &Context) -> Result<Box<dyn StorageReader>> {
        let engine = self.engine()?;
        tracing::trace!("reader for region {}", ctx.region_id);
        let txn = engine.begin_read()?;
        Ok(Box::new(EngineReader::new(txn)))
    }
}
