//! MVCC Engine
//!
//! In-memory multi-version store made durable by the WAL and a checkpoint
//! written on close.
//!
//! ## Concurrency Model
//!
//! - **Commits**: serialized by the WAL mutex. A commit appends the batch
//!   to the WAL, installs every mutation at `commit_ts` and publishes
//!   `commit_ts` as the latest committed version, all under the data
//!   write lock.
//! - **Reads**: a snapshot records the latest published version when it is
//!   taken and only sees versions at or below it. Reads take the data
//!   `RwLock` for one lookup at a time.
//! - **Pruning**: on commit, versions of the touched keys that no live
//!   snapshot can see any more are dropped. Keys still carrying history
//!   are remembered as stale and swept again whenever the oldest live
//!   snapshot moves forward, on commit or on snapshot release.
//!
//! Lock order: `wal` → `data` → `readers`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::{RawKvError, Result};
use crate::wal::{Mutation, WalRecovery, WalWriter};

use super::checkpoint::Checkpoint;
use super::txn::{MvccReadTxn, MvccWriteTxn};
use super::KvEngine;

/// One committed version of a key; `None` is a tombstone
#[derive(Debug, Clone)]
struct Version {
    ts: u64,
    value: Option<Vec<u8>>,
}

/// Versions of a key, oldest first
type VersionChain = Vec<Version>;

fn visible(chain: &[Version], ts: u64) -> Option<&Version> {
    chain.iter().rev().find(|v| v.ts <= ts)
}

/// Drop versions hidden from every snapshot at or above `watermark`
///
/// Returns true when nothing but an invisible tombstone is left.
fn prune(chain: &mut VersionChain, watermark: u64) -> bool {
    if let Some(keep_from) = chain.iter().rposition(|v| v.ts <= watermark) {
        chain.drain(..keep_from);
    }
    chain.len() == 1 && chain[0].value.is_none() && chain[0].ts <= watermark
}

/// Key → versions, plus the keys a later sweep may shrink
#[derive(Default)]
struct Keyspace {
    map: BTreeMap<Vec<u8>, VersionChain>,

    /// Keys with older versions or a tombstone still in their chain
    stale: BTreeSet<Vec<u8>>,

    /// Watermark of the last sweep
    swept_at: u64,
}

impl Keyspace {
    fn prune_key(&mut self, key: &[u8], watermark: u64) {
        let Some(chain) = self.map.get_mut(key) else {
            self.stale.remove(key);
            return;
        };
        if prune(chain, watermark) {
            self.map.remove(key);
            self.stale.remove(key);
        } else if chain.len() > 1 || chain[0].value.is_none() {
            self.stale.insert(key.to_vec());
        } else {
            self.stale.remove(key);
        }
    }

    fn needs_sweep(&self, watermark: u64) -> bool {
        watermark > self.swept_at && !self.stale.is_empty()
    }

    /// Prune every stale key against `watermark`
    fn sweep(&mut self, watermark: u64) {
        if !self.needs_sweep(watermark) {
            return;
        }
        self.swept_at = watermark;
        let before = self.stale.len();
        for key in std::mem::take(&mut self.stale) {
            self.prune_key(&key, watermark);
        }
        tracing::trace!(
            "swept {} stale keys at version {}, {} left",
            before,
            watermark,
            self.stale.len()
        );
    }
}

/// Versioned key space plus the table of live snapshots
pub(crate) struct Store {
    data: RwLock<Keyspace>,

    /// Latest published commit version
    last_commit: AtomicU64,

    /// read_ts → number of live snapshots at that version
    readers: Mutex<BTreeMap<u64, usize>>,
}

impl Store {
    fn new(base_ts: u64) -> Self {
        Self {
            data: RwLock::new(Keyspace::default()),
            last_commit: AtomicU64::new(base_ts),
            readers: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn last_commit(&self) -> u64 {
        self.last_commit.load(Ordering::SeqCst)
    }

    /// Value of `key` as of `ts`
    pub(crate) fn get(&self, key: &[u8], ts: u64) -> Option<Vec<u8>> {
        let data = self.data.read();
        data.map
            .get(key)
            .and_then(|chain| visible(chain, ts))
            .and_then(|v| v.value.clone())
    }

    /// First live pair as of `ts` whose key lies after `from`
    pub(crate) fn next_visible(&self, from: Bound<&[u8]>, ts: u64) -> Option<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        data.map
            .range::<[u8], _>((from, Bound::Unbounded))
            .find_map(|(key, chain)| {
                visible(chain, ts)
                    .and_then(|v| v.value.as_ref())
                    .map(|value| (key.clone(), value.clone()))
            })
    }

    /// Install `batch` at version `ts` and publish it
    fn apply(&self, ts: u64, batch: &[Mutation]) {
        let mut data = self.data.write();
        for mutation in batch {
            let version = match mutation {
                Mutation::Set { value, .. } => Version {
                    ts,
                    value: Some(value.clone()),
                },
                Mutation::Delete { .. } => Version { ts, value: None },
            };
            data.map
                .entry(mutation.key().to_vec())
                .or_default()
                .push(version);
        }

        let watermark = self.publish(ts);
        for mutation in batch {
            data.prune_key(mutation.key(), watermark);
        }
        data.sweep(watermark);
    }

    /// Publish `ts` and return the oldest version any live or future
    /// snapshot can read
    ///
    /// Both happen under the readers lock, so no snapshot can register
    /// at an older version once the watermark is computed.
    fn publish(&self, ts: u64) -> u64 {
        let readers = self.readers.lock();
        self.last_commit.store(ts, Ordering::SeqCst);
        readers.keys().next().copied().unwrap_or(ts)
    }

    pub(crate) fn register_reader(&self) -> u64 {
        let mut readers = self.readers.lock();
        let ts = self.last_commit();
        *readers.entry(ts).or_insert(0) += 1;
        ts
    }

    /// Drop one snapshot at `ts` and sweep if that let the watermark move
    pub(crate) fn release_reader(&self, ts: u64) {
        {
            let mut readers = self.readers.lock();
            if let Some(count) = readers.get_mut(&ts) {
                *count -= 1;
                if *count == 0 {
                    readers.remove(&ts);
                }
            }
        }

        if !self.data.read().needs_sweep(self.watermark()) {
            return;
        }
        let mut data = self.data.write();
        let watermark = self.watermark();
        data.sweep(watermark);
    }

    /// Oldest version any live or future snapshot can read
    fn watermark(&self) -> u64 {
        let readers = self.readers.lock();
        readers
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.last_commit())
    }

    /// Number of live snapshots
    pub(crate) fn live_snapshots(&self) -> usize {
        self.readers.lock().values().sum()
    }

    fn key_count(&self) -> usize {
        self.data.read().map.len()
    }

    fn version_count(&self) -> usize {
        self.data.read().map.values().map(Vec::len).sum()
    }

    /// Latest live value of every key, in key order
    fn latest_live(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        data.map
            .iter()
            .filter_map(|(key, chain)| {
                chain
                    .last()
                    .and_then(|v| v.value.as_ref())
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect()
    }
}

/// State shared by the engine handle and every transaction
pub(crate) struct Inner {
    pub(crate) config: Config,
    pub(crate) store: Store,

    /// Commit lock; `None` once the engine is closed
    wal: Mutex<Option<WalWriter>>,

    closed: AtomicBool,
}

impl Inner {
    /// Make `batch` durable and visible as one new version
    pub(crate) fn commit(&self, batch: Vec<Mutation>) -> Result<u64> {
        let mut wal = self.wal.lock();
        let wal = wal
            .as_mut()
            .ok_or_else(|| RawKvError::Storage("engine closed".to_string()))?;

        wal.append(&batch)?;
        let ts = self.store.last_commit() + 1;
        self.store.apply(ts, &batch);
        tracing::trace!("committed {} mutations at version {}", batch.len(), ts);
        Ok(ts)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RawKvError::Storage("engine closed".to_string()));
        }
        Ok(())
    }
}

/// The bundled engine: MVCC in memory, WAL + checkpoint on disk
///
/// Cloning is cheap and every clone refers to the same engine.
#[derive(Clone)]
pub struct MvccEngine {
    inner: Arc<Inner>,
}

impl MvccEngine {
    /// Latest committed version
    pub fn last_commit(&self) -> u64 {
        self.inner.store.last_commit()
    }

    /// Number of snapshots currently held by transactions or iterators
    pub fn live_snapshots(&self) -> usize {
        self.inner.store.live_snapshots()
    }

    /// Number of distinct keys holding at least one version
    pub fn key_count(&self) -> usize {
        self.inner.store.key_count()
    }

    /// Number of versions held across all keys, tombstones included
    pub fn version_count(&self) -> usize {
        self.inner.store.version_count()
    }
}

impl KvEngine for MvccEngine {
    type ReadTxn = MvccReadTxn;
    type WriteTxn = MvccWriteTxn;

    /// Open or create the engine
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Load the checkpoint, if any
    /// 3. Replay WAL batches on top of it (torn tail truncated)
    /// 4. Reopen the WAL for appends
    fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let checkpoint = Checkpoint::load(&config.checkpoint_path())?;
        let base_ts = checkpoint.as_ref().map(|c| c.commit_ts).unwrap_or(0);
        let store = Store::new(base_ts);

        if let Some(checkpoint) = checkpoint {
            let batch: Vec<Mutation> = checkpoint
                .entries
                .into_iter()
                .map(|(key, value)| Mutation::Set { key, value })
                .collect();
            if !batch.is_empty() {
                store.apply(base_ts, &batch);
            }
            tracing::info!("Loaded checkpoint with {} keys at version {}", batch.len(), base_ts);
        }

        let wal_path = config.wal_path();
        let (entries, recovery) = WalRecovery::recover(&wal_path)?;
        if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
            tracing::info!(
                "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                recovery.entries_recovered,
                recovery.entries_corrupted,
                recovery.last_lsn
            );
        }
        for entry in &entries {
            let ts = store.last_commit() + 1;
            store.apply(ts, &entry.batch);
        }

        let wal = WalWriter::open_at(&wal_path, config.wal_sync_strategy, recovery.last_lsn)?;

        tracing::debug!(
            "MVCC engine opened at {:?} (version {})",
            config.data_dir,
            store.last_commit()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config: config.clone(),
                store,
                wal: Mutex::new(Some(wal)),
                closed: AtomicBool::new(false),
            }),
        })
    }

    fn begin_read(&self) -> Result<MvccReadTxn> {
        self.inner.ensure_open()?;
        Ok(MvccReadTxn::new(Arc::clone(&self.inner)))
    }

    fn begin_write(&self) -> Result<MvccWriteTxn> {
        self.inner.ensure_open()?;
        Ok(MvccWriteTxn::new(Arc::clone(&self.inner)))
    }

    /// Close the engine gracefully
    ///
    /// Writes a checkpoint of the latest state, then truncates the WAL
    /// it supersedes.
    fn close(&self) -> Result<()> {
        let mut guard = self.inner.wal.lock();
        let Some(mut wal) = guard.take() else {
            return Ok(());
        };
        self.inner.closed.store(true, Ordering::SeqCst);

        wal.sync()?;
        let checkpoint = Checkpoint {
            commit_ts: self.inner.store.last_commit(),
            entries: self.inner.store.latest_live(),
        };
        checkpoint.write(&self.inner.config.checkpoint_path())?;
        wal.truncate()?;

        tracing::info!(
            "MVCC engine closed: checkpoint of {} keys at version {}",
            checkpoint.entries.len(),
            checkpoint.commit_ts
        );
        Ok(())
    }
}
