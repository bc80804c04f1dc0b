//! Embedded in-memory implementation of the transactional KV boundary.
//!
//! One ordered keyspace (`BTreeMap`) whose values are per-key version
//! chains: each version carries the commit timestamp of the transaction
//! that wrote it, with `None` as a deletion tombstone. Snapshots are a
//! read timestamp; a reader sees the newest version committed at or before
//! its timestamp.
//!
//! Transactions are optimistic: reads are validated at commit under the
//! keyspace write lock, writes are buffered and applied atomically with a
//! fresh commit timestamp. `run_in_txn` re-executes the body on conflict
//! up to the configured retry budget.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use sable_common::config::KvConfig;
use sable_common::{SableError, SableResult};

use crate::store::{KvStore, Snapshot, Transaction};

type Key = Vec<u8>;

// TODO: truncate version chains below the oldest outstanding snapshot so
// long-running processes don't accumulate dead versions.

/// One committed version of a key. `value == None` is a tombstone.
#[derive(Debug, Clone)]
struct Version {
    commit_ts: u64,
    value: Option<Vec<u8>>,
}

/// Version chain for a single key, ascending by commit timestamp.
type Chain = Vec<Version>;

fn visible(chain: &Chain, ts: u64) -> Option<&Version> {
    chain.iter().rev().find(|v| v.commit_ts <= ts)
}

#[derive(Debug)]
struct Inner {
    keyspace: RwLock<BTreeMap<Key, Chain>>,
    /// Last assigned commit timestamp. Assignment happens under the
    /// keyspace write lock, so commits are totally ordered.
    commit_ts: AtomicU64,
    config: KvConfig,
}

/// Embedded transactional ordered KV store.
#[derive(Debug, Clone)]
pub struct MemStore {
    inner: Arc<Inner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::with_config(KvConfig::default())
    }

    pub fn with_config(config: KvConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                keyspace: RwLock::new(BTreeMap::new()),
                commit_ts: AtomicU64::new(0),
                config,
            }),
        }
    }

    fn snapshot_at(&self, ts: u64) -> MemSnapshot {
        MemSnapshot {
            inner: Arc::clone(&self.inner),
            ts,
        }
    }

    /// Validate the transaction's footprint and apply its writes.
    ///
    /// A transaction conflicts when any key it read or is about to write
    /// gained a newer committed version after the transaction's start
    /// timestamp.
    fn try_commit(&self, txn: &MemTxn) -> Result<(), Conflict> {
        let mut keyspace = self.inner.keyspace.write();

        let newer_than_start = |key: &Key| -> bool {
            keyspace
                .get(key)
                .and_then(|chain| chain.last())
                .map(|v| v.commit_ts > txn.snapshot.ts)
                .unwrap_or(false)
        };

        if txn.reads.iter().any(|k| newer_than_start(k))
            || txn.writes.keys().any(|k| newer_than_start(k))
        {
            return Err(Conflict);
        }

        if txn.writes.is_empty() {
            return Ok(());
        }

        let ts = self.inner.commit_ts.fetch_add(1, Ordering::SeqCst) + 1;
        for (key, value) in &txn.writes {
            keyspace.entry(key.clone()).or_default().push(Version {
                commit_ts: ts,
                value: value.clone(),
            });
        }
        Ok(())
    }
}

struct Conflict;

impl KvStore for MemStore {
    type Snapshot = MemSnapshot;
    type Txn = MemTxn;

    fn get(&self, key: &[u8]) -> SableResult<Option<Vec<u8>>> {
        self.newest_snapshot()?.get(key)
    }

    fn newest_snapshot(&self) -> SableResult<MemSnapshot> {
        Ok(self.snapshot_at(self.inner.commit_ts.load(Ordering::SeqCst)))
    }

    fn run_in_txn<T, F>(&self, mut body: F) -> SableResult<T>
    where
        F: FnMut(&mut MemTxn) -> SableResult<T>,
    {
        let budget = self.inner.config.max_txn_retries;
        let mut attempt = 0;
        loop {
            let mut txn = MemTxn {
                snapshot: self.newest_snapshot()?,
                writes: BTreeMap::new(),
                reads: Vec::new(),
            };
            let out = body(&mut txn)?;
            match self.try_commit(&txn) {
                Ok(()) => return Ok(out),
                Err(Conflict) => {
                    attempt += 1;
                    if attempt > budget {
                        return Err(SableError::Conflict { retries: budget });
                    }
                    debug!(attempt, "transaction conflict, retrying");
                }
            }
        }
    }
}

/// Read view at a fixed commit timestamp.
#[derive(Debug, Clone)]
pub struct MemSnapshot {
    inner: Arc<Inner>,
    ts: u64,
}

impl Snapshot for MemSnapshot {
    fn get(&self, key: &[u8]) -> SableResult<Option<Vec<u8>>> {
        let keyspace = self.inner.keyspace.read();
        Ok(keyspace
            .get(key)
            .and_then(|chain| visible(chain, self.ts))
            .and_then(|v| v.value.clone()))
    }

    fn scan_keys(
        &self,
        start: &[u8],
        end: &[u8],
        offset: u64,
        limit: u64,
    ) -> SableResult<Vec<Vec<u8>>> {
        if start >= end || limit == 0 {
            return Ok(Vec::new());
        }
        let keyspace = self.inner.keyspace.read();
        let live = keyspace
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .filter(|(_, chain)| {
                visible(chain, self.ts).map(|v| v.value.is_some()).unwrap_or(false)
            })
            .map(|(key, _)| key.clone());
        Ok(live
            .skip(offset as usize)
            .take(limit.min(usize::MAX as u64) as usize)
            .collect())
    }
}

/// Open transaction: buffered writes over a start snapshot.
#[derive(Debug)]
pub struct MemTxn {
    snapshot: MemSnapshot,
    /// Buffered writes; `None` is a pending deletion.
    writes: BTreeMap<Key, Option<Vec<u8>>>,
    /// Keys read through the transaction, validated at commit.
    reads: Vec<Key>,
}

impl Transaction for MemTxn {
    type Snapshot = MemSnapshot;

    fn get(&mut self, key: &[u8]) -> SableResult<Option<Vec<u8>>> {
        if let Some(buffered) = self.writes.get(key) {
            return Ok(buffered.clone());
        }
        self.reads.push(key.to_vec());
        self.snapshot.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> SableResult<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> SableResult<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn snapshot(&self) -> &MemSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(store: &MemStore, key: &[u8], value: &[u8]) {
        store
            .run_in_txn(|txn| txn.set(key, value))
            .expect("autocommit set");
    }

    #[test]
    fn test_get_absent_is_none() {
        let store = MemStore::new();
        assert_eq!(store.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let store = MemStore::new();
        put(&store, b"k", b"v");
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_delete_leaves_tombstone() {
        let store = MemStore::new();
        put(&store, b"k", b"v");
        store.run_in_txn(|txn| txn.delete(b"k")).unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
        // Tombstoned keys must not appear in scans.
        let snap = store.newest_snapshot().unwrap();
        assert!(snap.scan_keys(b"a", b"z", 0, 100).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_does_not_see_later_commits() {
        let store = MemStore::new();
        put(&store, b"k", b"old");
        let snap = store.newest_snapshot().unwrap();
        put(&store, b"k", b"new");
        assert_eq!(snap.get(b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_scan_is_ordered_and_half_open() {
        let store = MemStore::new();
        for k in [&b"a"[..], b"b", b"c", b"d"] {
            put(&store, k, b"1");
        }
        let snap = store.newest_snapshot().unwrap();
        let keys = snap.scan_keys(b"b", b"d", 0, 100).unwrap();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_scan_offset_and_limit() {
        let store = MemStore::new();
        for k in [&b"a"[..], b"b", b"c", b"d", b"e"] {
            put(&store, k, b"1");
        }
        let snap = store.newest_snapshot().unwrap();
        let keys = snap.scan_keys(b"a", b"z", 1, 2).unwrap();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
        // Window past the end clamps to empty.
        assert!(snap.scan_keys(b"a", b"z", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_txn_reads_its_own_writes() {
        let store = MemStore::new();
        put(&store, b"k", b"committed");
        store
            .run_in_txn(|txn| {
                txn.set(b"k", b"buffered")?;
                assert_eq!(txn.get(b"k")?, Some(b"buffered".to_vec()));
                txn.delete(b"k")?;
                assert_eq!(txn.get(b"k")?, None);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_txn_snapshot_ignores_buffered_writes() {
        let store = MemStore::new();
        put(&store, b"k", b"committed");
        store
            .run_in_txn(|txn| {
                txn.set(b"k", b"buffered")?;
                assert_eq!(txn.snapshot().get(b"k")?, Some(b"committed".to_vec()));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_failed_body_commits_nothing() {
        let store = MemStore::new();
        let result: SableResult<()> = store.run_in_txn(|txn| {
            txn.set(b"k", b"v")?;
            Err(SableError::Internal("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn test_conflicting_commit_retries_body() {
        let store = MemStore::new();
        put(&store, b"k", b"0");
        let mut attempts = 0;
        store
            .run_in_txn(|txn| {
                attempts += 1;
                let _ = txn.get(b"k")?;
                if attempts == 1 {
                    // A competing writer lands between this body and its
                    // commit; the read of "k" is then stale.
                    store.run_in_txn(|inner| inner.set(b"k", b"1")).unwrap();
                }
                txn.set(b"k", b"2")
            })
            .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(store.get(b"k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_retry_budget_exhaustion_is_conflict_error() {
        let store = MemStore::with_config(KvConfig { max_txn_retries: 2 });
        put(&store, b"k", b"0");
        let err = store
            .run_in_txn(|txn| {
                let _ = txn.get(b"k")?;
                // Every attempt loses the race.
                store.run_in_txn(|inner| inner.set(b"k", b"x")).unwrap();
                txn.set(b"k", b"y")
            })
            .unwrap_err();
        assert!(matches!(err, SableError::Conflict { retries: 2 }));
    }

    #[test]
    fn test_read_only_txn_commits_without_timestamp() {
        let store = MemStore::new();
        put(&store, b"k", b"v");
        let before = store.inner.commit_ts.load(Ordering::SeqCst);
        store
            .run_in_txn(|txn| {
                let _ = txn.get(b"k")?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.inner.commit_ts.load(Ordering::SeqCst), before);
    }
}
