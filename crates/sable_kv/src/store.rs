//! Collaborator traits for a transactional, ordered key-value store.
//!
//! The store must provide snapshot isolation and atomic commit; the
//! sorted-set core never retries or suppresses collaborator errors on its
//! own. Handles are plain associated types, so a mismatched handle is a
//! compile error rather than the runtime `BackendType` downcast failure
//! the error taxonomy still reserves for dynamic integrations.

use sable_common::SableResult;

/// Consistent point-in-time read view.
pub trait Snapshot {
    /// Point read. Absent keys are `Ok(None)`, never an error.
    fn get(&self, key: &[u8]) -> SableResult<Option<Vec<u8>>>;

    /// Ordered key scan over the half-open interval `[start, end)`.
    ///
    /// Skips the first `offset` matching keys and returns at most `limit`
    /// keys, ascending. Clamps to the available entries; an out-of-range
    /// window is an empty result, not an error.
    fn scan_keys(
        &self,
        start: &[u8],
        end: &[u8],
        offset: u64,
        limit: u64,
    ) -> SableResult<Vec<Vec<u8>>>;
}

/// Write buffer of an open transaction.
///
/// Reads observe the transaction's own buffered writes first, then fall
/// back to the start snapshot. All writes are buffered until the
/// transaction body returns and the store commits atomically.
pub trait Transaction {
    type Snapshot: Snapshot;

    /// Read-your-own-writes point read.
    fn get(&mut self, key: &[u8]) -> SableResult<Option<Vec<u8>>>;

    /// Buffer a write of `value` under `key`.
    fn set(&mut self, key: &[u8], value: &[u8]) -> SableResult<()>;

    /// Buffer a deletion of `key`.
    fn delete(&mut self, key: &[u8]) -> SableResult<()>;

    /// The transaction's start view, for reads and scans that must not see
    /// the buffered writes.
    fn snapshot(&self) -> &Self::Snapshot;
}

/// Transactional ordered KV store.
pub trait KvStore: Send + Sync {
    type Snapshot: Snapshot;
    type Txn: Transaction<Snapshot = Self::Snapshot>;

    /// Point read against the newest committed state.
    fn get(&self, key: &[u8]) -> SableResult<Option<Vec<u8>>>;

    /// Acquire a read view of the newest committed state.
    fn newest_snapshot(&self) -> SableResult<Self::Snapshot>;

    /// Run `body` as one atomic transaction.
    ///
    /// The store owns conflict detection and retry: `body` may be invoked
    /// more than once and must be idempotent over its captured state. On
    /// success every buffered write is visible atomically; on error nothing
    /// is.
    fn run_in_txn<T, F>(&self, body: F) -> SableResult<T>
    where
        F: FnMut(&mut Self::Txn) -> SableResult<T>;
}
