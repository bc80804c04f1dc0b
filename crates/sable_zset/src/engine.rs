//! Sorted-set mutation and query engines.
//!
//! [`ZsetEngine`] is the sole writer of a set's meta/data/score record
//! triple and always updates all three inside one collaborator transaction,
//! so the bijection between data and score records and the persisted
//! cardinality hold at every commit point. Queries never write; each query
//! takes one snapshot for the whole call.

use tracing::{debug, warn};

use sable_common::config::{SCORE_MAX, SCORE_MIN};
use sable_common::{SableError, SableResult};
use sable_kv::{KvStore, Snapshot, Transaction};

use crate::codec;
use crate::rank;

/// A `(score, member)` input pair for [`ZsetEngine::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub score: i64,
    pub member: Vec<u8>,
}

impl ScoredMember {
    pub fn new(score: i64, member: impl Into<Vec<u8>>) -> Self {
        Self {
            score,
            member: member.into(),
        }
    }
}

/// Sorted-set operations over a transactional ordered KV store.
#[derive(Debug, Clone)]
pub struct ZsetEngine<S: KvStore> {
    store: S,
}

impl<S: KvStore> ZsetEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Add members with scores; update the score of members that already
    /// exist. Returns the number of genuinely new members.
    ///
    /// A batch may repeat a member: entries are applied in caller order and
    /// later entries observe earlier buffered writes, so the last write in
    /// the batch wins.
    pub fn add(&self, key: &[u8], pairs: &[ScoredMember]) -> SableResult<i32> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        if pairs.is_empty() {
            return Ok(0);
        }
        let meta_key = codec::meta_key(key);

        let added = self.store.run_in_txn(|txn| {
            let mut size = match txn.get(&meta_key)? {
                Some(raw) => codec::decode_u64(&raw)?,
                None => 0,
            };
            let mut added: i32 = 0;

            for pair in pairs {
                let data_key = codec::data_key(key, &pair.member);
                match txn.get(&data_key)? {
                    None => {
                        size += 1;
                        added += 1;
                    }
                    Some(raw) => {
                        // Drop the score record indexed under the member's
                        // previous score before writing the new one.
                        let prev_score = codec::decode_i64(&raw)?;
                        txn.delete(&codec::score_key(key, &pair.member, prev_score))?;
                    }
                }
                txn.set(&data_key, &codec::encode_i64(pair.score))?;
                txn.set(
                    &codec::score_key(key, &pair.member, pair.score),
                    &codec::SCORE_SENTINEL,
                )?;
            }

            txn.set(&meta_key, &codec::encode_u64(size))?;
            Ok(added)
        })?;

        debug!(pairs = pairs.len(), added, "zset add");
        Ok(added)
    }

    /// Number of members in the set; 0 if the set does not exist.
    pub fn cardinality(&self, key: &[u8]) -> SableResult<u64> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        match self.store.get(&codec::meta_key(key))? {
            Some(raw) => codec::decode_u64(&raw),
            None => Ok(0),
        }
    }

    /// Current score of `member`, or `None` if the member is absent.
    pub fn score(&self, key: &[u8], member: &[u8]) -> SableResult<Option<i64>> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        match self.store.get(&codec::data_key(key, member))? {
            Some(raw) => Ok(Some(codec::decode_i64(&raw)?)),
            None => Ok(None),
        }
    }

    /// Number of members with scores in the inclusive interval
    /// `[min, max]`, under one snapshot.
    pub fn count(&self, key: &[u8], min: i64, max: i64) -> SableResult<u64> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        if min > max {
            return Ok(0);
        }
        let snapshot = self.store.newest_snapshot()?;
        let cardinality = match snapshot.get(&codec::meta_key(key))? {
            Some(raw) => codec::decode_u64(&raw)?,
            None => return Ok(0),
        };
        let (start, end) = codec::score_scan_bounds(key, min, max);
        let matches = snapshot.scan_keys(&start, &end, 0, cardinality)?;
        Ok(matches.len() as u64)
    }

    /// Members (optionally with scores) between `start` and `stop` ranks,
    /// negative ranks counting from the end. `reverse` presents the window
    /// of the descending view; the physical scan is always ascending.
    pub fn range_by_rank(
        &self,
        key: &[u8],
        start: i64,
        stop: i64,
        withscores: bool,
        reverse: bool,
    ) -> SableResult<Vec<Vec<u8>>> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        // Degenerate window that no negative-index wraparound can rescue.
        if start > stop && (stop > 0 || start < 0) {
            return Ok(Vec::new());
        }

        let snapshot = self.store.newest_snapshot()?;
        let Some((offset, count)) = rank::resolve(&snapshot, key, start, stop, reverse)? else {
            return Ok(Vec::new());
        };

        let (scan_start, scan_end) = codec::score_scan_bounds(key, SCORE_MIN, SCORE_MAX);
        let keys = snapshot.scan_keys(&scan_start, &scan_end, offset, count)?;
        present(keys, withscores, reverse)
    }

    /// Members (optionally with scores) with scores in the given interval,
    /// with LIMIT-style pagination.
    ///
    /// Ascending calls pass `min <= max`; reverse calls pass the bounds in
    /// descending argument order (`min >= max`). A negative `offset`
    /// disables pagination; a negative `count` means "to the end".
    pub fn range_by_score(
        &self,
        key: &[u8],
        min: i64,
        max: i64,
        withscores: bool,
        offset: i64,
        count: i64,
        reverse: bool,
    ) -> SableResult<Vec<Vec<u8>>> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        if (!reverse && min > max) || (reverse && min < max) {
            return Ok(Vec::new());
        }

        let snapshot = self.store.newest_snapshot()?;
        let cardinality = match snapshot.get(&codec::meta_key(key))? {
            Some(raw) => codec::decode_u64(&raw)?,
            None => return Ok(Vec::new()),
        };

        // One ascending physical scan serves both directions.
        let (lo, hi) = if reverse { (max, min) } else { (min, max) };
        let (scan_start, scan_end) = codec::score_scan_bounds(key, lo, hi);
        let mut matches = snapshot.scan_keys(&scan_start, &scan_end, 0, cardinality)?;

        if offset >= 0 {
            let off = offset as usize;
            if off >= matches.len() {
                return Ok(Vec::new());
            }
            let len = matches.len();
            let take = if count < 0 {
                len - off
            } else {
                (count as usize).min(len - off)
            };
            matches = if reverse {
                // Mirrored window from the tail of the ascending scan.
                let end = len - off;
                matches[end - take..end].to_vec()
            } else {
                matches[off..off + take].to_vec()
            };
        }

        present(matches, withscores, reverse)
    }

    /// Remove the given members. Returns how many were present.
    pub fn remove(&self, key: &[u8], members: &[Vec<u8>]) -> SableResult<u64> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        if members.is_empty() {
            return Ok(0);
        }
        let meta_key = codec::meta_key(key);

        let removed = self.store.run_in_txn(|txn| {
            let size = match txn.get(&meta_key)? {
                Some(raw) => codec::decode_u64(&raw)?,
                None => 0,
            };
            let mut removed: u64 = 0;

            for member in members {
                let data_key = codec::data_key(key, member);
                let Some(raw) = txn.get(&data_key)? else {
                    continue;
                };
                let score = codec::decode_i64(&raw)?;
                txn.delete(&data_key)?;
                txn.delete(&codec::score_key(key, member, score))?;
                removed += 1;
            }

            if removed == 0 {
                return Ok(0);
            }
            update_meta(txn, &meta_key, size, removed)?;
            Ok(removed)
        })?;

        debug!(members = members.len(), removed, "zset remove");
        Ok(removed)
    }

    /// Remove every member with a score in the inclusive interval
    /// `[min, max]`. Returns the number of members removed.
    pub fn remove_by_score_range(&self, key: &[u8], min: i64, max: i64) -> SableResult<u64> {
        if key.is_empty() {
            return Err(SableError::KeyEmpty);
        }
        let meta_key = codec::meta_key(key);

        let deleted = self.store.run_in_txn(|txn| {
            let size = match txn.get(&meta_key)? {
                Some(raw) => codec::decode_u64(&raw)?,
                None => 0,
            };

            // The scan is bounded by the recorded cardinality; that is a
            // defensive cap, not a correctness requirement.
            let (scan_start, scan_end) = codec::score_scan_bounds(key, min, max);
            let matches = txn.snapshot().scan_keys(&scan_start, &scan_end, 0, size)?;
            let deleted = matches.len() as u64;

            for score_key in &matches {
                let (_, member, _) = codec::decode_score_key(score_key)?;
                txn.delete(score_key)?;
                txn.delete(&codec::data_key(key, &member))?;
            }

            if deleted == 0 {
                return Ok(0);
            }
            update_meta(txn, &meta_key, size, deleted)?;
            Ok(deleted)
        })?;

        debug!(min, max, deleted, "zset remove by score range");
        Ok(deleted)
    }
}

/// Persist the post-deletion cardinality: keep the meta record while the
/// set is nonempty, delete it once the last member is gone so the set
/// ceases to exist.
fn update_meta<T: Transaction>(
    txn: &mut T,
    meta_key: &[u8],
    size: u64,
    removing: u64,
) -> SableResult<()> {
    if removing > size {
        warn!(removing, cardinality = size, "cardinality undercounts live records");
        return Err(SableError::InvalidMeta {
            deleting: removing,
            cardinality: size,
        });
    }
    let remaining = size - removing;
    if remaining == 0 {
        txn.delete(meta_key)
    } else {
        txn.set(meta_key, &codec::encode_u64(remaining))
    }
}

/// Decode scanned score keys into the flat response sequence: alternating
/// `member, score` (score as decimal ASCII) with scores, members only
/// without. `reverse` flips presentation order; the input is always the
/// ascending scan result.
fn present(keys: Vec<Vec<u8>>, withscores: bool, reverse: bool) -> SableResult<Vec<Vec<u8>>> {
    let mut decoded = Vec::with_capacity(keys.len());
    for raw in &keys {
        let (_, member, score) = codec::decode_score_key(raw)?;
        decoded.push((member, score));
    }
    if reverse {
        decoded.reverse();
    }

    let mut out = Vec::with_capacity(decoded.len() * if withscores { 2 } else { 1 });
    for (member, score) in decoded {
        out.push(member);
        if withscores {
            out.push(score.to_string().into_bytes());
        }
    }
    Ok(out)
}
