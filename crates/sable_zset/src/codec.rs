//! Physical key codec for the three sorted-set record families.
//!
//! Layouts (all integers big-endian):
//!
//! ```text
//! meta  = [NS_META]  set
//! data  = [NS_DATA]  len(set):u32  set  member
//! score = [NS_SCORE] len(set):u32  set  xscore:8  member
//! ```
//!
//! The namespace byte keeps the families disjoint; the set-key length
//! prefix keeps different sets collision-free even when one set key is a
//! prefix of another. `xscore` is the score with its sign bit flipped, so
//! lexicographic key order equals `(score, member)` order across the whole
//! signed range.

use sable_common::config::{SCORE_MAX, SCORE_MIN};
use sable_common::{SableError, SableResult};

pub const NS_META: u8 = 0x01;
pub const NS_DATA: u8 = 0x02;
pub const NS_SCORE: u8 = 0x03;

/// Value stored under every score key; the key itself carries the payload.
pub const SCORE_SENTINEL: [u8; 1] = [0];

const SET_LEN_BYTES: usize = 4;
const SCORE_BYTES: usize = 8;

/// Order-preserving encoding of a signed score: flip the sign bit, emit
/// big-endian. Must agree exactly with [`decode_score`].
pub fn encode_score(score: i64) -> [u8; SCORE_BYTES] {
    ((score as u64) ^ (1 << 63)).to_be_bytes()
}

pub fn decode_score(raw: &[u8]) -> SableResult<i64> {
    let bytes: [u8; SCORE_BYTES] = raw
        .try_into()
        .map_err(|_| SableError::decode(format!("score must be 8 bytes, got {}", raw.len())))?;
    Ok((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64)
}

/// Fixed-width encoding for data-record values (plain score, no bit flip).
pub fn encode_i64(v: i64) -> [u8; 8] {
    v.to_be_bytes()
}

pub fn decode_i64(raw: &[u8]) -> SableResult<i64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| SableError::decode(format!("i64 must be 8 bytes, got {}", raw.len())))?;
    Ok(i64::from_be_bytes(bytes))
}

/// Fixed-width encoding for the meta-record cardinality.
pub fn encode_u64(v: u64) -> [u8; 8] {
    v.to_be_bytes()
}

pub fn decode_u64(raw: &[u8]) -> SableResult<u64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| SableError::decode(format!("u64 must be 8 bytes, got {}", raw.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

pub fn meta_key(set: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + set.len());
    key.push(NS_META);
    key.extend_from_slice(set);
    key
}

pub fn data_key(set: &[u8], member: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + SET_LEN_BYTES + set.len() + member.len());
    key.push(NS_DATA);
    key.extend_from_slice(&(set.len() as u32).to_be_bytes());
    key.extend_from_slice(set);
    key.extend_from_slice(member);
    key
}

pub fn score_key(set: &[u8], member: &[u8], score: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + SET_LEN_BYTES + set.len() + SCORE_BYTES + member.len());
    key.push(NS_SCORE);
    key.extend_from_slice(&(set.len() as u32).to_be_bytes());
    key.extend_from_slice(set);
    key.extend_from_slice(&encode_score(score));
    key.extend_from_slice(member);
    key
}

/// Inverse of [`score_key`].
pub fn decode_score_key(raw: &[u8]) -> SableResult<(Vec<u8>, Vec<u8>, i64)> {
    let header = 1 + SET_LEN_BYTES;
    if raw.len() < header + SCORE_BYTES {
        return Err(SableError::decode(format!(
            "score key too short: {} bytes",
            raw.len()
        )));
    }
    if raw[0] != NS_SCORE {
        return Err(SableError::decode(format!(
            "bad score-key namespace byte 0x{:02x}",
            raw[0]
        )));
    }
    let set_len = u32::from_be_bytes(raw[1..header].try_into().unwrap()) as usize;
    let score_end = header + set_len + SCORE_BYTES;
    if raw.len() < score_end {
        return Err(SableError::decode(format!(
            "score key truncated: set length {} exceeds key of {} bytes",
            set_len,
            raw.len()
        )));
    }
    let set = raw[header..header + set_len].to_vec();
    let score = decode_score(&raw[header + set_len..score_end])?;
    let member = raw[score_end..].to_vec();
    Ok((set, member, score))
}

/// Half-open scan interval covering scores `lo..=hi` of one set:
/// `[score_key(set, "", lo), score_key(set, "", hi + 1))`.
///
/// Bounds are clamped to the sentinel domain first, which is what makes the
/// `hi + 1` exclusive-bound arithmetic safe at the extremes.
pub fn score_scan_bounds(set: &[u8], lo: i64, hi: i64) -> (Vec<u8>, Vec<u8>) {
    let lo = lo.max(SCORE_MIN);
    let hi = hi.min(SCORE_MAX);
    (score_key(set, b"", lo), score_key(set, b"", hi + 1))
}
