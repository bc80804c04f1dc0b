//! Sorted-set data structure layered on a transactional ordered KV store.
//!
//! A sorted set maps unique byte-string members to signed 64-bit scores and
//! is queryable by rank or by score range. Each set is persisted as three
//! disjoint physical key families:
//!
//! - **meta**: set key → cardinality (absent ⇒ the set does not exist)
//! - **data**: (set key, member) → score, for existence and score lookup
//! - **score**: (set key, score, member) → sentinel, an order-preserving
//!   index enabling range scans
//!
//! Mutations run as one atomic collaborator transaction and keep the three
//! families bijective; reads take one snapshot per call.

pub mod codec;
pub mod engine;
pub mod rank;


pub use engine::{ScoredMember, ZsetEngine};
