//! Transactional ordered key-value boundary.
//!
//! The sorted-set core consumes this crate through the [`store::KvStore`]
//! family of traits; everything about conflict detection, commit atomicity
//! and retry lives behind them. [`mem::MemStore`] is the embedded
//! implementation used by tests and single-node deployments.

pub mod mem;
pub mod store;

pub use mem::MemStore;
pub use store::{KvStore, Snapshot, Transaction};
