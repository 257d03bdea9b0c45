//! # Persistent Storage
//!
//! Disk-backed store implementations.

mod redb_store;

pub use redb_store::RedbStore;
