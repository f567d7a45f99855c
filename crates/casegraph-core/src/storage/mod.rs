//! # Persistent Storage
//!
//! Disk-backed implementations of [`DocumentStore`](crate::store::DocumentStore).

mod redb_store;

pub use redb_store::RedbStore;
