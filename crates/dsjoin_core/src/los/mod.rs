//! Local override storage.
//!
//! # Responsibility
//! - Keep the user's personal records usable while the background
//!   datasource is unreachable.
//! - Reconcile those records with fresh authoritative data by key.
//!
//! # Invariants
//! - Reconciliation is atomic: commit everything or change nothing.
//! - Local edits and local-only records survive every reconciliation.

pub mod snapshot;
pub mod storage;

pub use snapshot::{CacheSnapshot, CachedRecord, SnapshotError};
pub use storage::{LocalOverrideStorage, ReconcileReport};
