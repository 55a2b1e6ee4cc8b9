//! Persistence of the local override storage.
//!
//! # Responsibility
//! - Define the load/save contract for `CacheSnapshot`s.
//! - Provide SQLite and JSON file implementations.
//!
//! # Invariants
//! - `save` replaces the previous snapshot as a whole or not at all.
//! - `load` returns `Ok(None)` when nothing was ever saved.
//! - Stores never validate snapshot contents; that is the storage's job.

use crate::db::DbError;
use crate::los::CacheSnapshot;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod json_store;
pub mod sqlite_store;

pub use json_store::JsonFileCacheStore;
pub use sqlite_store::SqliteCacheStore;

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache persistence failures.
#[derive(Debug)]
pub enum CacheError {
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Persisted rows cannot be mapped back into a snapshot.
    InvalidData(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "cache file error: {err}"),
            Self::Json(err) => write!(f, "cache file is not valid: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted cache data: {message}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Load/save contract for the persisted override cache.
pub trait CacheStore {
    /// Loads the last saved snapshot, if any.
    fn load(&self) -> CacheResult<Option<CacheSnapshot>>;
    /// Replaces the persisted snapshot.
    fn save(&mut self, snapshot: &CacheSnapshot) -> CacheResult<()>;
}
