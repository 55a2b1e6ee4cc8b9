//! SQLite home of the persisted override cache.
//!
//! The `los_*` tables hold one `CacheSnapshot`; `PRAGMA user_version` holds
//! the cache format that wrote them. A connection handed out by `open_db`
//! is always at `migrations::CACHE_FORMAT_VERSION`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The cache was written by a newer build; its tables are left alone.
    NewerCacheFormat { found: u32, supported: u32 },
    /// One upgrade step failed; the whole upgrade was rolled back.
    Migration { version: u32, source: rusqlite::Error },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::NewerCacheFormat { found, supported } => write!(
                f,
                "cache format {found} is newer than the supported format {supported}"
            ),
            Self::Migration { version, source } => {
                write!(f, "cache format upgrade to {version} failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::NewerCacheFormat { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
