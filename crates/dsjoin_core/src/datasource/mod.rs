//! Datasource query contract and built-in datasources.
//!
//! # Responsibility
//! - Define the blocking, timeout-bounded query contract every background
//!   datasource implements.
//! - Provide in-process datasources and the `PreferDatasource` combinator.
//!
//! # Invariants
//! - `Timeout` is the only signal for a blocked backend; implementations
//!   never retry internally.
//! - An empty query yields empty results, never "everything".
//! - A query on a column outside the schema yields empty results.
//! - Constructors never perform I/O and only fail on configuration errors.

use crate::model::schema::Schema;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod empty;
pub mod memory;
pub mod pattern;
pub mod prefer;
pub mod registry;
pub mod results;

pub use results::QueryResults;

pub type DatasourceResult<T> = Result<T, DatasourceError>;

/// Datasource failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceError {
    /// The call did not complete within its budget.
    Timeout { datasource: String, budget: Duration },
    /// Unrecoverable configuration problem detected at construction.
    Config { datasource: String, message: String },
    /// Backend failure other than a timeout.
    Backend { datasource: String, message: String },
}

impl DatasourceError {
    pub fn timeout(datasource: &str, budget: Duration) -> Self {
        Self::Timeout {
            datasource: datasource.to_string(),
            budget,
        }
    }

    pub fn config(datasource: &str, message: impl Into<String>) -> Self {
        Self::Config {
            datasource: datasource.to_string(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl Display for DatasourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { datasource, budget } => write!(
                f,
                "datasource `{datasource}` timed out after {} ms",
                budget.as_millis()
            ),
            Self::Config {
                datasource,
                message,
            } => write!(f, "invalid datasource `{datasource}`: {message}"),
            Self::Backend {
                datasource,
                message,
            } => write!(f, "datasource `{datasource}` failed: {message}"),
        }
    }
}

impl Error for DatasourceError {}

/// One search predicate: `column` must match `pattern`.
///
/// `pattern` may carry one leading and/or one trailing `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPart {
    pub column: String,
    pub pattern: String,
}

impl QueryPart {
    pub fn new(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            pattern: pattern.into(),
        }
    }
}

/// Background source of records.
pub trait Datasource: Send + Sync {
    /// Stable datasource name.
    fn name(&self) -> &str;

    /// Columns every returned record conforms to.
    fn schema(&self) -> &Schema;

    /// Returns all records whose key is in `keys`.
    ///
    /// Keys are only advisory-unique, so more rows than keys may come back.
    fn datasets_by_key(&self, keys: &[String], timeout: Duration)
        -> DatasourceResult<QueryResults>;

    /// Returns all records matching every part of `query`.
    fn find(&self, query: &[QueryPart], timeout: Duration) -> DatasourceResult<QueryResults>;

    /// Returns everything the datasource is willing to list (may be empty).
    fn contents(&self, timeout: Duration) -> DatasourceResult<QueryResults>;
}
