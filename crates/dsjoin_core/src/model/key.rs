//! Typed dataset keys.
//!
//! # Responsibility
//! - Distinguish keys handed out by an authoritative datasource from keys
//!   generated for purely local records.
//!
//! # Invariants
//! - A `Local` key can never equal an `Authoritative` key.
//! - Only `Authoritative` keys are ever sent to a datasource.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Recommended-unique identifier of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKey {
    /// Key reported by a background datasource.
    Authoritative(String),
    /// Key generated by the local override storage for records that only
    /// exist locally.
    Local(u64),
}

impl DatasetKey {
    pub fn authoritative(value: impl Into<String>) -> Self {
        Self::Authoritative(value.into())
    }

    /// Returns `true` for keys that no datasource has ever seen.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Returns the authoritative key text, if any.
    pub fn as_authoritative(&self) -> Option<&str> {
        match self {
            Self::Authoritative(value) => Some(value.as_str()),
            Self::Local(_) => None,
        }
    }
}

impl Display for DatasetKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authoritative(value) => write!(f, "{value}"),
            Self::Local(counter) => write!(f, "local#{counter}"),
        }
    }
}

/// Monotonic generator for `DatasetKey::Local` values.
#[derive(Debug, Clone, Default)]
pub struct LocalKeyGenerator {
    next: u64,
}

impl LocalKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh local key.
    pub fn generate(&mut self) -> DatasetKey {
        let key = DatasetKey::Local(self.next);
        self.next += 1;
        key
    }

    /// Ensures future keys are strictly greater than `key` if it is local.
    ///
    /// Used when records are restored from a persisted cache.
    pub fn retain(&mut self, key: &DatasetKey) {
        if let DatasetKey::Local(counter) = key {
            if *counter >= self.next {
                self.next = counter + 1;
            }
        }
    }
}
