//! Persisted shape of the local override storage.
//!
//! # Responsibility
//! - Define the serializable cache tree (`Schema`, `Daten`, `Ausgewaehlt`).
//! - Validate a loaded tree before any of it is trusted.
//!
//! # Invariants
//! - A column referenced by any `Cache` or `Override` map but missing from
//!   `Schema` invalidates the whole snapshot.

use crate::model::dataset::ColumnValues;
use crate::model::key::DatasetKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Whole persisted cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Ordered column names. Empty means "no schema known yet".
    #[serde(rename = "Schema", default)]
    pub schema: Vec<String>,
    /// One entry per stored record, in storage order.
    #[serde(rename = "Daten", default)]
    pub records: Vec<CachedRecord>,
    /// Key of the selected record.
    #[serde(rename = "Ausgewaehlt", default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<DatasetKey>,
}

/// Persisted form of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    #[serde(rename = "Key")]
    pub key: DatasetKey,
    /// Backing store; absent for purely local records.
    #[serde(rename = "Cache", default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<ColumnValues>,
    #[serde(rename = "Override", default)]
    pub overrides: ColumnValues,
}

/// Reasons a snapshot is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    UnknownColumn { key: DatasetKey, column: String },
    DuplicateSchemaColumn(String),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownColumn { key, column } => write!(
                f,
                "cached record `{key}` references column `{column}` outside the cached schema"
            ),
            Self::DuplicateSchemaColumn(column) => {
                write!(f, "cached schema lists column `{column}` twice")
            }
        }
    }
}

impl Error for SnapshotError {}

impl CacheSnapshot {
    /// Checks that every cached column belongs to the cached schema.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut schema = BTreeSet::new();
        for column in &self.schema {
            if !schema.insert(column.as_str()) {
                return Err(SnapshotError::DuplicateSchemaColumn(column.clone()));
            }
        }

        for record in &self.records {
            let columns = record
                .cache
                .iter()
                .flat_map(|cache| cache.keys())
                .chain(record.overrides.keys());
            for column in columns {
                if !schema.contains(column.as_str()) {
                    return Err(SnapshotError::UnknownColumn {
                        key: record.key.clone(),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
