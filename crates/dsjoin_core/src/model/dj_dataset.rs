//! Uniform record view over local and foreign datasets.
//!
//! # Responsibility
//! - Let callers inspect a record without knowing whether it came from the
//!   background datasource or the local override storage.
//!
//! # Invariants
//! - The variant is fixed at construction; a foreign record never becomes
//!   local, it can only be copied into the storage.
//! - `Los` values are snapshots; mutations go through the owning storage
//!   using `record_id()`.

use crate::model::dataset::{ColumnValues, Dataset, DatasetResult, ForeignRecord, RecordId};
use crate::model::key::DatasetKey;
use crate::model::record::LosRecord;

/// Record as handed out by the joiner.
#[derive(Debug, Clone)]
pub enum DjDataset {
    /// Snapshot of a record owned by the local override storage.
    Los(LosRecord),
    /// Read-only hit returned directly by a datasource query.
    Foreign(ForeignRecord),
}

impl DjDataset {
    pub fn is_from_los(&self) -> bool {
        matches!(self, Self::Los(_))
    }

    /// Storage identity for local records.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::Los(record) => Some(record.id()),
            Self::Foreign(_) => None,
        }
    }

    /// Foreign records always carry their query result as backing store.
    pub fn has_backing_store(&self) -> bool {
        match self {
            Self::Los(record) => record.has_backing_store(),
            Self::Foreign(_) => true,
        }
    }

    pub fn has_local_override(&self, column: &str) -> bool {
        match self {
            Self::Los(record) => record.has_local_override(column),
            Self::Foreign(_) => false,
        }
    }

    /// Override layer; `None` means "not from local storage".
    pub fn overrides(&self) -> Option<&ColumnValues> {
        match self {
            Self::Los(record) => Some(record.overrides()),
            Self::Foreign(_) => None,
        }
    }

    pub fn backing_store(&self) -> Option<&ColumnValues> {
        match self {
            Self::Los(record) => record.backing_store(),
            Self::Foreign(record) => Some(record.values()),
        }
    }
}

impl Dataset for DjDataset {
    fn get(&self, column: &str) -> DatasetResult<Option<&str>> {
        match self {
            Self::Los(record) => record.get(column),
            Self::Foreign(record) => record.get(column),
        }
    }

    fn key(&self) -> &DatasetKey {
        match self {
            Self::Los(record) => record.key(),
            Self::Foreign(record) => record.key(),
        }
    }
}

impl From<ForeignRecord> for DjDataset {
    fn from(value: ForeignRecord) -> Self {
        Self::Foreign(value)
    }
}

impl From<LosRecord> for DjDataset {
    fn from(value: LosRecord) -> Self {
        Self::Los(value)
    }
}
