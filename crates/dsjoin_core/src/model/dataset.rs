//! Dataset contract and read-only foreign records.
//!
//! # Responsibility
//! - Define value lookup shared by every record kind.
//! - Provide the record type returned by datasource queries.
//!
//! # Invariants
//! - Lookup of a column outside the schema fails with `ColumnNotFound`.
//! - Foreign records are immutable once built.

use crate::model::key::DatasetKey;
use crate::model::schema::Schema;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Column name -> value map.
pub type ColumnValues = BTreeMap<String, String>;

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Stable in-process identity of one local override storage record.
///
/// Keys may repeat, record ids never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) u64);

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "record#{}", self.0)
    }
}

/// Record-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// Column is not part of the enforced schema.
    ColumnNotFound(String),
    /// No record is selected because the storage is empty.
    DatasetNotFound,
    /// A record id no longer refers to a stored record.
    UnknownRecord(RecordId),
    /// Local override cannot be discarded without a backing store.
    NoBackingStore { column: String },
    /// Operation is only valid on records owned by the local storage.
    UnsupportedOperation(&'static str),
}

impl Display for DatasetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnNotFound(column) => write!(f, "column not found: `{column}`"),
            Self::DatasetNotFound => write!(f, "no dataset selected: local storage is empty"),
            Self::UnknownRecord(id) => write!(f, "record no longer exists: {id}"),
            Self::NoBackingStore { column } => write!(
                f,
                "cannot discard local override of `{column}`: record has no backing store"
            ),
            Self::UnsupportedOperation(operation) => {
                write!(f, "`{operation}` is only supported on local records")
            }
        }
    }
}

impl Error for DatasetError {}

/// Value lookup shared by every record kind.
pub trait Dataset {
    /// Returns the value of `column`, or `None` when unset.
    fn get(&self, column: &str) -> DatasetResult<Option<&str>>;

    /// Returns the recommended-unique key.
    fn key(&self) -> &DatasetKey;
}

/// Read-only record as delivered by a datasource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRecord {
    key: DatasetKey,
    values: ColumnValues,
    schema: Arc<Schema>,
}

impl ForeignRecord {
    /// Builds a record; values for columns outside `schema` are dropped.
    pub fn new(key: impl Into<String>, values: ColumnValues, schema: Arc<Schema>) -> Self {
        let values = values
            .into_iter()
            .filter(|(column, _)| schema.contains(column))
            .collect();
        Self {
            key: DatasetKey::Authoritative(key.into()),
            values,
            schema,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns every set column/value pair.
    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    /// Copies every schema column that carries a value.
    pub fn snapshot_columns(&self, schema: &Schema) -> ColumnValues {
        schema
            .iter()
            .filter_map(|column| {
                self.values
                    .get(column)
                    .map(|value| (column.clone(), value.clone()))
            })
            .collect()
    }
}

impl Dataset for ForeignRecord {
    fn get(&self, column: &str) -> DatasetResult<Option<&str>> {
        if !self.schema.contains(column) {
            return Err(DatasetError::ColumnNotFound(column.to_string()));
        }
        Ok(self.values.get(column).map(String::as_str))
    }

    fn key(&self) -> &DatasetKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnValues, Dataset, DatasetError, ForeignRecord};
    use crate::model::schema::schema_of;
    use std::sync::Arc;

    fn record() -> ForeignRecord {
        let mut values = ColumnValues::new();
        values.insert("Nachname".to_string(), "Meier".to_string());
        values.insert("Unknown".to_string(), "dropped".to_string());
        ForeignRecord::new("k1", values, Arc::new(schema_of(["Nachname", "Vorname"])))
    }

    #[test]
    fn get_resolves_set_and_unset_columns() {
        let record = record();
        assert_eq!(record.get("Nachname").unwrap(), Some("Meier"));
        assert_eq!(record.get("Vorname").unwrap(), None);
    }

    #[test]
    fn get_rejects_column_outside_schema() {
        let err = record().get("Unknown").unwrap_err();
        assert_eq!(err, DatasetError::ColumnNotFound("Unknown".to_string()));
    }
}
