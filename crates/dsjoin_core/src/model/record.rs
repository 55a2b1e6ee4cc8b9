//! Local override storage record.
//!
//! # Responsibility
//! - Resolve values as override first, then backing store.
//! - Own the override map of one locally stored record.
//!
//! # Invariants
//! - The override map always exists (it may be empty).
//! - A record without backing store reports every column as overridden.
//! - Columns written through `set` must belong to the shared schema.

use crate::model::dataset::{ColumnValues, Dataset, DatasetError, DatasetResult, RecordId};
use crate::model::key::DatasetKey;
use crate::model::schema::{Schema, SharedSchema};

/// One record owned by a `LocalOverrideStorage`.
#[derive(Debug, Clone)]
pub struct LosRecord {
    id: RecordId,
    key: DatasetKey,
    backing_store: Option<ColumnValues>,
    overrides: ColumnValues,
    schema: SharedSchema,
}

impl LosRecord {
    pub(crate) fn new(
        id: RecordId,
        key: DatasetKey,
        backing_store: Option<ColumnValues>,
        overrides: ColumnValues,
        schema: SharedSchema,
    ) -> Self {
        Self {
            id,
            key,
            backing_store,
            overrides,
            schema,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn has_backing_store(&self) -> bool {
        self.backing_store.is_some()
    }

    /// Last known authoritative snapshot, if any.
    pub fn backing_store(&self) -> Option<&ColumnValues> {
        self.backing_store.as_ref()
    }

    pub fn overrides(&self) -> &ColumnValues {
        &self.overrides
    }

    /// Returns `true` when `column` resolves from the override layer.
    pub fn has_local_override(&self, column: &str) -> bool {
        self.backing_store.is_none() || self.overrides.contains_key(column)
    }

    /// Writes a local override for `column`.
    pub fn set(&mut self, column: &str, value: impl Into<String>) -> DatasetResult<()> {
        if !self.schema.contains(column) {
            return Err(DatasetError::ColumnNotFound(column.to_string()));
        }
        self.overrides.insert(column.to_string(), value.into());
        Ok(())
    }

    /// Drops the local override of `column` so the backing store shows through.
    ///
    /// # Errors
    /// - `NoBackingStore` when the record only exists locally.
    pub fn discard_local_override(&mut self, column: &str) -> DatasetResult<()> {
        if self.backing_store.is_none() {
            return Err(DatasetError::NoBackingStore {
                column: column.to_string(),
            });
        }
        self.overrides.remove(column);
        Ok(())
    }

    /// Removes `columns` from both layers.
    pub(crate) fn drop_columns(&mut self, columns: &Schema) {
        if columns.is_empty() {
            return;
        }
        self.overrides.retain(|column, _| !columns.contains(column));
        if let Some(store) = self.backing_store.as_mut() {
            store.retain(|column, _| !columns.contains(column));
        }
    }
}

impl Dataset for LosRecord {
    fn get(&self, column: &str) -> DatasetResult<Option<&str>> {
        if !self.schema.contains(column) {
            return Err(DatasetError::ColumnNotFound(column.to_string()));
        }
        if let Some(value) = self.overrides.get(column) {
            return Ok(Some(value.as_str()));
        }
        Ok(self
            .backing_store
            .as_ref()
            .and_then(|store| store.get(column))
            .map(String::as_str))
    }

    fn key(&self) -> &DatasetKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::LosRecord;
    use crate::model::dataset::{ColumnValues, Dataset, DatasetError, RecordId};
    use crate::model::key::DatasetKey;
    use crate::model::schema::{schema_of, SharedSchema};

    fn values(pairs: &[(&str, &str)]) -> ColumnValues {
        pairs
            .iter()
            .map(|(column, value)| (column.to_string(), value.to_string()))
            .collect()
    }

    fn cached_record() -> LosRecord {
        LosRecord::new(
            RecordId(1),
            DatasetKey::authoritative("k1"),
            Some(values(&[("Name", "Meier"), ("Email", "meier@example.org")])),
            ColumnValues::new(),
            SharedSchema::new(schema_of(["Name", "Email", "Phone"])),
        )
    }

    #[test]
    fn override_takes_precedence_over_backing_store() {
        let mut record = cached_record();
        record.set("Name", "Maier").unwrap();
        assert_eq!(record.get("Name").unwrap(), Some("Maier"));
        assert_eq!(record.get("Email").unwrap(), Some("meier@example.org"));
        assert_eq!(record.get("Phone").unwrap(), None);
        assert!(record.has_local_override("Name"));
        assert!(!record.has_local_override("Email"));
    }

    #[test]
    fn discard_local_override_is_idempotent() {
        let mut record = cached_record();
        record.set("Name", "Maier").unwrap();
        record.discard_local_override("Name").unwrap();
        record.discard_local_override("Name").unwrap();
        assert_eq!(record.get("Name").unwrap(), Some("Meier"));
    }

    #[test]
    fn discard_without_backing_store_fails() {
        let mut record = LosRecord::new(
            RecordId(2),
            DatasetKey::Local(0),
            None,
            values(&[("Name", "Name")]),
            SharedSchema::new(schema_of(["Name"])),
        );
        assert!(record.has_local_override("Name"));
        let err = record.discard_local_override("Name").unwrap_err();
        assert!(matches!(err, DatasetError::NoBackingStore { .. }));
    }

    #[test]
    fn set_rejects_column_outside_schema() {
        let mut record = cached_record();
        let err = record.set("Fax", "123").unwrap_err();
        assert_eq!(err, DatasetError::ColumnNotFound("Fax".to_string()));
    }

    #[test]
    fn schema_replacement_hides_dropped_columns() {
        let record = cached_record();
        record.schema.replace(schema_of(["Name", "Phone"]));
        assert!(matches!(
            record.get("Email"),
            Err(DatasetError::ColumnNotFound(_))
        ));
    }
}
