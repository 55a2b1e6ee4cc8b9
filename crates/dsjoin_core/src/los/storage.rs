//! Local override storage and key-based reconciliation.
//!
//! # Responsibility
//! - Own the user's working set of records and the selected record.
//! - Reconcile that working set against an authoritative datasource without
//!   losing local overrides, local-only records, or the selection.
//! - Convert to and from the persisted `CacheSnapshot` shape.
//!
//! # Invariants
//! - A record is selected iff the storage is non-empty.
//! - All records share one schema slot; schema changes drop obsolete
//!   columns from every record.
//! - `columns()` lists exactly the schema columns. Surviving columns keep
//!   their position across schema changes, new ones are appended sorted.
//! - `refresh_from_database` either commits a complete new state or leaves
//!   the previous state untouched.
//! - Records not reported by the datasource are kept, stale backing store
//!   included.

use crate::datasource::{Datasource, DatasourceError};
use crate::los::snapshot::{CacheSnapshot, CachedRecord, SnapshotError};
use crate::model::dataset::{ColumnValues, Dataset, DatasetError, DatasetResult, RecordId};
use crate::model::key::{DatasetKey, LocalKeyGenerator};
use crate::model::record::LosRecord;
use crate::model::schema::{Schema, SchemaChange, SharedSchema};
use log::{info, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Outcome of one successful reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys for which the datasource delivered fresh rows, in row order.
    pub refreshed: Vec<DatasetKey>,
    /// Authoritative keys the datasource no longer reported.
    pub stale: Vec<DatasetKey>,
    /// Number of records that only exist locally.
    pub local_only: usize,
    pub schema_change: SchemaChange,
}

/// Persistent personal working set layered over a background datasource.
#[derive(Debug)]
pub struct LocalOverrideStorage {
    schema: SharedSchema,
    has_schema: bool,
    column_order: Vec<String>,
    records: Vec<LosRecord>,
    selected: Option<RecordId>,
    local_keys: LocalKeyGenerator,
    next_record_id: u64,
}

impl LocalOverrideStorage {
    /// Creates an empty storage enforcing `schema`.
    pub fn new(schema: Schema) -> Self {
        Self {
            column_order: schema.iter().cloned().collect(),
            schema: SharedSchema::new(schema),
            has_schema: true,
            records: Vec::new(),
            selected: None,
            local_keys: LocalKeyGenerator::new(),
            next_record_id: 0,
        }
    }

    /// Creates an empty storage that has never seen a schema.
    pub fn without_schema() -> Self {
        Self {
            has_schema: false,
            ..Self::new(Schema::new())
        }
    }

    /// Returns `true` once a schema was loaded or adopted from a datasource.
    pub fn has_schema(&self) -> bool {
        self.has_schema
    }

    pub fn schema(&self) -> Schema {
        self.schema.snapshot()
    }

    /// Schema columns in display order, as persisted in the cache.
    pub fn columns(&self) -> &[String] {
        &self.column_order
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in storage order.
    pub fn records(&self) -> impl Iterator<Item = &LosRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: RecordId) -> Option<&LosRecord> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut LosRecord> {
        self.records.iter_mut().find(|record| record.id() == id)
    }

    /// Like `get_mut`, but reports a stale id as an error.
    pub fn record_mut(&mut self, id: RecordId) -> DatasetResult<&mut LosRecord> {
        self.get_mut(id).ok_or(DatasetError::UnknownRecord(id))
    }

    /// Appends a purely local record whose columns show their own names.
    pub fn new_dataset(&mut self) -> RecordId {
        let overrides = self
            .schema
            .snapshot()
            .into_iter()
            .map(|column| (column.clone(), column))
            .collect();
        let key = self.local_keys.generate();
        self.push(key, None, overrides)
    }

    /// Materializes a foreign record as a new cached record.
    ///
    /// Every schema column the foreign record carries becomes part of the
    /// backing store; the override map starts empty.
    pub fn copy_non_los_dataset(&mut self, dataset: &dyn Dataset) -> RecordId {
        let backing_store = self
            .schema
            .snapshot()
            .into_iter()
            .filter_map(|column| match dataset.get(&column) {
                Ok(Some(value)) => Some((column, value.to_string())),
                _ => None,
            })
            .collect();
        self.push(dataset.key().clone(), Some(backing_store), ColumnValues::new())
    }

    /// Appends a duplicate of a stored record (same key, copied layers).
    pub fn copy_dataset(&mut self, id: RecordId) -> DatasetResult<RecordId> {
        let source = self.get(id).ok_or(DatasetError::UnknownRecord(id))?;
        let key = source.key().clone();
        let backing_store = source.backing_store().cloned();
        let overrides = source.overrides().clone();
        Ok(self.push(key, backing_store, overrides))
    }

    /// Replaces the shared schema and drops obsolete columns everywhere.
    pub fn set_schema(&mut self, schema: Schema) -> SchemaChange {
        let change = SchemaChange::between(&self.schema.snapshot(), &schema);
        for record in &mut self.records {
            record.drop_columns(&change.removed);
        }
        self.column_order = reorder_columns(&self.column_order, &schema);
        self.schema.replace(schema);
        self.has_schema = true;
        change
    }

    /// Selects the first record with `key`, else the first record.
    pub fn select_dataset(&mut self, key: Option<&DatasetKey>) {
        self.selected = pick_selection(&self.records, None, key);
    }

    pub fn select(&mut self, id: RecordId) -> DatasetResult<()> {
        if self.get(id).is_none() {
            return Err(DatasetError::UnknownRecord(id));
        }
        self.selected = Some(id);
        Ok(())
    }

    pub fn is_selected(&self, id: RecordId) -> bool {
        self.selected == Some(id)
    }

    /// # Errors
    /// - `DatasetNotFound` when the storage is empty.
    pub fn selected_dataset(&self) -> DatasetResult<&LosRecord> {
        self.selected
            .and_then(|id| self.get(id))
            .ok_or(DatasetError::DatasetNotFound)
    }

    pub fn selected_dataset_mut(&mut self) -> DatasetResult<&mut LosRecord> {
        let id = self.selected.ok_or(DatasetError::DatasetNotFound)?;
        self.get_mut(id).ok_or(DatasetError::DatasetNotFound)
    }

    /// Removes one record; removing the selected record selects the first
    /// remaining one.
    pub fn remove(&mut self, id: RecordId) -> DatasetResult<LosRecord> {
        let position = self
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or(DatasetError::UnknownRecord(id))?;
        let removed = self.records.remove(position);
        if self.selected == Some(id) {
            self.selected = self.records.first().map(LosRecord::id);
        }
        Ok(removed)
    }

    /// Reconciles all records against `source` by key.
    ///
    /// # Errors
    /// - Any datasource error, in particular `Timeout`; the storage is then
    ///   exactly as it was before the call.
    pub fn refresh_from_database(
        &mut self,
        source: &dyn Datasource,
        timeout: Duration,
    ) -> Result<ReconcileReport, DatasourceError> {
        let started_at = Instant::now();
        info!(
            "event=los_refresh module=los status=start datasource={} records={}",
            source.name(),
            self.records.len()
        );

        let mut index = self.index_by_key();
        let mut query_keys: Vec<String> = index
            .keys()
            .filter_map(DatasetKey::as_authoritative)
            .map(str::to_string)
            .collect();
        query_keys.sort();

        let fresh = match source.datasets_by_key(&query_keys, timeout) {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(
                    "event=los_refresh module=los status=error datasource={} duration_ms={} error={}",
                    source.name(),
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        let new_schema = source.schema().clone();
        let schema_change = SchemaChange::between(&self.schema.snapshot(), &new_schema);
        let mut next_record_id = self.next_record_id;
        let mut consumed = vec![false; self.records.len()];
        let mut records = Vec::with_capacity(self.records.len() + fresh.len());
        let mut refreshed = Vec::new();

        for row in fresh.iter() {
            let key = row.key().clone();
            let backing_store = row.snapshot_columns(&new_schema);
            let (id, overrides) = match index.remove(&key) {
                Some(position) => {
                    consumed[position] = true;
                    let old = &self.records[position];
                    let overrides = old
                        .overrides()
                        .iter()
                        .filter(|(column, _)| new_schema.contains(*column))
                        .map(|(column, value)| (column.clone(), value.clone()))
                        .collect();
                    (old.id(), overrides)
                }
                None => {
                    let id = RecordId(next_record_id);
                    next_record_id += 1;
                    (id, ColumnValues::new())
                }
            };
            records.push(LosRecord::new(
                id,
                key.clone(),
                Some(backing_store),
                overrides,
                self.schema.clone(),
            ));
            refreshed.push(key);
        }

        let mut stale = Vec::new();
        let mut local_only = 0;
        for (position, old) in self.records.iter().enumerate() {
            if consumed[position] {
                continue;
            }
            let mut kept = old.clone();
            kept.drop_columns(&schema_change.removed);
            if kept.key().is_local() {
                local_only += 1;
            } else {
                stale.push(kept.key().clone());
            }
            records.push(kept);
        }

        let previous_key = self.selected_dataset().ok().map(|record| record.key().clone());
        let selected = pick_selection(&records, self.selected, previous_key.as_ref());

        self.column_order = reorder_columns(&self.column_order, &new_schema);
        self.schema.replace(new_schema);
        self.has_schema = true;
        self.records = records;
        self.selected = selected;
        self.next_record_id = next_record_id;

        info!(
            "event=los_refresh module=los status=ok datasource={} duration_ms={} refreshed={} stale={} local_only={} columns_added={} columns_removed={}",
            source.name(),
            started_at.elapsed().as_millis(),
            refreshed.len(),
            stale.len(),
            local_only,
            schema_change.added.len(),
            schema_change.removed.len()
        );

        Ok(ReconcileReport {
            refreshed,
            stale,
            local_only,
            schema_change,
        })
    }

    /// Builds the persisted form of the current state.
    pub fn to_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            schema: self.column_order.clone(),
            records: self
                .records
                .iter()
                .map(|record| CachedRecord {
                    key: record.key().clone(),
                    cache: record.backing_store().cloned(),
                    overrides: record.overrides().clone(),
                })
                .collect(),
            selected: self
                .selected_dataset()
                .ok()
                .map(|record| record.key().clone()),
        }
    }

    /// Rebuilds a storage from a persisted snapshot.
    ///
    /// # Errors
    /// - Any `SnapshotError`; nothing of an invalid snapshot is kept.
    pub fn from_snapshot(snapshot: CacheSnapshot) -> Result<Self, SnapshotError> {
        snapshot.validate()?;
        let mut storage = if snapshot.schema.is_empty() {
            Self::without_schema()
        } else {
            Self {
                column_order: snapshot.schema.clone(),
                ..Self::new(snapshot.schema.iter().cloned().collect())
            }
        };

        for record in snapshot.records {
            storage.local_keys.retain(&record.key);
            storage.push(record.key, record.cache, record.overrides);
        }
        storage.select_dataset(snapshot.selected.as_ref());
        Ok(storage)
    }

    /// Rebuilds a storage, degrading to an empty schema-less one when the
    /// snapshot is missing or invalid.
    pub fn restore(snapshot: Option<CacheSnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            info!("event=los_restore module=los status=empty reason=no_cache");
            return Self::without_schema();
        };

        match Self::from_snapshot(snapshot) {
            Ok(storage) => {
                info!(
                    "event=los_restore module=los status=ok records={} columns={}",
                    storage.len(),
                    storage.schema.len()
                );
                storage
            }
            Err(err) => {
                warn!(
                    "event=los_restore module=los status=error error_code=invalid_cache error={}",
                    err
                );
                Self::without_schema()
            }
        }
    }

    fn push(
        &mut self,
        key: DatasetKey,
        backing_store: Option<ColumnValues>,
        overrides: ColumnValues,
    ) -> RecordId {
        let id = RecordId(self.next_record_id);
        self.next_record_id += 1;
        self.records.push(LosRecord::new(
            id,
            key,
            backing_store,
            overrides,
            self.schema.clone(),
        ));
        if self.selected.is_none() {
            self.selected = Some(id);
        }
        id
    }

    /// Maps each key to one record position; among duplicates the selected
    /// record wins, otherwise the first in storage order.
    fn index_by_key(&self) -> HashMap<DatasetKey, usize> {
        let mut index = HashMap::with_capacity(self.records.len());
        for (position, record) in self.records.iter().enumerate() {
            match index.entry(record.key().clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(position);
                }
                Entry::Occupied(mut entry) => {
                    if self.selected == Some(record.id()) {
                        entry.insert(position);
                    }
                }
            }
        }
        index
    }
}

/// Keeps the known columns of `order` that `schema` still has, then
/// appends the remaining `schema` columns in sorted order.
fn reorder_columns(order: &[String], schema: &Schema) -> Vec<String> {
    let mut columns: Vec<String> = order
        .iter()
        .filter(|column| schema.contains(*column))
        .cloned()
        .collect();
    for column in schema {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }
    columns
}

/// Keeps `current` if present, else the first record with `key`, else the
/// first record.
fn pick_selection(
    records: &[LosRecord],
    current: Option<RecordId>,
    key: Option<&DatasetKey>,
) -> Option<RecordId> {
    if let Some(id) = current {
        if records.iter().any(|record| record.id() == id) {
            return Some(id);
        }
    }
    key.and_then(|key| records.iter().find(|record| record.key() == key))
        .or_else(|| records.first())
        .map(LosRecord::id)
}

#[cfg(test)]
mod tests {
    use super::{reorder_columns, LocalOverrideStorage};
    use crate::model::dataset::{Dataset, DatasetError};
    use crate::model::key::DatasetKey;
    use crate::model::schema::schema_of;

    #[test]
    fn new_dataset_seeds_placeholders_and_selects_first() {
        let mut storage = LocalOverrideStorage::new(schema_of(["Name", "Email"]));
        let id = storage.new_dataset();
        let record = storage.get(id).unwrap();

        assert_eq!(record.get("Name").unwrap(), Some("Name"));
        assert_eq!(record.get("Email").unwrap(), Some("Email"));
        assert!(!record.has_backing_store());
        assert!(record.key().is_local());
        assert!(storage.is_selected(id));

        let second = storage.new_dataset();
        assert!(!storage.is_selected(second));
        assert_ne!(storage.get(second).unwrap().key(), record_key(&storage, id));
    }

    fn record_key(storage: &LocalOverrideStorage, id: crate::model::dataset::RecordId) -> &DatasetKey {
        storage.get(id).unwrap().key()
    }

    #[test]
    fn selected_dataset_on_empty_storage_fails() {
        let storage = LocalOverrideStorage::new(schema_of(["Name"]));
        assert_eq!(
            storage.selected_dataset().unwrap_err(),
            DatasetError::DatasetNotFound
        );
    }

    #[test]
    fn set_schema_drops_removed_columns_from_every_record() {
        let mut storage = LocalOverrideStorage::new(schema_of(["Name", "Email"]));
        let first = storage.new_dataset();
        let second = storage.new_dataset();

        let change = storage.set_schema(schema_of(["Name", "Phone"]));

        assert_eq!(change.removed, schema_of(["Email"]));
        assert_eq!(change.added, schema_of(["Phone"]));
        for id in [first, second] {
            let record = storage.get(id).unwrap();
            assert!(!record.overrides().contains_key("Email"));
            assert_eq!(record.get("Phone").unwrap(), None);
            assert!(matches!(
                record.get("Email"),
                Err(DatasetError::ColumnNotFound(_))
            ));
        }
    }

    #[test]
    fn remove_selected_record_selects_first_remaining() {
        let mut storage = LocalOverrideStorage::new(schema_of(["Name"]));
        let first = storage.new_dataset();
        let second = storage.new_dataset();
        let third = storage.new_dataset();
        storage.select(third).unwrap();

        storage.remove(third).unwrap();
        assert!(storage.is_selected(first));

        storage.remove(first).unwrap();
        assert!(storage.is_selected(second));

        storage.remove(second).unwrap();
        assert!(storage.selected_dataset().is_err());
        assert!(matches!(
            storage.remove(second),
            Err(DatasetError::UnknownRecord(_))
        ));
    }

    #[test]
    fn select_dataset_prefers_matching_key_then_first() {
        let mut storage = LocalOverrideStorage::new(schema_of(["Name"]));
        let first = storage.new_dataset();
        let second = storage.new_dataset();
        let second_key = storage.get(second).unwrap().key().clone();

        storage.select_dataset(Some(&second_key));
        assert!(storage.is_selected(second));

        storage.select_dataset(Some(&DatasetKey::authoritative("missing")));
        assert!(storage.is_selected(first));
    }

    #[test]
    fn copy_dataset_duplicates_layers_under_same_key() {
        let mut storage = LocalOverrideStorage::new(schema_of(["Name"]));
        let original = storage.new_dataset();
        storage.record_mut(original).unwrap().set("Name", "Meier").unwrap();

        let copy = storage.copy_dataset(original).unwrap();
        let copied = storage.get(copy).unwrap();
        assert_eq!(copied.get("Name").unwrap(), Some("Meier"));
        assert_eq!(copied.key(), storage.get(original).unwrap().key());
        assert_ne!(copy, original);
    }

    #[test]
    fn schema_change_keeps_known_column_positions() {
        let order = vec!["Vorname".to_string(), "Nachname".to_string(), "Mail".to_string()];
        let schema = schema_of(["Nachname", "Vorname", "Telefon", "Abteilung"]);
        let reordered = reorder_columns(&order, &schema);
        assert_eq!(reordered, vec!["Vorname", "Nachname", "Abteilung", "Telefon"]);
    }

    #[test]
    fn set_schema_updates_column_order() {
        let mut storage = LocalOverrideStorage::new(schema_of(["Name", "Email"]));
        assert_eq!(storage.columns(), ["Email", "Name"]);

        storage.set_schema(schema_of(["Name", "Phone"]));
        assert_eq!(storage.columns(), ["Name", "Phone"]);
        assert!(LocalOverrideStorage::without_schema().columns().is_empty());
    }
}
