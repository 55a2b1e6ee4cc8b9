//! Column schema and the shared schema handle.
//!
//! # Responsibility
//! - Represent the set of recognized column names.
//! - Let every record of one storage observe schema replacement at once.
//!
//! # Invariants
//! - `SharedSchema::replace` is the only way to change a shared schema, and
//!   every clone of the handle sees the new value immediately.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Set of column names, iterated in sorted order.
pub type Schema = BTreeSet<String>;

/// Builds a schema from column names.
pub fn schema_of<I, S>(columns: I) -> Schema
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into).collect()
}

/// Column delta produced by replacing one schema with another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChange {
    pub added: Schema,
    pub removed: Schema,
}

impl SchemaChange {
    pub fn between(old: &Schema, new: &Schema) -> Self {
        Self {
            added: new.difference(old).cloned().collect(),
            removed: old.difference(new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Owner-held schema slot referenced by every record of one storage.
#[derive(Debug, Clone, Default)]
pub struct SharedSchema {
    inner: Arc<RwLock<Schema>>,
}

impl SharedSchema {
    pub fn new(schema: Schema) -> Self {
        Self {
            inner: Arc::new(RwLock::new(schema)),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.read().contains(column)
    }

    /// Returns a copy of the current schema.
    pub fn snapshot(&self) -> Schema {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Swaps the schema in place for every holder of this handle.
    pub fn replace(&self, schema: Schema) -> SchemaChange {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let change = SchemaChange::between(&guard, &schema);
        *guard = schema;
        change
    }

    /// Returns `true` when both handles point at the same slot.
    pub fn same_slot(&self, other: &SharedSchema) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, Schema> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
