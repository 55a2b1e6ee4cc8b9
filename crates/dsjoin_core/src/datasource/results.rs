//! Ordered, sized query results.
//!
//! # Responsibility
//! - Carry records returned by any query in a stable order.
//! - Represent "masked" merges lazily: rows of one result followed by the
//!   rows of another whose key was not already present.
//!
//! # Invariants
//! - Masking compares key values, never record identity.
//! - Iteration order is stable across calls.

use crate::model::dataset::{Dataset, ForeignRecord};
use crate::model::key::DatasetKey;
use std::collections::HashSet;

/// Query results, by default as returned by a datasource.
#[derive(Debug, Clone)]
pub struct QueryResults<T = ForeignRecord> {
    repr: Repr<T>,
}

#[derive(Debug, Clone)]
enum Repr<T> {
    List(Vec<T>),
    Masked {
        over: Box<QueryResults<T>>,
        source: Box<QueryResults<T>>,
        masked: HashSet<DatasetKey>,
    },
}

impl<T> QueryResults<T> {
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            repr: Repr::List(items),
        }
    }
}

impl<T: Dataset> QueryResults<T> {
    /// Streams all rows of `over`, then rows of `source` with unseen keys.
    pub fn masked(over: QueryResults<T>, source: QueryResults<T>) -> Self {
        let masked = over.iter().map(|record| record.key().clone()).collect();
        Self {
            repr: Repr::Masked {
                over: Box::new(over),
                source: Box::new(source),
                masked,
            },
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match &self.repr {
            Repr::List(items) => Box::new(items.iter()),
            Repr::Masked {
                over,
                source,
                masked,
            } => Box::new(
                over.iter().chain(
                    source
                        .iter()
                        .filter(move |record| !masked.contains(record.key())),
                ),
            ),
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::List(items) => items.len(),
            Repr::Masked {
                over,
                source,
                masked,
            } => {
                over.len()
                    + source
                        .iter()
                        .filter(|record| !masked.contains(record.key()))
                        .count()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the results in iteration order.
    pub fn into_vec(self) -> Vec<T> {
        match self.repr {
            Repr::List(items) => items,
            Repr::Masked {
                over,
                source,
                masked,
            } => {
                let mut items = over.into_vec();
                items.extend(
                    source
                        .into_vec()
                        .into_iter()
                        .filter(|record| !masked.contains(record.key())),
                );
                items
            }
        }
    }
}

impl<T> Default for QueryResults<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> FromIterator<T> for QueryResults<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Dataset> IntoIterator for QueryResults<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::QueryResults;
    use crate::model::dataset::{ColumnValues, Dataset, ForeignRecord};
    use crate::model::schema::schema_of;
    use std::sync::Arc;

    fn row(key: &str, name: &str) -> ForeignRecord {
        let mut values = ColumnValues::new();
        values.insert("Name".to_string(), name.to_string());
        ForeignRecord::new(key, values, Arc::new(schema_of(["Name"])))
    }

    #[test]
    fn masked_results_skip_every_source_row_with_a_seen_key() {
        let over = QueryResults::from_vec(vec![row("k1", "over")]);
        let source = QueryResults::from_vec(vec![
            row("k1", "source-a"),
            row("k2", "source"),
            row("k1", "source-b"),
        ]);

        let merged = QueryResults::masked(over, source);
        assert_eq!(merged.len(), 2);
        let names: Vec<_> = merged
            .iter()
            .map(|record| record.get("Name").unwrap().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["over", "source"]);
        assert_eq!(merged.into_vec().len(), 2);
    }

    #[test]
    fn empty_results_have_no_rows() {
        let results: QueryResults = QueryResults::empty();
        assert!(results.is_empty());
        assert_eq!(results.iter().count(), 0);
    }
}
