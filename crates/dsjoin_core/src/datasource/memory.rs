//! In-memory datasource.
//!
//! # Responsibility
//! - Serve a fixed set of rows through the `Datasource` contract.
//! - Optionally simulate backend latency against the caller's budget.
//!
//! # Invariants
//! - Rows only carry schema columns; construction rejects anything else.
//! - A simulated latency larger than the budget fails with `Timeout`
//!   without blocking.

use crate::datasource::pattern::PatternMatcher;
use crate::datasource::{Datasource, DatasourceError, DatasourceResult, QueryPart, QueryResults};
use crate::model::dataset::{ColumnValues, Dataset, ForeignRecord};
use crate::model::schema::Schema;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Datasource backed by rows held in memory.
#[derive(Debug, Clone)]
pub struct MemoryDatasource {
    name: String,
    schema: Arc<Schema>,
    rows: Vec<ForeignRecord>,
    latency: Duration,
}

impl MemoryDatasource {
    /// Builds a datasource from `(key, values)` rows.
    ///
    /// # Errors
    /// - `Config` when a row references a column outside `schema`.
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        rows: Vec<(String, ColumnValues)>,
    ) -> DatasourceResult<Self> {
        let name = name.into();
        let schema = Arc::new(schema);
        let mut records = Vec::with_capacity(rows.len());
        for (key, values) in rows {
            if let Some(column) = values.keys().find(|column| !schema.contains(*column)) {
                return Err(DatasourceError::config(
                    &name,
                    format!("row `{key}` references unknown column `{column}`"),
                ));
            }
            records.push(ForeignRecord::new(key, values, Arc::clone(&schema)));
        }

        Ok(Self {
            name,
            schema,
            rows: records,
            latency: Duration::ZERO,
        })
    }

    /// Simulates a backend that needs `latency` per call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn wait(&self, timeout: Duration) -> DatasourceResult<()> {
        if self.latency > timeout {
            return Err(DatasourceError::timeout(&self.name, timeout));
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        Ok(())
    }
}

impl Datasource for MemoryDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn datasets_by_key(
        &self,
        keys: &[String],
        timeout: Duration,
    ) -> DatasourceResult<QueryResults> {
        self.wait(timeout)?;
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                row.key()
                    .as_authoritative()
                    .is_some_and(|key| wanted.contains(key))
            })
            .cloned()
            .collect())
    }

    fn find(&self, query: &[QueryPart], timeout: Duration) -> DatasourceResult<QueryResults> {
        self.wait(timeout)?;
        if query.is_empty() || query.iter().any(|part| !self.schema.contains(&part.column)) {
            return Ok(QueryResults::empty());
        }

        let matchers = query
            .iter()
            .map(PatternMatcher::compile)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DatasourceError::Backend {
                datasource: self.name.clone(),
                message: err.to_string(),
            })?;

        Ok(self
            .rows
            .iter()
            .filter(|row| {
                matchers.iter().all(|matcher| {
                    matches!(row.get(matcher.column()), Ok(Some(value)) if matcher.is_match(value))
                })
            })
            .cloned()
            .collect())
    }

    fn contents(&self, timeout: Duration) -> DatasourceResult<QueryResults> {
        self.wait(timeout)?;
        Ok(self.rows.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryDatasource;
    use crate::datasource::{Datasource, DatasourceError, QueryPart};
    use crate::model::dataset::{ColumnValues, Dataset};
    use crate::model::schema::schema_of;
    use std::time::Duration;

    const BUDGET: Duration = Duration::from_millis(500);

    fn row(key: &str, nachname: &str) -> (String, ColumnValues) {
        let mut values = ColumnValues::new();
        values.insert("Nachname".to_string(), nachname.to_string());
        (key.to_string(), values)
    }

    fn source() -> MemoryDatasource {
        MemoryDatasource::new(
            "personal",
            schema_of(["Nachname", "Vorname"]),
            vec![row("k1", "Meier"), row("k2", "Schmidt"), row("k1", "Meyer")],
        )
        .unwrap()
    }

    #[test]
    fn find_with_empty_query_or_unknown_column_is_empty() {
        let source = source();
        assert!(source.find(&[], BUDGET).unwrap().is_empty());
        assert!(source
            .find(&[QueryPart::new("Fax", "*1*")], BUDGET)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn find_requires_every_part_to_match() {
        let source = source();
        let hits = source
            .find(&[QueryPart::new("Nachname", "Mei*")], BUDGET)
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = source
            .find(
                &[
                    QueryPart::new("Nachname", "Mei*"),
                    QueryPart::new("Vorname", "*"),
                ],
                BUDGET,
            )
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn datasets_by_key_returns_every_row_with_a_requested_key() {
        let hits = source()
            .datasets_by_key(&["k1".to_string()], BUDGET)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|row| row.key().as_authoritative() == Some("k1")));
    }

    #[test]
    fn latency_above_budget_times_out() {
        let slow = source().with_latency(Duration::from_secs(10));
        let err = slow.contents(BUDGET).unwrap_err();
        assert!(matches!(err, DatasourceError::Timeout { .. }));
    }

    #[test]
    fn rows_with_unknown_columns_are_rejected() {
        let mut values = ColumnValues::new();
        values.insert("Fax".to_string(), "1".to_string());
        let err = MemoryDatasource::new("broken", schema_of(["Nachname"]), vec![("k".to_string(), values)])
            .unwrap_err();
        assert!(matches!(err, DatasourceError::Config { .. }));
    }
}
