//! Datasource combinator that lets one source mask another.
//!
//! # Responsibility
//! - Answer every query from `over` first and fill in rows from `source`
//!   whose key `over` did not report.
//! - Split one caller budget across both nested calls.
//!
//! # Invariants
//! - Both wrapped datasources have identical schemas.
//! - `source` is never queried once the budget is used up by `over`.
//! - Results are merged lazily by key value (see `QueryResults::masked`).

use crate::datasource::{Datasource, DatasourceError, DatasourceResult, QueryPart, QueryResults};
use crate::model::schema::Schema;
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct PreferDatasource {
    name: String,
    source: Arc<dyn Datasource>,
    over: Arc<dyn Datasource>,
}

impl PreferDatasource {
    /// Combines `source` with the masking datasource `over`.
    ///
    /// # Errors
    /// - `Config` when the two schemas differ.
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn Datasource>,
        over: Arc<dyn Datasource>,
    ) -> DatasourceResult<Self> {
        let name = name.into();
        if source.schema() != over.schema() {
            let only_source: Vec<_> = source.schema().difference(over.schema()).collect();
            let only_over: Vec<_> = over.schema().difference(source.schema()).collect();
            return Err(DatasourceError::config(
                &name,
                format!(
                    "schemas of `{}` and `{}` differ (only in source: {only_source:?}, only in over: {only_over:?})",
                    source.name(),
                    over.name()
                ),
            ));
        }

        Ok(Self { name, source, over })
    }

    /// Runs `query` on `over`, then on `source` with whatever budget is left.
    fn query_both<F>(&self, timeout: Duration, query: F) -> DatasourceResult<QueryResults>
    where
        F: Fn(&dyn Datasource, Duration) -> DatasourceResult<QueryResults>,
    {
        let started_at = Instant::now();
        let over = query(self.over.as_ref(), timeout)?;

        let remaining = timeout
            .checked_sub(started_at.elapsed())
            .filter(|remaining| !remaining.is_zero())
            .ok_or_else(|| DatasourceError::timeout(&self.name, timeout))?;
        debug!(
            "event=prefer_query module=datasource status=over_done datasource={} over_rows={} remaining_ms={}",
            self.name,
            over.len(),
            remaining.as_millis()
        );

        let source = query(self.source.as_ref(), remaining)?;
        Ok(QueryResults::masked(over, source))
    }
}

impl Datasource for PreferDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        self.source.schema()
    }

    fn datasets_by_key(
        &self,
        keys: &[String],
        timeout: Duration,
    ) -> DatasourceResult<QueryResults> {
        self.query_both(timeout, |datasource, budget| {
            datasource.datasets_by_key(keys, budget)
        })
    }

    fn find(&self, query: &[QueryPart], timeout: Duration) -> DatasourceResult<QueryResults> {
        self.query_both(timeout, |datasource, budget| datasource.find(query, budget))
    }

    fn contents(&self, timeout: Duration) -> DatasourceResult<QueryResults> {
        self.query_both(timeout, |datasource, budget| datasource.contents(budget))
    }
}
