//! Stand-in datasource that never returns records.
//!
//! Used when the main datasource is unavailable but a cached schema lets the
//! joiner keep working on local records only.

use crate::datasource::{Datasource, DatasourceResult, QueryPart, QueryResults};
use crate::model::schema::Schema;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EmptyDatasource {
    name: String,
    schema: Schema,
}

impl EmptyDatasource {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

impl Datasource for EmptyDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn datasets_by_key(
        &self,
        _keys: &[String],
        _timeout: Duration,
    ) -> DatasourceResult<QueryResults> {
        Ok(QueryResults::empty())
    }

    fn find(&self, _query: &[QueryPart], _timeout: Duration) -> DatasourceResult<QueryResults> {
        Ok(QueryResults::empty())
    }

    fn contents(&self, _timeout: Duration) -> DatasourceResult<QueryResults> {
        Ok(QueryResults::empty())
    }
}
