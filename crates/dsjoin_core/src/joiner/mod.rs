//! Datasource joiner facade.
//!
//! # Responsibility
//! - Combine the named datasource registry, the main datasource and the
//!   local override storage behind one API.
//! - Validate search patterns before they reach a datasource.
//! - Route record operations to the storage or reject them for foreign
//!   records.
//!
//! # Invariants
//! - `find` searches the main datasource only; local records are never
//!   part of search results.
//! - Every datasource call is bounded by the configured query timeout.
//! - Construction only fails when neither the main datasource nor a cached
//!   schema is available.

use crate::cache::{CacheError, CacheStore};
use crate::config::JoinerConfig;
use crate::datasource::registry::{DatasourceRegistry, DatasourceRegistryError};
use crate::datasource::{Datasource, DatasourceError, QueryPart, QueryResults};
use crate::los::{LocalOverrideStorage, ReconcileReport};
use crate::model::dataset::{DatasetError, RecordId};
use crate::model::dj_dataset::DjDataset;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod query;

pub use query::{is_valid_search_pattern, validate_query};

pub type JoinerResult<T> = Result<T, JoinerError>;

/// Joiner-level errors.
#[derive(Debug)]
pub enum JoinerError {
    /// Search pattern violates the wildcard rules.
    InvalidPattern { column: String, pattern: String },
    /// Main datasource is unavailable and no cached schema exists.
    NoUsableState { main_datasource: String },
    /// Named datasource is not registered.
    UnknownDatasource(String),
    Dataset(DatasetError),
    Datasource(DatasourceError),
    Registry(DatasourceRegistryError),
    Cache(CacheError),
}

impl Display for JoinerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPattern { column, pattern } => write!(
                f,
                "invalid search pattern `{pattern}` for column `{column}`: `*` is only allowed at the start or end of a non-empty pattern"
            ),
            Self::NoUsableState { main_datasource } => write!(
                f,
                "main datasource `{main_datasource}` is unavailable and no cached data exists"
            ),
            Self::UnknownDatasource(name) => write!(f, "datasource not found: `{name}`"),
            Self::Dataset(err) => write!(f, "{err}"),
            Self::Datasource(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "{err}"),
        }
    }
}

impl Error for JoinerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Dataset(err) => Some(err),
            Self::Datasource(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Cache(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DatasetError> for JoinerError {
    fn from(value: DatasetError) -> Self {
        Self::Dataset(value)
    }
}

impl From<DatasourceError> for JoinerError {
    fn from(value: DatasourceError) -> Self {
        Self::Datasource(value)
    }
}

impl From<DatasourceRegistryError> for JoinerError {
    fn from(value: DatasourceRegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<CacheError> for JoinerError {
    fn from(value: CacheError) -> Self {
        Self::Cache(value)
    }
}

/// One logical address database over a main datasource and the user's
/// local override storage.
pub struct DatasourceJoiner {
    registry: DatasourceRegistry,
    main: Arc<dyn Datasource>,
    los: LocalOverrideStorage,
    query_timeout: Duration,
    degraded: bool,
    last_reconcile: Option<ReconcileReport>,
}

impl DatasourceJoiner {
    /// Builds registry and storage from configuration and a cache store.
    ///
    /// An unreadable cache is logged and treated as missing.
    pub fn from_config(config: &JoinerConfig, cache: &dyn CacheStore) -> JoinerResult<Self> {
        let registry = config.build_registry();
        let snapshot = cache.load().unwrap_or_else(|err| {
            warn!(
                "event=cache_load module=joiner status=error error_code=cache_unreadable error={}",
                err
            );
            None
        });
        let los = LocalOverrideStorage::restore(snapshot);
        Self::new(registry, &config.main_datasource, los, config.query_timeout())
    }

    /// Wires a joiner and attempts one startup reconciliation.
    ///
    /// # Errors
    /// - `NoUsableState` when `main_datasource` is not registered and `los`
    ///   has no schema.
    pub fn new(
        mut registry: DatasourceRegistry,
        main_datasource: &str,
        los: LocalOverrideStorage,
        query_timeout: Duration,
    ) -> JoinerResult<Self> {
        let main_name = main_datasource.trim();
        let fallback_schema = los.has_schema().then(|| los.schema());
        let main = match registry.resolve_main(main_name, fallback_schema) {
            Ok(main) => main,
            Err(DatasourceRegistryError::MainUnavailable(name)) => {
                error!(
                    "event=joiner_init module=joiner status=error datasource={} error_code=no_usable_state",
                    name
                );
                return Err(JoinerError::NoUsableState {
                    main_datasource: name,
                });
            }
            Err(err) => return Err(err.into()),
        };
        if main.stand_in {
            warn!(
                "event=joiner_init module=joiner status=degraded datasource={} reason=main_unavailable cached_records={}",
                main_name,
                los.len()
            );
        }
        let (main, degraded) = (main.datasource, main.stand_in);

        let mut joiner = Self {
            registry,
            main,
            los,
            query_timeout,
            degraded,
            last_reconcile: None,
        };

        if !joiner.degraded {
            if let Err(err) = joiner.refresh_los() {
                warn!(
                    "event=joiner_init module=joiner status=cached datasource={} error={}",
                    main_name, err
                );
            }
        }

        info!(
            "event=joiner_init module=joiner status=ok datasource={} degraded={} datasources={} records={}",
            main_name,
            joiner.degraded,
            joiner.registry.len(),
            joiner.los.len()
        );
        Ok(joiner)
    }

    pub fn main_datasource_name(&self) -> &str {
        self.main.name()
    }

    /// Returns sorted names of all registered datasources.
    pub fn datasource_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// `true` when the main datasource was replaced by an empty stand-in.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn los(&self) -> &LocalOverrideStorage {
        &self.los
    }

    /// Report of the last successful reconciliation.
    pub fn last_reconcile(&self) -> Option<&ReconcileReport> {
        self.last_reconcile.as_ref()
    }

    /// Searches the main datasource for `column` matching `pattern`.
    pub fn find(&self, column: &str, pattern: &str) -> JoinerResult<QueryResults<DjDataset>> {
        self.find_parts(&[QueryPart::new(column, pattern)])
    }

    /// Searches the main datasource for rows matching both predicates.
    pub fn find2(
        &self,
        column1: &str,
        pattern1: &str,
        column2: &str,
        pattern2: &str,
    ) -> JoinerResult<QueryResults<DjDataset>> {
        self.find_parts(&[
            QueryPart::new(column1, pattern1),
            QueryPart::new(column2, pattern2),
        ])
    }

    /// Searches the main datasource; the local storage is not searched.
    ///
    /// # Errors
    /// - `InvalidPattern` before any datasource call.
    /// - `Datasource` (e.g. `Timeout`) unchanged from the main datasource.
    pub fn find_parts(&self, parts: &[QueryPart]) -> JoinerResult<QueryResults<DjDataset>> {
        validate_query(parts)?;
        let started_at = Instant::now();
        let hits = self.main.find(parts, self.query_timeout)?;
        info!(
            "event=joiner_find module=joiner status=ok datasource={} parts={} hits={} duration_ms={}",
            self.main.name(),
            parts.len(),
            hits.len(),
            started_at.elapsed().as_millis()
        );
        Ok(wrap_foreign(hits))
    }

    /// Lists everything the main datasource is willing to list.
    pub fn contents_of_main(&self) -> JoinerResult<QueryResults<DjDataset>> {
        Ok(wrap_foreign(self.main.contents(self.query_timeout)?))
    }

    /// Lists everything the named datasource is willing to list.
    pub fn contents_of(&self, name: &str) -> JoinerResult<QueryResults<DjDataset>> {
        let datasource = self
            .registry
            .get(name)
            .ok_or_else(|| JoinerError::UnknownDatasource(name.trim().to_string()))?;
        Ok(wrap_foreign(datasource.contents(self.query_timeout)?))
    }

    /// Snapshot of every local record in storage order.
    pub fn get_los(&self) -> QueryResults<DjDataset> {
        self.los.records().cloned().map(DjDataset::Los).collect()
    }

    pub fn new_dataset(&mut self) -> JoinerResult<DjDataset> {
        let id = self.los.new_dataset();
        self.snapshot_of(id)
    }

    /// # Errors
    /// - `DatasetNotFound` when the local storage is empty.
    pub fn selected_dataset(&self) -> JoinerResult<DjDataset> {
        Ok(DjDataset::Los(self.los.selected_dataset()?.clone()))
    }

    pub fn is_selected(&self, dataset: &DjDataset) -> bool {
        dataset
            .record_id()
            .is_some_and(|id| self.los.is_selected(id))
    }

    /// Writes a local override and returns the updated record.
    pub fn set(
        &mut self,
        dataset: &DjDataset,
        column: &str,
        value: impl Into<String>,
    ) -> JoinerResult<DjDataset> {
        let id = local_id(dataset, "set")?;
        self.los.record_mut(id)?.set(column, value)?;
        self.snapshot_of(id)
    }

    /// Drops a local override; a no-op for foreign records.
    pub fn discard_local_override(&mut self, dataset: &DjDataset, column: &str) -> JoinerResult<()> {
        let Some(id) = dataset.record_id() else {
            return Ok(());
        };
        self.los.record_mut(id)?.discard_local_override(column)?;
        Ok(())
    }

    pub fn select(&mut self, dataset: &DjDataset) -> JoinerResult<()> {
        let id = local_id(dataset, "select")?;
        self.los.select(id)?;
        Ok(())
    }

    pub fn remove(&mut self, dataset: &DjDataset) -> JoinerResult<()> {
        let id = local_id(dataset, "remove")?;
        self.los.remove(id)?;
        Ok(())
    }

    /// Copies `dataset` into the local storage and returns the new record.
    pub fn copy(&mut self, dataset: &DjDataset) -> JoinerResult<DjDataset> {
        let id = match dataset {
            DjDataset::Foreign(record) => self.los.copy_non_los_dataset(record),
            DjDataset::Los(record) => self.los.copy_dataset(record.id())?,
        };
        self.snapshot_of(id)
    }

    /// Reconciles the local storage against the main datasource.
    ///
    /// # Errors
    /// - `Datasource` (e.g. `Timeout`); the storage is unchanged then.
    pub fn refresh_los(&mut self) -> JoinerResult<&ReconcileReport> {
        let report = self
            .los
            .refresh_from_database(self.main.as_ref(), self.query_timeout)?;
        Ok(self.last_reconcile.insert(report))
    }

    /// Persists the local storage into `store`.
    pub fn save_cache(&self, store: &mut dyn CacheStore) -> JoinerResult<()> {
        store.save(&self.los.to_snapshot())?;
        Ok(())
    }

    fn snapshot_of(&self, id: RecordId) -> JoinerResult<DjDataset> {
        let record = self.los.get(id).ok_or(DatasetError::UnknownRecord(id))?;
        Ok(DjDataset::Los(record.clone()))
    }
}

fn local_id(dataset: &DjDataset, operation: &'static str) -> JoinerResult<RecordId> {
    dataset
        .record_id()
        .ok_or(JoinerError::Dataset(DatasetError::UnsupportedOperation(
            operation,
        )))
}

fn wrap_foreign(results: QueryResults) -> QueryResults<DjDataset> {
    results.into_iter().map(DjDataset::Foreign).collect()
}
