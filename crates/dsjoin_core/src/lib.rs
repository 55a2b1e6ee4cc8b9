//! Core of the datasource joiner.
//! A main datasource plus the user's local override storage, presented as
//! one logical address database.

pub mod cache;
pub mod config;
pub mod datasource;
pub mod db;
pub mod joiner;
pub mod logging;
pub mod los;
pub mod model;

pub use cache::{CacheError, CacheResult, CacheStore, JsonFileCacheStore, SqliteCacheStore};
pub use config::{ConfigError, DatasourceDefinition, JoinerConfig, DEFAULT_QUERY_TIMEOUT_MS};
pub use datasource::empty::EmptyDatasource;
pub use datasource::memory::MemoryDatasource;
pub use datasource::prefer::PreferDatasource;
pub use datasource::registry::{DatasourceRegistry, DatasourceRegistryError, MainDatasource};
pub use datasource::{Datasource, DatasourceError, DatasourceResult, QueryPart, QueryResults};
pub use joiner::{DatasourceJoiner, JoinerError, JoinerResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use los::{CacheSnapshot, CachedRecord, LocalOverrideStorage, ReconcileReport};
pub use model::dataset::{ColumnValues, Dataset, DatasetError, ForeignRecord, RecordId};
pub use model::dj_dataset::DjDataset;
pub use model::key::DatasetKey;
pub use model::record::LosRecord;
pub use model::schema::{schema_of, Schema, SchemaChange};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
