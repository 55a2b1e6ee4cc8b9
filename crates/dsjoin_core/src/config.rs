//! Joiner configuration.
//!
//! # Responsibility
//! - Deserialize the joiner's JSON configuration.
//! - Build the named datasource registry from datasource definitions.
//!
//! # Invariants
//! - Definitions are built in declaration order; `prefer` only sees names
//!   declared before it.
//! - A definition that cannot be built is logged and skipped; it never
//!   fails the whole registry.

use crate::datasource::empty::EmptyDatasource;
use crate::datasource::memory::MemoryDatasource;
use crate::datasource::prefer::PreferDatasource;
use crate::datasource::registry::DatasourceRegistry;
use crate::datasource::{Datasource, DatasourceError, DatasourceResult};
use crate::model::dataset::ColumnValues;
use crate::model::schema::Schema;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Default budget for every datasource call issued by the joiner.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 3000;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read configuration: {err}"),
            Self::Json(err) => write!(f, "cannot parse configuration: {err}"),
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Top-level joiner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinerConfig {
    /// Name of the datasource the local storage reconciles against.
    pub main_datasource: String,
    /// Budget for each datasource call, in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default)]
    pub datasources: Vec<DatasourceDefinition>,
}

/// One named datasource declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasourceDefinition {
    /// Rows held in memory.
    Memory {
        name: String,
        schema: Vec<String>,
        #[serde(default)]
        rows: Vec<RowDefinition>,
        /// Simulated per-call latency.
        #[serde(default)]
        latency_ms: u64,
    },
    /// Datasource that never returns rows.
    Empty { name: String, schema: Vec<String> },
    /// `over` masks `source` by key.
    Prefer {
        name: String,
        source: String,
        over: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDefinition {
    pub key: String,
    #[serde(default)]
    pub values: ColumnValues,
}

fn default_query_timeout_ms() -> u64 {
    DEFAULT_QUERY_TIMEOUT_MS
}

impl JoinerConfig {
    /// Minimal configuration naming only the main datasource.
    pub fn new(main_datasource: impl Into<String>) -> Self {
        Self {
            main_datasource: main_datasource.into(),
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            datasources: Vec::new(),
        }
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.main_datasource.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "main_datasource cannot be empty".to_string(),
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "query_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Builds every declared datasource, dropping the ones that fail.
    pub fn build_registry(&self) -> DatasourceRegistry {
        let mut registry = DatasourceRegistry::new();
        for definition in &self.datasources {
            let built = definition
                .build(&registry)
                .map_err(|err| err.to_string())
                .and_then(|datasource| {
                    registry
                        .register(datasource)
                        .map_err(|err| err.to_string())
                });
            match built {
                Ok(()) => info!(
                    "event=datasource_register module=config status=ok datasource={}",
                    definition.name()
                ),
                Err(err) => warn!(
                    "event=datasource_register module=config status=skipped datasource={} error={}",
                    definition.name(),
                    err
                ),
            }
        }
        registry
    }
}

impl DatasourceDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Memory { name, .. } | Self::Empty { name, .. } | Self::Prefer { name, .. } => {
                name
            }
        }
    }

    /// Builds the datasource; `prefer` resolves its inputs in `registry`.
    pub fn build(&self, registry: &DatasourceRegistry) -> DatasourceResult<Arc<dyn Datasource>> {
        match self {
            Self::Memory {
                name,
                schema,
                rows,
                latency_ms,
            } => {
                let rows = rows
                    .iter()
                    .map(|row| (row.key.clone(), row.values.clone()))
                    .collect();
                let datasource = MemoryDatasource::new(name.as_str(), to_schema(name, schema)?, rows)?
                    .with_latency(Duration::from_millis(*latency_ms));
                Ok(Arc::new(datasource))
            }
            Self::Empty { name, schema } => Ok(Arc::new(EmptyDatasource::new(
                name.as_str(),
                to_schema(name, schema)?,
            ))),
            Self::Prefer { name, source, over } => {
                let lookup = |reference: &str| {
                    registry.get(reference).ok_or_else(|| {
                        DatasourceError::config(
                            name,
                            format!("referenced datasource `{reference}` is not defined"),
                        )
                    })
                };
                let datasource = PreferDatasource::new(name.as_str(), lookup(source)?, lookup(over)?)?;
                Ok(Arc::new(datasource))
            }
        }
    }
}

fn to_schema(name: &str, columns: &[String]) -> DatasourceResult<Schema> {
    let mut schema = Schema::new();
    for column in columns {
        let column = column.trim();
        if column.is_empty() {
            return Err(DatasourceError::config(name, "schema contains an empty column name"));
        }
        if !schema.insert(column.to_string()) {
            return Err(DatasourceError::config(
                name,
                format!("schema lists column `{column}` twice"),
            ));
        }
    }
    Ok(schema)
}
