//! Named datasources available to one joiner.
//!
//! # Responsibility
//! - Hold every datasource built from configuration under its own name.
//! - Resolve the main datasource, substituting an empty stand-in when it is
//!   missing but a cached schema keeps the joiner usable.
//!
//! # Invariants
//! - Names are trimmed and non-empty; any other spelling is accepted as is.
//! - A stand-in is only ever registered under a name no datasource holds.

use crate::datasource::empty::EmptyDatasource;
use crate::datasource::Datasource;
use crate::model::schema::Schema;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceRegistryError {
    EmptyName,
    DuplicateName(String),
    /// Main datasource is not registered and no fallback schema exists.
    MainUnavailable(String),
}

impl Display for DatasourceRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "datasource name cannot be empty"),
            Self::DuplicateName(name) => write!(f, "datasource `{name}` is defined twice"),
            Self::MainUnavailable(name) => {
                write!(f, "main datasource `{name}` is not available")
            }
        }
    }
}

impl Error for DatasourceRegistryError {}

/// Main datasource picked by `DatasourceRegistry::resolve_main`.
pub struct MainDatasource {
    pub datasource: Arc<dyn Datasource>,
    /// `true` when `datasource` is an empty stand-in.
    pub stand_in: bool,
}

#[derive(Default)]
pub struct DatasourceRegistry {
    datasources: BTreeMap<String, Arc<dyn Datasource>>,
}

impl DatasourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `datasource` under its trimmed name.
    pub fn register(
        &mut self,
        datasource: Arc<dyn Datasource>,
    ) -> Result<(), DatasourceRegistryError> {
        let name = registry_name(datasource.name())?;
        if self.datasources.contains_key(&name) {
            return Err(DatasourceRegistryError::DuplicateName(name));
        }
        self.datasources.insert(name, datasource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.datasources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasources.is_empty()
    }

    /// Sorted datasource names.
    pub fn names(&self) -> Vec<String> {
        self.datasources.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Datasource>> {
        self.datasources.get(name.trim()).cloned()
    }

    /// Returns the datasource registered as `name`.
    ///
    /// When none is, and `fallback_schema` is given, registers an
    /// `EmptyDatasource` with that schema under `name` and returns it.
    ///
    /// # Errors
    /// - `EmptyName` for a blank `name`.
    /// - `MainUnavailable` when `name` is unknown and there is no fallback.
    pub fn resolve_main(
        &mut self,
        name: &str,
        fallback_schema: Option<Schema>,
    ) -> Result<MainDatasource, DatasourceRegistryError> {
        let name = registry_name(name)?;
        if let Some(datasource) = self.datasources.get(&name) {
            return Ok(MainDatasource {
                datasource: Arc::clone(datasource),
                stand_in: false,
            });
        }

        let schema = fallback_schema
            .ok_or_else(|| DatasourceRegistryError::MainUnavailable(name.clone()))?;
        let stand_in: Arc<dyn Datasource> = Arc::new(EmptyDatasource::new(name.as_str(), schema));
        self.datasources.insert(name, Arc::clone(&stand_in));
        Ok(MainDatasource {
            datasource: stand_in,
            stand_in: true,
        })
    }
}

fn registry_name(raw: &str) -> Result<String, DatasourceRegistryError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DatasourceRegistryError::EmptyName);
    }
    Ok(name.to_string())
}
