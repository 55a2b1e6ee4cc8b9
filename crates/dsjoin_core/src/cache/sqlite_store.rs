//! SQLite-backed cache store.
//!
//! # Responsibility
//! - Map `CacheSnapshot` onto the `los_*` tables and back.
//!
//! # Invariants
//! - `save` rewrites every `los_*` table in a single transaction.
//! - Storage order of schema columns and records is preserved via
//!   `position`.

use crate::cache::{CacheError, CacheResult, CacheStore};
use crate::db::{open_db, open_db_in_memory};
use crate::los::{CacheSnapshot, CachedRecord};
use crate::model::dataset::ColumnValues;
use crate::model::key::DatasetKey;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const LAYER_CACHE: &str = "cache";
const LAYER_OVERRIDE: &str = "override";
const KEY_KIND_AUTHORITATIVE: &str = "authoritative";
const KEY_KIND_LOCAL: &str = "local";
const META_SAVED_AT: &str = "saved_at_ms";

/// Cache store persisting into one SQLite database.
pub struct SqliteCacheStore {
    conn: Connection,
}

impl SqliteCacheStore {
    /// Opens (or creates) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn in_memory() -> CacheResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Epoch milliseconds of the last successful `save`.
    pub fn last_saved_at_ms(&self) -> CacheResult<Option<i64>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM los_meta WHERE name = ?1;",
                params![META_SAVED_AT],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|raw| {
                raw.parse::<i64>().map_err(|err| {
                    CacheError::InvalidData(format!("invalid `{META_SAVED_AT}` value `{raw}`: {err}"))
                })
            })
            .transpose()
    }

    fn load_schema(&self) -> CacheResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT column_name FROM los_schema ORDER BY position ASC;")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn load_records(&self) -> CacheResult<Vec<CachedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, key_kind, key_value, has_cache
             FROM los_records
             ORDER BY position ASC;",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)? != 0,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut values_stmt = self.conn.prepare(
            "SELECT layer, column_name, value
             FROM los_values
             WHERE record_position = ?1;",
        )?;

        let mut records = Vec::with_capacity(rows.len());
        for (position, key_kind, key_value, has_cache) in rows {
            let mut cache = has_cache.then(ColumnValues::new);
            let mut overrides = ColumnValues::new();
            let values = values_stmt
                .query_map(params![position], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for (layer, column, value) in values {
                match (layer.as_str(), cache.as_mut()) {
                    (LAYER_OVERRIDE, _) => {
                        overrides.insert(column, value);
                    }
                    (LAYER_CACHE, Some(cache)) => {
                        cache.insert(column, value);
                    }
                    _ => {
                        return Err(CacheError::InvalidData(format!(
                            "record at position {position} has `{layer}` value for `{column}` without a backing store"
                        )));
                    }
                }
            }

            records.push(CachedRecord {
                key: decode_key(&key_kind, key_value)?,
                cache,
                overrides,
            });
        }
        Ok(records)
    }

    fn load_selection(&self) -> CacheResult<Option<DatasetKey>> {
        let selection: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT key_kind, key_value FROM los_selection WHERE id = 1;",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        selection
            .map(|(kind, value)| decode_key(&kind, value))
            .transpose()
    }
}

impl CacheStore for SqliteCacheStore {
    fn load(&self) -> CacheResult<Option<CacheSnapshot>> {
        if self.last_saved_at_ms()?.is_none() {
            return Ok(None);
        }

        Ok(Some(CacheSnapshot {
            schema: self.load_schema()?,
            records: self.load_records()?,
            selected: self.load_selection()?,
        }))
    }

    fn save(&mut self, snapshot: &CacheSnapshot) -> CacheResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM los_values;
             DELETE FROM los_records;
             DELETE FROM los_schema;
             DELETE FROM los_selection;",
        )?;

        for (position, column) in snapshot.schema.iter().enumerate() {
            tx.execute(
                "INSERT INTO los_schema (position, column_name) VALUES (?1, ?2);",
                params![position as i64, column],
            )?;
        }

        for (position, record) in snapshot.records.iter().enumerate() {
            let position = position as i64;
            let (kind, value) = encode_key(&record.key);
            tx.execute(
                "INSERT INTO los_records (position, key_kind, key_value, has_cache)
                 VALUES (?1, ?2, ?3, ?4);",
                params![position, kind, value, i64::from(record.cache.is_some())],
            )?;

            let layers = record
                .cache
                .iter()
                .flat_map(|cache| cache.iter().map(|entry| (LAYER_CACHE, entry)))
                .chain(record.overrides.iter().map(|entry| (LAYER_OVERRIDE, entry)));
            for (layer, (column, value)) in layers {
                tx.execute(
                    "INSERT INTO los_values (record_position, layer, column_name, value)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![position, layer, column, value],
                )?;
            }
        }

        if let Some(selected) = &snapshot.selected {
            let (kind, value) = encode_key(selected);
            tx.execute(
                "INSERT INTO los_selection (id, key_kind, key_value) VALUES (1, ?1, ?2);",
                params![kind, value],
            )?;
        }

        tx.execute(
            "INSERT INTO los_meta (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value;",
            params![META_SAVED_AT, now_epoch_ms().to_string()],
        )?;
        tx.commit()?;

        info!(
            "event=cache_save module=cache status=ok store=sqlite records={} columns={}",
            snapshot.records.len(),
            snapshot.schema.len()
        );
        Ok(())
    }
}

fn encode_key(key: &DatasetKey) -> (&'static str, String) {
    match key {
        DatasetKey::Authoritative(value) => (KEY_KIND_AUTHORITATIVE, value.clone()),
        DatasetKey::Local(counter) => (KEY_KIND_LOCAL, counter.to_string()),
    }
}

fn decode_key(kind: &str, value: String) -> CacheResult<DatasetKey> {
    match kind {
        KEY_KIND_AUTHORITATIVE => Ok(DatasetKey::Authoritative(value)),
        KEY_KIND_LOCAL => value.parse::<u64>().map(DatasetKey::Local).map_err(|err| {
            CacheError::InvalidData(format!("invalid local key `{value}`: {err}"))
        }),
        other => Err(CacheError::InvalidData(format!("unknown key kind `{other}`"))),
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
