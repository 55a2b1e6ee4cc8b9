//! Cache format upgrades for the `los_*` tables.
//!
//! # Invariants
//! - `CACHE_FORMAT_VERSION` is the version of the last step.
//! - A cache is upgraded completely or not at all.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// Cache format written by this build.
pub const CACHE_FORMAT_VERSION: u32 = 2;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "los_tables",
        sql: include_str!("0001_los_cache.sql"),
    },
    Step {
        version: 2,
        name: "cache_meta",
        sql: include_str!("0002_cache_meta.sql"),
    },
];

/// Cache format recorded in the database, `0` for a fresh file.
pub fn cache_format_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Brings the `los_*` tables up to `CACHE_FORMAT_VERSION`.
///
/// Returns the format the cache had before the call.
///
/// # Errors
/// - `NewerCacheFormat` when the cache was written by a newer build.
/// - `Migration` naming the failed step; nothing was changed.
pub fn migrate_cache(conn: &mut Connection) -> DbResult<u32> {
    let found = cache_format_version(conn)?;
    if found > CACHE_FORMAT_VERSION {
        return Err(DbError::NewerCacheFormat {
            found,
            supported: CACHE_FORMAT_VERSION,
        });
    }
    if found == CACHE_FORMAT_VERSION {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    for step in STEPS.iter().filter(|step| step.version > found) {
        debug!(
            "event=cache_upgrade_step module=db status=start version={} step={}",
            step.version, step.name
        );
        tx.execute_batch(step.sql)
            .map_err(|source| DbError::Migration {
                version: step.version,
                source,
            })?;
    }
    tx.pragma_update(None, "user_version", CACHE_FORMAT_VERSION)?;
    tx.commit()?;

    info!(
        "event=cache_upgrade module=db status=ok from_format={} to_format={}",
        found, CACHE_FORMAT_VERSION
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::{migrate_cache, CACHE_FORMAT_VERSION, STEPS};
    use rusqlite::Connection;

    #[test]
    fn format_version_matches_last_step() {
        let versions: Vec<u32> = STEPS.iter().map(|step| step.version).collect();
        assert_eq!(versions, (1..=CACHE_FORMAT_VERSION).collect::<Vec<_>>());
    }

    #[test]
    fn upgrade_from_first_format_adds_meta_table_only() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(STEPS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        assert_eq!(migrate_cache(&mut conn).unwrap(), 1);
        assert_eq!(migrate_cache(&mut conn).unwrap(), CACHE_FORMAT_VERSION);

        let meta: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'los_meta';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(meta, 1);
    }
}
