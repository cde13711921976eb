//! Read-only handle bootstrap.
//!
//! # Responsibility
//! - Open the store file read-only.
//! - Apply the fixed resource limits and register the similarity function.
//! - Verify the `entries` relation before handing the handle out.
//!
//! # Invariants
//! - Returned handles reject writes (`SQLITE_OPEN_READ_ONLY` + `query_only`).
//! - Returned handles never spawn auxiliary sorter threads.
//!
//! # See also
//! - crate::config::STORE_LIMITS

use super::{StoreError, StoreResult};
use crate::config::STORE_LIMITS;
use crate::search::similarity::register_similarity_function;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Instant;

/// Relation every store must expose.
pub const REQUIRED_RELATION: &str = "entries";
/// Columns `entries` must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "person_id", "text", "tag", "vector"];

/// Opens a read-only handle on an existing store file.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
///
/// # Errors
/// - [`StoreError::MissingStore`] when `path` is not an existing file.
/// - [`StoreError::Sqlite`] when the engine cannot open or configure it.
/// - [`StoreError::MissingRequiredRelation`] / [`StoreError::MissingRequiredColumn`]
///   when the schema does not match.
pub fn open_store(path: &Path) -> StoreResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=read_only path={}",
        path.display()
    );

    if !path.is_file() {
        error!(
            "event=db_open module=db status=error mode=read_only duration_ms={} error_code=store_missing path={}",
            started_at.elapsed().as_millis(),
            path.display()
        );
        return Err(StoreError::MissingStore(path.to_path_buf()));
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let conn = match Connection::open_with_flags(path, flags) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=read_only duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode=read_only duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=read_only duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection) -> StoreResult<()> {
    conn.pragma_update(None, "query_only", true)?;
    conn.pragma_update(None, "threads", STORE_LIMITS.auxiliary_threads())?;
    conn.pragma_update(None, "cache_size", -STORE_LIMITS.memory_limit_kib())?;
    conn.pragma_update(None, "mmap_size", 0)?;
    register_similarity_function(conn)?;
    ensure_entries_relation(conn)?;
    Ok(())
}

fn ensure_entries_relation(conn: &Connection) -> StoreResult<()> {
    if !relation_exists(conn, REQUIRED_RELATION)? {
        return Err(StoreError::MissingRequiredRelation(REQUIRED_RELATION));
    }

    let columns = relation_columns(conn, REQUIRED_RELATION)?;
    for column in REQUIRED_COLUMNS {
        if !columns.iter().any(|current| current == column) {
            return Err(StoreError::MissingRequiredColumn {
                relation: REQUIRED_RELATION,
                column,
            });
        }
    }

    Ok(())
}

fn relation_exists(conn: &Connection, relation: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type IN ('table', 'view') AND name = ?1
        );",
        [relation],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn relation_columns(conn: &Connection, relation: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({relation});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
