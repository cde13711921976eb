mod common;

use common::{build_store, sample_store, Fixture};
use diarylens_core::db::open_store;
use diarylens_core::{ConnectionState, StoreConnection, StoreError, STORE_LIMITS};
use rusqlite::Connection;

#[test]
fn open_store_applies_read_only_limits() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_store(&sample_store(dir.path())).unwrap();

    let query_only: i64 = conn
        .query_row("PRAGMA query_only;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(query_only, 1);

    let threads: i64 = conn.query_row("PRAGMA threads;", [], |row| row.get(0)).unwrap();
    assert_eq!(threads, 0);

    let cache_size: i64 = conn
        .query_row("PRAGMA cache_size;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(cache_size, -STORE_LIMITS.memory_limit_kib());
}

#[test]
fn open_store_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_store(&sample_store(dir.path())).unwrap();

    assert!(conn.execute("DELETE FROM entries;", []).is_err());
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 5);
}

#[test]
fn open_store_registers_similarity_function() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_store(&sample_store(dir.path())).unwrap();

    let score: f64 = conn
        .query_row(
            "SELECT cosine_similarity(a.vector, b.vector)
             FROM entries a, entries b
             WHERE a.id = 100 AND b.id = 200;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!((score - 0.9).abs() < 1e-6);
}

#[test]
fn open_store_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");

    let err = open_store(&path).unwrap_err();
    assert!(matches!(err, StoreError::MissingStore(missing) if missing == path));
    assert!(!path.exists());
}

#[test]
fn open_store_requires_entries_relation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("other.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY);")
        .unwrap();

    let err = open_store(&path).unwrap_err();
    assert!(matches!(err, StoreError::MissingRequiredRelation("entries")));
}

#[test]
fn open_store_requires_vector_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_vector.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TABLE entries (id INTEGER PRIMARY KEY, person_id INTEGER, text TEXT, tag TEXT);",
        )
        .unwrap();

    let err = open_store(&path).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MissingRequiredColumn {
            relation: "entries",
            column: "vector"
        }
    ));
}

#[test]
fn open_store_accepts_entries_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("view.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE raw_entries (id INTEGER PRIMARY KEY, person_id INTEGER, text TEXT, tag TEXT, vector BLOB);
         CREATE VIEW entries AS SELECT id, person_id, text, tag, vector FROM raw_entries;",
    )
    .unwrap();
    drop(conn);

    assert!(open_store(&path).is_ok());
}

#[test]
fn reinitialize_reopens_same_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = sample_store(dir.path());
    let mut store = StoreConnection::open(&path).unwrap();
    assert_eq!(store.state(), ConnectionState::Connected);
    assert_eq!(store.path(), path.as_path());

    store.mark_faulted();
    assert_eq!(store.state(), ConnectionState::Faulted);
    store.reinitialize().unwrap();

    assert_eq!(store.state(), ConnectionState::Connected);
    assert_eq!(store.reconnect_count(), 1);
    let count: i64 = store
        .connection()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 5);
}

#[test]
fn reinitialize_failure_leaves_manager_disconnected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.db");
    build_store(&path, &[Fixture::new(1, 1, &["a"], &[1.0])]);
    let mut store = StoreConnection::open(&path).unwrap();

    std::fs::remove_file(&path).unwrap();
    let err = store.reinitialize().unwrap_err();
    assert!(matches!(err, StoreError::MissingStore(_)));
    assert_eq!(store.state(), ConnectionState::Disconnected);
    assert!(store.connection().is_err());

    build_store(&path, &[Fixture::new(1, 1, &["a"], &[1.0])]);
    assert!(store.connection().is_ok());
    assert_eq!(store.state(), ConnectionState::Connected);
    assert_eq!(store.reconnect_count(), 1);
}
