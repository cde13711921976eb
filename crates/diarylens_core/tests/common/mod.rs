#![allow(dead_code)]

use diarylens_core::encode_vector;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

pub const ENTRIES_DDL: &str = "CREATE TABLE entries (
    id INTEGER PRIMARY KEY,
    person_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    tag TEXT,
    vector BLOB
);";

pub struct Fixture {
    pub id: i64,
    pub person_id: i64,
    pub text: &'static str,
    /// Raw value of the `tag` column.
    pub tag_json: Option<String>,
    pub vector: Vec<f32>,
}

impl Fixture {
    pub fn new(id: i64, person_id: i64, tags: &[&str], vector: &[f32]) -> Self {
        Self {
            id,
            person_id,
            text: "Запись<br/>дневника",
            tag_json: Some(serde_json::json!(tags).to_string()),
            vector: vector.to_vec(),
        }
    }

    pub fn with_raw_tags(mut self, raw: &str) -> Self {
        self.tag_json = Some(raw.to_string());
        self
    }
}

/// Corpus around entry 100: 200 shares its author (similarity 0.9), 300 is
/// by another author (0.4), 500 scores 0.7 and 400 is orthogonal.
pub fn sample_corpus() -> Vec<Fixture> {
    vec![
        Fixture::new(100, 7, &["war", "family"], &[1.0, 0.0, 0.0]),
        Fixture::new(200, 7, &["war"], &[0.9, 0.435_889_9, 0.0]),
        Fixture::new(300, 9, &["war", "travel"], &[0.4, 0.916_515_1, 0.0]),
        Fixture::new(400, 9, &["travel", "путешествие"], &[0.0, 1.0, 0.0]),
        Fixture::new(500, 11, &["family"], &[0.7, 0.0, 0.714_142_8]),
    ]
}

pub fn build_store(path: &Path, entries: &[Fixture]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(ENTRIES_DDL).unwrap();
    for entry in entries {
        conn.execute(
            "INSERT INTO entries (id, person_id, text, tag, vector) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                entry.id,
                entry.person_id,
                entry.text,
                entry.tag_json,
                encode_vector(&entry.vector),
            ],
        )
        .unwrap();
    }
}

pub fn sample_store(dir: &Path) -> PathBuf {
    let path = dir.join("diaries_vec.db");
    build_store(&path, &sample_corpus());
    path
}

pub fn ids(entries: &[diarylens_core::DiaryEntry]) -> Vec<i64> {
    entries.iter().map(|entry| entry.id).collect()
}
