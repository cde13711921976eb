//! Diary entry repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the three read operations over the `entries` relation.
//! - Convert raw rows into [`DiaryEntry`] at the storage boundary.
//! - Drive the reconnect-once policy on engine faults.
//!
//! # Invariants
//! - Strictly read-only; no statement here mutates the store.
//! - A failed query is never retried; it triggers at most one reconnect and
//!   then surfaces as [`RepoError::Data`].
//! - `similar` orders by cosine similarity descending, then `id` ascending,
//!   so identical calls against an unchanged store return identical lists.
//! - No results are cached between calls.

use crate::config::StoreConfig;
use crate::db::{provision_store, StoreConnection, StoreError, StoreResult};
use crate::model::entry::{DiaryEntry, EntryId};
use crate::repo::fault::{require_row, require_rows, Fault, Missing, RepoError, RepoResult};
use crate::search::similarity::COSINE_SIMILARITY_FN;
use crate::session::SessionId;
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, Row};
use std::time::Instant;

/// Candidates returned by [`SimilarQuery::new`] unless overridden.
pub const DEFAULT_SIMILAR_LIMIT: usize = 5;

const ENTRY_BY_ID_SQL: &str = "SELECT
    id,
    person_id,
    text,
    json(tag) AS tag
FROM entries
WHERE id = ?1;";

const ALL_TAGS_SQL: &str = "SELECT DISTINCT tag.value AS tag
FROM entries, json_each(entries.tag) AS tag
WHERE tag.value IS NOT NULL
ORDER BY tag.value ASC;";

/// Parameters of a similarity lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarQuery {
    /// Entry the candidates are compared against.
    pub id: EntryId,
    /// Maximum number of entries to return. Must be at least 1.
    pub n: usize,
    /// Tags every candidate must carry. Empty matches everything.
    pub tags: Vec<String>,
    /// Whether candidates by the target's author may be returned.
    pub allow_same_person: bool,
}

impl SimilarQuery {
    /// Creates a query with five results, no tag filter and same-author
    /// entries allowed.
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            n: DEFAULT_SIMILAR_LIMIT,
            tags: Vec::new(),
            allow_same_person: true,
        }
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_same_person(mut self, allow: bool) -> Self {
        self.allow_same_person = allow;
        self
    }

    fn validate(&self) -> RepoResult<()> {
        if self.n < 1 {
            return Err(RepoError::InvalidArgument(
                "n must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read-only access to the diary corpus.
pub trait EntryRepository {
    /// Fetches one entry by id.
    fn fetch_by_id(&mut self, id: EntryId) -> RepoResult<DiaryEntry>;
    /// Lists every distinct tag in ascending order.
    fn all_tags(&mut self) -> RepoResult<Vec<String>>;
    /// Ranks other entries by embedding similarity to `query.id`.
    fn similar(&mut self, query: &SimilarQuery) -> RepoResult<Vec<DiaryEntry>>;
}

/// SQLite-backed entry repository serving one session.
#[derive(Debug)]
pub struct SqliteEntryRepository {
    store: StoreConnection,
    session: SessionId,
}

impl SqliteEntryRepository {
    /// Provisions and opens the configured store for a fresh session.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Self::open_with_session(config, SessionId::new())
    }

    /// Provisions and opens the configured store for an existing session.
    ///
    /// # Errors
    /// - [`StoreError::MissingStore`] when the configured location is absent.
    /// - [`StoreError::Archive`] when an archive cannot be unpacked.
    /// - Any [`StoreConnection::open`] failure.
    pub fn open_with_session(config: &StoreConfig, session: SessionId) -> StoreResult<Self> {
        if !config.location.is_file() {
            error!(
                "event=repo_open module=repo status=error session={} error_code=store_missing path={}",
                session,
                config.location.display()
            );
            return Err(StoreError::MissingStore(config.location.clone()));
        }

        let active_path = provision_store(&config.location, config.zip_password.as_deref())?;
        let store = StoreConnection::open(&active_path)?;
        info!(
            "event=repo_open module=repo status=ok session={} path={}",
            session,
            active_path.display()
        );
        Ok(Self::from_connection(store, session))
    }

    /// Wraps an already opened connection manager.
    pub fn from_connection(store: StoreConnection, session: SessionId) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Connection manager backing this repository.
    pub fn store(&self) -> &StoreConnection {
        &self.store
    }

    /// Runs one query, applying the reconnect-once policy on engine faults.
    fn run<T>(
        &mut self,
        operation: &'static str,
        query: impl FnOnce(&Connection) -> Result<T, Fault>,
    ) -> RepoResult<T> {
        let outcome = match self.store.connection() {
            Ok(conn) => query(conn),
            Err(err) => Err(Fault::Unavailable(err)),
        };

        let fault = match outcome {
            Ok(value) => return Ok(value),
            Err(fault) => fault,
        };

        if fault.is_engine_fault() {
            self.store.mark_faulted();
            warn!(
                "event=repo_fault module=repo status=reconnecting session={} operation={} error={}",
                self.session, operation, fault
            );
            if let Err(err) = self.store.reinitialize() {
                error!(
                    "event=repo_fault module=repo status=reconnect_failed session={} operation={} error={}",
                    self.session, operation, err
                );
            }
        }

        Err(RepoError::Data { operation, fault })
    }

    fn log_outcome<T>(
        &self,
        operation: &'static str,
        started_at: Instant,
        result: &RepoResult<T>,
        count: impl Fn(&T) -> usize,
    ) {
        let duration_ms = started_at.elapsed().as_millis();
        match result {
            Ok(value) => info!(
                "event={operation} module=repo status=ok session={} rows={} duration_ms={duration_ms}",
                self.session,
                count(value)
            ),
            Err(RepoError::NotFound(missing)) => info!(
                "event={operation} module=repo status=not_found session={} duration_ms={duration_ms} reason={missing}",
                self.session
            ),
            Err(err) => error!(
                "event={operation} module=repo status=error session={} duration_ms={duration_ms} error={err}",
                self.session
            ),
        }
    }
}

impl EntryRepository for SqliteEntryRepository {
    fn fetch_by_id(&mut self, id: EntryId) -> RepoResult<DiaryEntry> {
        let started_at = Instant::now();
        debug!(
            "event=fetch_by_id module=repo status=start session={} id={id}",
            self.session
        );

        let result = self
            .run("fetch_by_id", |conn| {
                let mut stmt = conn.prepare(ENTRY_BY_ID_SQL)?;
                let mut rows = stmt.query([id])?;
                let entry = match rows.next()? {
                    Some(row) => Some(parse_entry_row(row)?),
                    None => None,
                };
                Ok(entry)
            })
            .and_then(|row| require_row(row, Missing::Entry(id)));

        self.log_outcome("fetch_by_id", started_at, &result, |_| 1);
        result
    }

    fn all_tags(&mut self) -> RepoResult<Vec<String>> {
        let started_at = Instant::now();
        debug!(
            "event=all_tags module=repo status=start session={}",
            self.session
        );

        let result = self
            .run("all_tags", |conn| {
                let mut stmt = conn.prepare(ALL_TAGS_SQL)?;
                let mut rows = stmt.query([])?;
                let mut tags = Vec::new();
                while let Some(row) = rows.next()? {
                    tags.push(row.get::<_, String>("tag")?);
                }
                Ok(tags)
            })
            .and_then(|tags| require_rows(tags, Missing::Tags));

        self.log_outcome("all_tags", started_at, &result, Vec::len);
        result
    }

    fn similar(&mut self, query: &SimilarQuery) -> RepoResult<Vec<DiaryEntry>> {
        query.validate()?;

        let started_at = Instant::now();
        debug!(
            "event=similar module=repo status=start session={} id={} n={} tags={} allow_same_person={}",
            self.session,
            query.id,
            query.n,
            query.tags.len(),
            query.allow_same_person
        );

        let sql = similar_sql();
        let required_tags = serde_json::json!(query.tags).to_string();
        let limit = i64::try_from(query.n).unwrap_or(i64::MAX);

        let result = self
            .run("similar", |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![
                    query.id,
                    required_tags,
                    query.allow_same_person,
                    limit
                ])?;
                let mut entries = Vec::new();
                while let Some(row) = rows.next()? {
                    entries.push(parse_entry_row(row)?);
                }
                Ok(entries)
            })
            .and_then(|entries| require_rows(entries, Missing::SimilarEntries(query.id)));
        if let Ok(entries) = &result {
            debug_assert!(entries.iter().all(|entry| entry.has_all_tags(&query.tags)));
        }

        self.log_outcome("similar", started_at, &result, Vec::len);
        result
    }
}

/// Candidate query for [`EntryRepository::similar`].
///
/// A missing target yields zero rows through the join, which callers see as
/// not-found like any other empty candidate set.
fn similar_sql() -> String {
    format!(
        "WITH target AS (
            SELECT id, person_id, vector
            FROM entries
            WHERE id = ?1
        )
        SELECT
            e.id AS id,
            e.person_id AS person_id,
            e.text AS text,
            json(e.tag) AS tag
        FROM entries e
        JOIN target t ON e.id != t.id
        WHERE NOT EXISTS (
                SELECT 1
                FROM json_each(?2) AS wanted
                WHERE NOT EXISTS (
                    SELECT 1
                    FROM json_each(e.tag) AS have
                    WHERE have.value = wanted.value
                )
            )
          AND (?3 OR e.person_id != t.person_id)
        ORDER BY {COSINE_SIMILARITY_FN}(t.vector, e.vector) DESC, e.id ASC
        LIMIT ?4;"
    )
}

fn parse_entry_row(row: &Row<'_>) -> Result<DiaryEntry, Fault> {
    let id: EntryId = row.get("id")?;
    let tags = match row.get::<_, Option<String>>("tag")? {
        // Null elements carry no tag.
        Some(raw) => serde_json::from_str::<Vec<Option<String>>>(&raw)
            .map_err(|source| Fault::MalformedTags { id, source })?
            .into_iter()
            .flatten()
            .collect(),
        None => Vec::new(),
    };

    Ok(DiaryEntry {
        id,
        person_id: row.get("person_id")?,
        text: row.get("text")?,
        tags,
    })
}
