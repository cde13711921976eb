//! Read-only access layer over the diary embedding store.
//!
//! Provides entry lookup, the tag universe and embedding-similarity ranking
//! on top of a single read-only SQLite handle that survives one engine fault
//! per query through a bounded reconnect.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod session;

pub use config::{ResourceLimits, StoreConfig, STARTING_ENTRIES, STORE_LIMITS};
pub use db::{ArchiveError, ConnectionState, StoreConnection, StoreError, StoreResult};
pub use logging::{bind_session, default_log_level, init_logging, LoggingError, SessionBinding};
pub use model::entry::{DiaryEntry, EntryId, PersonId};
pub use repo::entry_repo::{EntryRepository, SimilarQuery, SqliteEntryRepository};
pub use repo::fault::{Fault, Missing, RepoError, RepoResult};
pub use search::similarity::{cosine_similarity, encode_vector};
pub use session::SessionId;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
