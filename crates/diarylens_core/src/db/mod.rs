//! Read-only store bootstrap.
//!
//! # Responsibility
//! - Turn a configured location (plain file or archive) into an openable
//!   store file.
//! - Open and configure read-only handles and own their lifecycle.
//!
//! # Invariants
//! - Every handle is read-only and runs under `config::STORE_LIMITS`.
//! - Handles are only returned after the `entries` relation has been verified.
//! - Construction failures are fatal; no partially usable store escapes.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod archive;
mod connection;
mod open;

pub use archive::{provision_store, ArchiveError};
pub use connection::{ConnectionState, StoreConnection};
pub use open::{open_store, REQUIRED_COLUMNS, REQUIRED_RELATION};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure while making the store available.
#[derive(Debug)]
pub enum StoreError {
    /// Configured location does not name an existing file.
    MissingStore(PathBuf),
    Archive(ArchiveError),
    Sqlite(rusqlite::Error),
    MissingRequiredRelation(&'static str),
    MissingRequiredColumn {
        relation: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStore(path) => write!(f, "store file not found at {}", path.display()),
            Self::Archive(err) => write!(f, "{err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::MissingRequiredRelation(relation) => {
                write!(f, "store is missing required relation `{relation}`")
            }
            Self::MissingRequiredColumn { relation, column } => {
                write!(f, "store relation `{relation}` is missing column `{column}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Archive(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::MissingStore(_)
            | Self::MissingRequiredRelation(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ArchiveError> for StoreError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
