//! Repository error kinds and fault classification.
//!
//! # Responsibility
//! - Separate "the query ran and found nothing" from "the engine failed".
//! - Decide which failures justify reopening the store handle.
//!
//! # Invariants
//! - Only [`Fault::Engine`] triggers a reconnect; decode failures would
//!   read the same bytes through a fresh handle.
//! - An empty result is never reported as a data error, and a fault is never
//!   reported as not-found.

use crate::db::StoreError;
use crate::model::entry::EntryId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// What an empty result was looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Entry(EntryId),
    Tags,
    /// No candidate survived filtering, or the target itself does not exist.
    SimilarEntries(EntryId),
}

impl Display for Missing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry(id) => write!(f, "entry with id {id} not found"),
            Self::Tags => f.write_str("corpus has no tags"),
            Self::SimilarEntries(id) => write!(f, "no similar entries found for entry {id}"),
        }
    }
}

/// Classified cause of a failed query.
#[derive(Debug)]
pub enum Fault {
    /// The engine failed while preparing or stepping the statement.
    Engine(rusqlite::Error),
    /// A row came back but a column could not be read as the expected type.
    Decode(rusqlite::Error),
    /// Tag column holds JSON that is not an array of strings.
    MalformedTags {
        id: EntryId,
        source: serde_json::Error,
    },
    /// No handle could be obtained to run the query on.
    Unavailable(StoreError),
}

impl Fault {
    /// Whether a fresh handle could plausibly succeed where this one failed.
    pub fn is_engine_fault(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "engine fault: {err}"),
            Self::Decode(err) => write!(f, "undecodable row: {err}"),
            Self::MalformedTags { id, source } => {
                write!(f, "entry {id} has malformed tags: {source}")
            }
            Self::Unavailable(err) => write!(f, "store unavailable: {err}"),
        }
    }
}

impl Error for Fault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) | Self::Decode(err) => Some(err),
            Self::MalformedTags { source, .. } => Some(source),
            Self::Unavailable(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for Fault {
    fn from(value: rusqlite::Error) -> Self {
        if is_decode_error(&value) {
            Self::Decode(value)
        } else {
            Self::Engine(value)
        }
    }
}

/// Outward error of every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// The query ran; its logical result is empty.
    NotFound(Missing),
    /// The query failed. Engine faults have already been followed by one
    /// reconnect attempt when this is returned.
    Data {
        operation: &'static str,
        fault: Fault,
    },
    /// Caller broke the operation contract; nothing was queried.
    InvalidArgument(String),
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::Data { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(missing) => write!(f, "{missing}"),
            Self::Data { operation, fault } => write!(f, "data error in {operation}: {fault}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Data { fault, .. } => Some(fault),
            Self::NotFound(_) | Self::InvalidArgument(_) => None,
        }
    }
}

/// Maps an optional single row to the entry or a not-found error.
pub fn require_row<T>(row: Option<T>, missing: Missing) -> RepoResult<T> {
    row.ok_or(RepoError::NotFound(missing))
}

/// Maps an empty row set to a not-found error.
pub fn require_rows<T>(rows: Vec<T>, missing: Missing) -> RepoResult<Vec<T>> {
    if rows.is_empty() {
        return Err(RepoError::NotFound(missing));
    }
    Ok(rows)
}

fn is_decode_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidColumnName(_)
            | rusqlite::Error::Utf8Error(_)
    )
}

#[cfg(test)]
mod tests {
    use super::{require_row, require_rows, Fault, Missing, RepoError};
    use rusqlite::types::Type;

    #[test]
    fn sqlite_failures_are_engine_faults() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            Some("database disk image is malformed".to_string()),
        );
        assert!(Fault::from(err).is_engine_fault());
    }

    #[test]
    fn column_type_mismatches_are_decode_faults() {
        let err = rusqlite::Error::InvalidColumnType(1, "person_id".to_string(), Type::Null);
        let fault = Fault::from(err);
        assert!(matches!(fault, Fault::Decode(_)));
        assert!(!fault.is_engine_fault());
    }

    #[test]
    fn empty_results_become_not_found() {
        let err = require_rows(Vec::<i64>::new(), Missing::Tags).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "corpus has no tags");

        let err = require_row(None::<i64>, Missing::Entry(7)).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(Missing::Entry(7))));

        assert_eq!(require_rows(vec![1], Missing::Tags).unwrap(), vec![1]);
    }
}
