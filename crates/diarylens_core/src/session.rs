//! Per-session identity.
//!
//! One repository serves one logical session; the session id tags every log
//! event the repository emits so interleaved sessions can be told apart.

use crate::config::STARTING_ENTRIES;
use crate::model::entry::EntryId;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const SHORT_ID_LEN: usize = 10;

/// Stable identifier of one logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an id assigned elsewhere (e.g. by the front-end runtime).
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First ten hex characters, the form used in log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..SHORT_ID_LEN].to_string()
    }

    /// Entry this session opens on.
    ///
    /// Always one of [`STARTING_ENTRIES`]; the same session always gets the
    /// same entry.
    pub fn starting_entry(&self) -> EntryId {
        let index = (self.0.as_u128() % STARTING_ENTRIES.len() as u128) as usize;
        STARTING_ENTRIES[index]
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short())
    }
}
