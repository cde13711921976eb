//! Lifecycle of the single read-only store handle.
//!
//! # Responsibility
//! - Own the handle one repository session queries through.
//! - Reopen it after a detected engine fault.
//!
//! # Invariants
//! - State moves `Connected -> Faulted -> Reconnecting -> Connected`, or ends
//!   in `Disconnected` when the reopen fails.
//! - `reinitialize` is driven by the repository exactly once per detected
//!   fault; this type never reconnects on its own initiative.
//! - Errors from closing the old handle are logged and swallowed.
//! - The handle is released when the manager is dropped.

use super::open::open_store;
use super::StoreResult;
use log::{info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where the managed handle is in its fault/recovery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handle is open and believed healthy.
    Connected,
    /// A query on the handle hit an engine fault.
    Faulted,
    /// Old handle closed, new one being opened.
    Reconnecting,
    /// Reopen failed; no handle is held.
    Disconnected,
}

/// Owner of the read-only handle bound to one active store path.
#[derive(Debug)]
pub struct StoreConnection {
    path: PathBuf,
    conn: Option<Connection>,
    state: ConnectionState,
    reconnects: u64,
}

impl StoreConnection {
    /// Opens a handle on `path`.
    ///
    /// `path` must be the active store file, i.e. already provisioned.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_store(&path)?;
        Ok(Self {
            path,
            conn: Some(conn),
            state: ConnectionState::Connected,
            reconnects: 0,
        })
    }

    /// Active store path every (re)open targets.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of reconnect attempts made so far, successful or not.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    /// Returns the live handle, reopening it first if a previous reconnect
    /// left the manager `Disconnected`.
    pub fn connection(&mut self) -> StoreResult<&Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = open_store(&self.path)?;
                info!(
                    "event=db_reopen module=db status=ok reason=disconnected path={}",
                    self.path.display()
                );
                self.state = ConnectionState::Connected;
                conn
            }
        };
        Ok(&*self.conn.insert(conn))
    }

    /// Records that the current handle hit an engine fault.
    pub fn mark_faulted(&mut self) {
        self.state = ConnectionState::Faulted;
    }

    /// Closes the current handle and opens a fresh one on the same path.
    ///
    /// Close errors are logged and ignored. On reopen failure the manager is
    /// left `Disconnected` and the error is returned.
    pub fn reinitialize(&mut self) -> StoreResult<()> {
        let started_at = Instant::now();
        self.state = ConnectionState::Reconnecting;
        self.reconnects += 1;
        info!(
            "event=db_reconnect module=db status=start attempt={} path={}",
            self.reconnects,
            self.path.display()
        );

        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                warn!("event=db_close module=db status=ignored error={err}");
            }
        }

        match open_store(&self.path) {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = ConnectionState::Connected;
                info!(
                    "event=db_reconnect module=db status=ok attempt={} duration_ms={}",
                    self.reconnects,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                warn!(
                    "event=db_reconnect module=db status=error attempt={} duration_ms={} error={}",
                    self.reconnects,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}
