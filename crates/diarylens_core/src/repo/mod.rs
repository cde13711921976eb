//! Repository layer over the diary store.
//!
//! # Responsibility
//! - Define the read-only data access contract callers program against.
//! - Isolate SQL and fault recovery from callers.
//!
//! # Invariants
//! - Repository APIs distinguish empty results (`NotFound`) from engine and
//!   decode failures (`Data`).

pub mod entry_repo;
pub mod fault;
