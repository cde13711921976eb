//! Domain model for the diary corpus.
//!
//! # Responsibility
//! - Define the strongly-typed records handed to callers.
//!
//! # Invariants
//! - Records are immutable snapshots; nothing in this crate writes them back.

pub mod entry;
