//! Embedding similarity entry points.
//!
//! # Responsibility
//! - Own the vector layout and the similarity function the store queries
//!   rank with.

pub mod similarity;
