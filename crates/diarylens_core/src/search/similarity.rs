//! Embedding vector codec and cosine similarity.
//!
//! # Responsibility
//! - Decode stored embedding blobs (little-endian `f32`).
//! - Compute cosine similarity between two embeddings.
//! - Register `cosine_similarity(a, b)` on store handles so ranking runs
//!   inside the query engine.
//!
//! # Invariants
//! - Both operands must have the same dimension; a mismatch is an engine
//!   error, never a silent zero.
//! - Similarity against a zero vector is undefined and yields SQL `NULL`,
//!   which sorts after every defined score in a descending order.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name under which the similarity function is registered.
pub const COSINE_SIMILARITY_FN: &str = "cosine_similarity";

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Malformed embedding input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorError {
    /// Blob length is not a whole number of `f32` values.
    Misaligned { len: usize },
    /// Operands have different dimensions.
    DimensionMismatch { left: usize, right: usize },
    /// Operand is not a blob.
    NotABlob { argument: usize },
}

impl Display for VectorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Misaligned { len } => {
                write!(f, "vector blob of {len} bytes is not a whole number of f32 values")
            }
            Self::DimensionMismatch { left, right } => {
                write!(f, "vector dimensions differ: {left} vs {right}")
            }
            Self::NotABlob { argument } => {
                write!(f, "{COSINE_SIMILARITY_FN} argument {argument} is not a vector blob")
            }
        }
    }
}

impl Error for VectorError {}

/// Encodes an embedding in the on-disk layout.
pub fn encode_vector(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Decodes an on-disk embedding.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, VectorError> {
    if bytes.len() % F32_BYTES != 0 {
        return Err(VectorError::Misaligned { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine similarity of two equally sized vectors.
///
/// Returns `Ok(None)` when either vector has zero magnitude.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<Option<f64>, VectorError> {
    if left.len() != right.len() {
        return Err(VectorError::DimensionMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (l, r) in left.iter().zip(right) {
        let (l, r) = (f64::from(*l), f64::from(*r));
        dot += l * r;
        left_norm += l * l;
        right_norm += r * r;
    }

    if left_norm == 0.0 || right_norm == 0.0 {
        return Ok(None);
    }
    Ok(Some(dot / (left_norm.sqrt() * right_norm.sqrt())))
}

/// Registers [`COSINE_SIMILARITY_FN`] on a store handle.
///
/// A `NULL` operand yields `NULL`; any other malformed operand fails the
/// statement.
pub fn register_similarity_function(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        COSINE_SIMILARITY_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        similarity_of_arguments,
    )
}

fn similarity_of_arguments(ctx: &Context<'_>) -> rusqlite::Result<Option<f64>> {
    let (Some(left), Some(right)) = (vector_argument(ctx, 0)?, vector_argument(ctx, 1)?) else {
        return Ok(None);
    };
    cosine_similarity(&left, &right).map_err(user_function_error)
}

fn vector_argument(ctx: &Context<'_>, index: usize) -> rusqlite::Result<Option<Vec<f32>>> {
    match ctx.get_raw(index) {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(bytes) => decode_vector(bytes).map(Some).map_err(user_function_error),
        _ => Err(user_function_error(VectorError::NotABlob { argument: index })),
    }
}

fn user_function_error(err: VectorError) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::{
        cosine_similarity, decode_vector, encode_vector, register_similarity_function,
        VectorError,
    };
    use rusqlite::Connection;

    #[test]
    fn vector_codec_is_little_endian_f32() {
        let bytes = encode_vector(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0_f32.to_le_bytes());
        assert_eq!(decode_vector(&bytes).expect("aligned blob"), vec![1.0, -2.5]);
    }

    #[test]
    fn decode_rejects_partial_values() {
        assert_eq!(
            decode_vector(&[0, 0, 0]),
            Err(VectorError::Misaligned { len: 3 })
        );
    }

    #[test]
    fn cosine_similarity_matches_geometry() {
        let same = cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]).unwrap().unwrap();
        assert!((same - 1.0).abs() < 1e-9);

        let orthogonal = cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap().unwrap();
        assert!(orthogonal.abs() < 1e-9);

        let opposite = cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]).unwrap().unwrap();
        assert!((opposite + 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_of_zero_vector_is_undefined() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Ok(None));
    }

    #[test]
    fn cosine_similarity_rejects_dimension_mismatch() {
        assert_eq!(
            cosine_similarity(&[1.0], &[1.0, 0.0]),
            Err(VectorError::DimensionMismatch { left: 1, right: 2 })
        );
    }

    #[test]
    fn registered_function_ranks_inside_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register_similarity_function(&conn).unwrap();

        let score: f64 = conn
            .query_row(
                "SELECT cosine_similarity(?1, ?2);",
                [encode_vector(&[1.0, 0.0]), encode_vector(&[1.0, 1.0])],
                |row| row.get(0),
            )
            .unwrap();
        assert!((score - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);

        let undefined: Option<f64> = conn
            .query_row(
                "SELECT cosine_similarity(NULL, ?1);",
                [encode_vector(&[1.0])],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(undefined, None);
    }

    #[test]
    fn registered_function_fails_statement_on_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        register_similarity_function(&conn).unwrap();

        let err = conn
            .query_row(
                "SELECT cosine_similarity(?1, ?2);",
                [encode_vector(&[1.0]), encode_vector(&[1.0, 0.0])],
                |row| row.get::<_, Option<f64>>(0),
            )
            .unwrap_err();
        assert!(err.to_string().contains("dimensions differ"));
    }
}
