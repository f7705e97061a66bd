//! The canonical determinism vector.
//!
//! Every compliant engine build ships a fixed "determinism example": a
//! short computation over the Q32.32 contract whose raw results it reports
//! alongside a content digest. [`reference_raw_values`] is that computation
//! expressed here, so the probe can cross-check what an engine claims
//! against an independent rendition of the same arithmetic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::digest_raw_values;
use crate::fixed::Fixed64;

/// Schema identifier for the nested determinism vector.
pub const DETERMINISM_VECTOR_SCHEMA: &str = "ddn.fixed64.determinism_vector.v1";

/// The status an engine reports when its vector run succeeded.
pub const VECTOR_STATUS_PASS: &str = "pass";

/// A single host's execution of the canonical computation, as declared by
/// the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeterminismVector {
    /// Must equal [`DETERMINISM_VECTOR_SCHEMA`].
    pub schema: String,
    /// `"pass"` when the engine's own comparison succeeded.
    pub status: String,
    /// Hex blake3 digest of the canonical serialization of `raw_i64`.
    pub content_digest: String,
    /// Ordered raw results of the canonical computation.
    pub raw_i64: Vec<i64>,
    /// The values the engine expected to produce.
    pub expected_raw_i64: Vec<i64>,
}

/// Structural problems with a declared vector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VectorError {
    /// The schema tag did not match [`DETERMINISM_VECTOR_SCHEMA`].
    #[error("unknown determinism vector schema: expected {expected}, found {found:?}")]
    SchemaMismatch {
        /// The schema this crate understands.
        expected: &'static str,
        /// The schema the vector carried.
        found: String,
    },

    /// The vector carried no content digest.
    #[error("determinism vector is missing a content digest")]
    MissingDigest,

    /// The vector carried no raw values.
    #[error("determinism vector carries no raw values")]
    MissingRawValues,
}

impl DeterminismVector {
    /// Builds a passing vector for the reference computation. Useful for
    /// fixtures and for engines that delegate the computation to this
    /// crate.
    #[must_use]
    pub fn reference() -> Self {
        let raw = reference_raw_values();
        Self {
            schema: DETERMINISM_VECTOR_SCHEMA.to_string(),
            status: VECTOR_STATUS_PASS.to_string(),
            content_digest: digest_raw_values(&raw),
            raw_i64: raw.clone(),
            expected_raw_i64: raw,
        }
    }

    /// Checks the structural invariants the matrix checker relies on:
    /// schema tag, digest presence, raw-value presence.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.schema != DETERMINISM_VECTOR_SCHEMA {
            return Err(VectorError::SchemaMismatch {
                expected: DETERMINISM_VECTOR_SCHEMA,
                found: self.schema.clone(),
            });
        }
        if self.content_digest.is_empty() {
            return Err(VectorError::MissingDigest);
        }
        if self.raw_i64.is_empty() {
            return Err(VectorError::MissingRawValues);
        }
        Ok(())
    }
}

/// The canonical computation: exercises add, sub, mul, and abs, both
/// saturation rails, and a fractional multiply.
#[must_use]
pub fn reference_raw_values() -> Vec<i64> {
    let seven = Fixed64::from_int(7);
    let sum = seven.add(Fixed64::from_int(5));
    let deficit = sum.sub(Fixed64::from_int(20));
    let scaled = deficit.mul(Fixed64::from_int(3));
    let magnitude = scaled.abs();
    let half = Fixed64::from_raw(1 << 31);
    let quarter = half.mul(half);
    let ceiling = Fixed64::MAX.add(Fixed64::ONE);
    let floor = Fixed64::MIN.mul(Fixed64::from_int(2));
    let halved_max = Fixed64::MAX.mul(half);
    vec![
        seven.raw(),
        sum.raw(),
        deficit.raw(),
        scaled.raw(),
        magnitude.raw(),
        quarter.raw(),
        ceiling.raw(),
        floor.raw(),
        halved_max.raw(),
    ]
}
