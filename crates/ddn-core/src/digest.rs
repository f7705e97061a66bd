//! Content digests over canonical raw-value serializations.
//!
//! Probe outputs are compared across hosts by digest before the raw values
//! themselves are diffed. The canonical serialization is the compact JSON
//! array of the ordered raw integers (`[v0,v1,...]`) so that every host
//! hashes byte-identical input.

use std::fmt::Write;

/// Renders the canonical serialization of an ordered raw-value sequence.
#[must_use]
pub fn canonical_raw_serialization(values: &[i64]) -> String {
    let mut out = String::with_capacity(2 + values.len() * 12);
    out.push('[');
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value}");
    }
    out.push(']');
    out
}

/// Blake3 digest of the canonical serialization, as lowercase hex.
#[must_use]
pub fn digest_raw_values(values: &[i64]) -> String {
    let canonical = canonical_raw_serialization(values);
    hex::encode(blake3::hash(canonical.as_bytes()).as_bytes())
}
