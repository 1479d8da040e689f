//! Return-callback signature verification
//!
//! The processor signs its callback over every parameter except the
//! signature fields themselves. Verification is a pure function over
//! the raw parameter map; nothing is mutated in place.

use std::collections::HashMap;

use super::signer;

/// Field carrying the signature on the callback
pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
/// Field naming the hash algorithm; excluded from the signature input
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

/// Fields stripped from the parameter set before recomputing
const EXCLUDED_FIELDS: [&str; 2] = [SECURE_HASH_FIELD, SECURE_HASH_TYPE_FIELD];

/// Recompute the signature over `params` minus the signature fields
/// and compare it against the supplied one. Comparison is
/// constant-time to avoid leaking how many leading characters match.
pub fn verify_return(params: &HashMap<String, String>, secret: &[u8]) -> bool {
    let Some(provided) = params.get(SECURE_HASH_FIELD) else {
        return false;
    };

    let expected = signer::sign(
        params
            .iter()
            .filter(|(k, _)| !EXCLUDED_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str())),
        secret,
    );

    // Some processor environments send the hex digest uppercased
    constant_time_eq(expected.as_bytes(), provided.to_ascii_lowercase().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
