//! Canonical parameter encoding and request signing
//!
//! The processor signs requests over a canonical query string: every
//! key and value percent-encoded, pairs sorted by encoded key, joined
//! as `key=value` with `&`, with encoded spaces rendered as `+`. The
//! signature is HMAC-SHA512 over the UTF-8 bytes of that string,
//! lowercase hex. Both directions (outgoing requests and inbound
//! callbacks) go through the same functions, so everything here is
//! pure and testable against known vectors.

use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Everything except unreserved characters gets percent-encoded.
const WIRE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one key for the canonical string.
fn encode_key(raw: &str) -> String {
    utf8_percent_encode(raw, WIRE_ENCODE_SET).to_string()
}

/// Percent-encode one value. The processor renders encoded spaces in
/// values as `+`, not `%20`; signature compatibility depends on
/// matching that exactly. Keys are left alone.
fn encode_value(raw: &str) -> String {
    encode_key(raw).replace("%20", "+")
}

/// Build the canonical query string: encoded pairs sorted by encoded
/// key, joined with `&`, no leading `?`. Insertion order of the input
/// is irrelevant.
pub fn canonical_query<K, V>(params: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (encode_key(k.as_ref()), encode_value(v.as_ref())))
        .collect();
    pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut out = String::new();
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

/// HMAC-SHA512 over arbitrary bytes, rendered as lowercase hex.
pub fn hmac_sha512_hex(data: &[u8], secret: &[u8]) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Sign a parameter set: canonicalize, then HMAC-SHA512 with the
/// shared secret.
pub fn sign<K, V>(params: impl IntoIterator<Item = (K, V)>, secret: &[u8]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    hmac_sha512_hex(canonical_query(params).as_bytes(), secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_canonical_query_sorts_and_encodes() {
        let params = [
            ("vnp_TxnRef", "ORDER-1"),
            ("vnp_Amount", "1000"),
            ("vnp_OrderInfo", "Course payment"),
        ];
        assert_eq!(
            canonical_query(params),
            "vnp_Amount=1000&vnp_OrderInfo=Course+payment&vnp_TxnRef=ORDER-1"
        );
    }

    #[test]
    fn test_space_becomes_plus_and_reserved_chars_escape() {
        assert_eq!(canonical_query([("a", "b c/d")]), "a=b+c%2Fd");
    }

    #[test]
    fn test_plus_quirk_applies_to_values_only() {
        // A space in a key stays %20; only value spaces become `+`
        assert_eq!(canonical_query([("a b", "c d")]), "a%20b=c+d");
    }

    #[test]
    fn test_sign_known_vector() {
        let params = [
            ("vnp_Amount", "1000"),
            ("vnp_TxnRef", "ORDER-1"),
            ("vnp_OrderInfo", "Course payment"),
        ];
        assert_eq!(
            sign(params, b"testsecret"),
            "ef8055b5834654f952c550e8ba96109f161976954dd3d4edc6a1d79dd7ec9184\
             e38529f7a4bc1fd494b1486a928aeb6dd1e342e1bbc453da0c2e3562e3c457fd"
        );
    }

    #[test]
    fn test_sign_single_pair_known_vector() {
        assert_eq!(
            sign([("a", "b c/d")], b"k"),
            "257f22838a007c3f0a78b32a6f4380b3483ec066b25454e2f0cc8d00019b3af6\
             a38ea984212fa38e2dc68bc5a104f2d0b84be9abc07f495a2002a07afb967855"
        );
    }

    #[test]
    fn test_sign_is_insertion_order_invariant() {
        let mut forward = HashMap::new();
        forward.insert("z", "1");
        forward.insert("a", "2");
        forward.insert("m", "3");
        let mut reverse = HashMap::new();
        reverse.insert("m", "3");
        reverse.insert("a", "2");
        reverse.insert("z", "1");
        assert_eq!(sign(&forward, b"s"), sign(&reverse, b"s"));
    }

    #[test]
    fn test_mutating_a_value_changes_the_signature() {
        let original = sign([("a", "1"), ("b", "2")], b"s");
        let mutated = sign([("a", "1"), ("b", "3")], b"s");
        assert_ne!(original, mutated);
    }

    #[test]
    fn test_mutating_a_key_changes_the_signature() {
        let original = sign([("a", "1")], b"s");
        let mutated = sign([("b", "1")], b"s");
        assert_ne!(original, mutated);
    }
}
