// crates/intake-routing-core/tests/hashing.rs
// ============================================================================
// Module: Content Hashing Tests
// Description: Verifies SHA-256 digests over canonical JSON and raw bytes.
// ============================================================================
//! ## Overview
//! Ensures digests are deterministic across key ordering and numeric
//! normalization, reject non-finite floats and malformed wire values, and
//! enforce the bounded-size variant.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use intake_routing_core::HashDigest;
use intake_routing_core::HashError;
use intake_routing_core::canonical_json_bytes;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

#[test]
fn digest_is_order_independent_for_maps() {
    let mut map_a = Map::new();
    map_a.insert("b".to_string(), json!(2));
    map_a.insert("a".to_string(), json!(1));

    let mut map_b = Map::new();
    map_b.insert("a".to_string(), json!(1));
    map_b.insert("b".to_string(), json!(2));

    let hash_a = HashDigest::of_canonical_json(&Value::Object(map_a)).expect("hash a");
    let hash_b = HashDigest::of_canonical_json(&Value::Object(map_b)).expect("hash b");

    assert_eq!(hash_a, hash_b);
}

#[test]
fn digest_normalizes_numeric_representation() {
    let hash_a = HashDigest::of_canonical_json(&json!(1.0)).expect("hash a");
    let hash_b = HashDigest::of_canonical_json(&json!(1)).expect("hash b");
    assert_eq!(hash_a, hash_b);
}

#[derive(Serialize)]
struct FloatWrapper {
    value: f64,
}

#[test]
fn digest_rejects_non_finite_floats() {
    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let err = HashDigest::of_canonical_json(&FloatWrapper {
            value,
        })
        .unwrap_err();
        assert!(matches!(err, HashError::Canonicalization(_)));
    }
}

#[test]
fn bounded_digest_respects_the_limit() {
    let payload = BTreeMap::from([("data", "x".repeat(64))]);
    let err = HashDigest::of_canonical_json_bounded(&payload, 16).unwrap_err();
    assert!(matches!(err, HashError::SizeLimitExceeded { .. }));
}

#[test]
fn bounded_digest_passes_at_the_exact_boundary() {
    let payload = BTreeMap::from([("d", "x".to_string())]);
    let bytes = canonical_json_bytes(&payload).expect("canonical bytes");
    let result = HashDigest::of_canonical_json_bounded(&payload, bytes.len());
    assert!(result.is_ok(), "exact boundary should succeed");
}

#[test]
fn golden_digest_empty_object() {
    // SHA-256 of "{}".
    let digest = HashDigest::of_canonical_json(&json!({})).expect("hash");
    assert_eq!(
        digest.as_hex(),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn golden_digest_raw_bytes() {
    // SHA-256 of "test".
    let digest = HashDigest::of_bytes(b"test");
    assert_eq!(
        digest.as_hex(),
        "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    );
}

#[test]
fn golden_digest_empty_bytes() {
    let digest = HashDigest::of_bytes(b"");
    assert_eq!(
        digest.as_hex(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn digest_hex_is_lowercase_and_sized() {
    let digest = HashDigest::of_bytes(b"anything");
    assert_eq!(digest.as_hex().len(), 64);
    assert!(!digest.as_hex().chars().any(char::is_uppercase));
}

#[test]
fn wire_parsing_accepts_well_formed_digests() {
    let digest = HashDigest::of_bytes(b"round-trip");
    let parsed = HashDigest::from_hex(digest.as_hex().to_string()).expect("parse");
    assert_eq!(parsed, digest);
}

#[test]
fn wire_parsing_rejects_malformed_digests() {
    for bad in ["", "abc", &"f".repeat(63), &"F".repeat(64), &"zz".repeat(32)] {
        let err = HashDigest::from_hex(bad.to_string()).unwrap_err();
        assert!(matches!(err, HashError::MalformedDigest(_)), "accepted {bad:?}");
    }
}

#[test]
fn deserialization_validates_the_wire_form() {
    let good = format!("\"{}\"", "a".repeat(64));
    assert!(serde_json::from_str::<HashDigest>(&good).is_ok());
    assert!(serde_json::from_str::<HashDigest>("\"not-a-digest\"").is_err());
    assert!(serde_json::from_str::<HashDigest>(&format!("\"{}\"", "A".repeat(64))).is_err());
}

#[test]
fn digest_is_stable_across_calls() {
    let value = json!({"a": 1, "b": [1, 2, 3], "c": {"nested": true}});
    let first = HashDigest::of_canonical_json(&value).expect("first");
    let second = HashDigest::of_canonical_json(&value).expect("second");
    assert_eq!(first, second);
}
