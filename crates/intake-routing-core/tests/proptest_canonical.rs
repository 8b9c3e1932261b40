// crates/intake-routing-core/tests/proptest_canonical.rs
// ============================================================================
// Module: Canonicalization Property Tests
// Description: Property-based checks for canonical JSON round-tripping.
// ============================================================================
//! ## Overview
//! Canonical JSON must be a fixed point: parsing canonical bytes and
//! re-canonicalizing yields the same bytes, and hashing is stable across
//! the round trip.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::canonical_json_bytes;
use intake_routing_core::HashDigest;
use proptest::prelude::*;
use serde_json::Value;

/// Strategy producing arbitrary JSON values of bounded depth.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 äöüß]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0 .. 8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,12}", inner, 0 .. 8).prop_map(|map| {
                Value::Object(map.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn canonical_json_is_a_fixed_point(value in arb_json()) {
        let canonical = canonical_json_bytes(&value).expect("canonicalize");
        let reparsed: Value = serde_json::from_slice(&canonical).expect("parse");
        let recanonical = canonical_json_bytes(&reparsed).expect("recanonicalize");
        prop_assert_eq!(canonical, recanonical);
    }

    #[test]
    fn hashing_is_stable_across_the_round_trip(value in arb_json()) {
        let direct = HashDigest::of_canonical_json(&value).expect("direct");
        let canonical = canonical_json_bytes(&value).expect("canonicalize");
        let reparsed: Value = serde_json::from_slice(&canonical).expect("parse");
        let round_trip = HashDigest::of_canonical_json(&reparsed).expect("round trip");
        prop_assert_eq!(direct, round_trip);
    }
}
