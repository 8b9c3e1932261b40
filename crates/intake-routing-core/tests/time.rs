// crates/intake-routing-core/tests/time.rs
// ============================================================================
// Module: Time Model Tests
// Description: Verifies the epoch-millisecond timestamp behavior.
// ============================================================================
//! ## Overview
//! Timestamps are caller-supplied epoch milliseconds with a transparent
//! wire form; ordering and elapsed-time helpers must be total and never
//! panic on reversed inputs.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::Timestamp;

#[test]
fn wire_form_is_a_plain_number() {
    let stamp = Timestamp::from_unix_millis(1_717_400_000_000);
    let wire = serde_json::to_string(&stamp).expect("serialize");
    assert_eq!(wire, "1717400000000");
    let parsed: Timestamp = serde_json::from_str(&wire).expect("parse");
    assert_eq!(parsed, stamp);
}

#[test]
fn ordering_follows_the_numeric_value() {
    let early = Timestamp::from_unix_millis(10);
    let late = Timestamp::from_unix_millis(20);
    assert!(early < late);
    assert_eq!(early.later_of(late), late);
    assert_eq!(late.later_of(early), late);
}

#[test]
fn elapsed_time_is_zero_for_reversed_inputs() {
    let early = Timestamp::from_unix_millis(10);
    let late = Timestamp::from_unix_millis(250);
    assert_eq!(late.millis_since(early), 240);
    assert_eq!(early.millis_since(late), 0);
    assert_eq!(early.millis_since(early), 0);
}

#[test]
fn the_epoch_is_the_neutral_lower_bound() {
    let stamp = Timestamp::from_unix_millis(42);
    assert_eq!(Timestamp::UNIX_EPOCH.as_unix_millis(), 0);
    assert_eq!(stamp.later_of(Timestamp::UNIX_EPOCH), stamp);
}
