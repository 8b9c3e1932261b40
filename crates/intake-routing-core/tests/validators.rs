// crates/intake-routing-core/tests/validators.rs
// ============================================================================
// Module: Validator Tests
// Description: Verifies identifier validation and fuzzy matching.
// ============================================================================
//! ## Overview
//! Covers the structural identifier validators, the IBAN mod-97 checksum,
//! and the normalized Levenshtein similarity with locale folding.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::runtime::validators::fold_for_match;
use intake_routing_core::runtime::validators::normalized_levenshtein;
use intake_routing_core::runtime::validators::validate_claim_number;
use intake_routing_core::runtime::validators::validate_customer_number;
use intake_routing_core::runtime::validators::validate_iban;
use intake_routing_core::runtime::validators::validate_policy_number;

#[test]
fn policy_numbers_validate_year_and_serial() {
    assert!(validate_policy_number("POL-2024-00012345"));
    assert!(!validate_policy_number("POL-1817-00012345"), "year out of range");
    assert!(!validate_policy_number("POL-2024-00000000"), "zero serial");
    assert!(!validate_policy_number("CLM-2024-00012345"), "wrong prefix");
}

#[test]
fn claim_numbers_validate_year_and_serial() {
    assert!(validate_claim_number("CLM-2023-00000042"));
    assert!(!validate_claim_number("CLM-2150-00000042"));
}

#[test]
fn customer_numbers_require_a_nonzero_serial() {
    assert!(validate_customer_number("CUS-00000017"));
    assert!(!validate_customer_number("CUS-00000000"));
    assert!(!validate_customer_number("POL-00000017"));
}

#[test]
fn iban_checksum_accepts_known_good_values() {
    assert!(validate_iban("DE89370400440532013000"));
    assert!(validate_iban("GB82WEST12345698765432"));
}

#[test]
fn iban_checksum_rejects_corrupted_values() {
    assert!(!validate_iban("DE89370400440532013001"), "flipped digit");
    assert!(!validate_iban("DE00000000000000000000"), "invalid checksum");
    assert!(!validate_iban("DE8937"), "too short");
}

#[test]
fn fold_normalizes_case_and_whitespace() {
    assert_eq!(fold_for_match("  Max   MUSTERMANN "), "max mustermann");
    assert_eq!(fold_for_match("Müller"), "müller");
}

#[test]
fn similarity_is_one_for_identical_folded_names() {
    let a = fold_for_match("Max Mustermann");
    let b = fold_for_match("MAX  Mustermann");
    assert!((normalized_levenshtein(&a, &b) - 1.0).abs() < 1e-9);
}

#[test]
fn similarity_decreases_with_edits() {
    let a = fold_for_match("Max Mustermann");
    let b = fold_for_match("Max Musterfrau");
    let similarity = normalized_levenshtein(&a, &b);
    assert!(similarity > 0.6 && similarity < 1.0);
}

#[test]
fn similarity_is_zero_against_empty() {
    assert!((normalized_levenshtein("abc", "") - 0.0).abs() < 1e-9);
}
