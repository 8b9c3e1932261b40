// crates/intake-routing-core/tests/canonical.rs
// ============================================================================
// Module: Canonicalization Tests
// Description: Verifies text canonicalization and fingerprint behavior.
// ============================================================================
//! ## Overview
//! Covers quoted-reply stripping, subject prefix removal, whitespace
//! collapsing, fingerprint order-independence, and snippet truncation.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::MAX_SNIPPET_BYTES;
use intake_routing_core::HashDigest;
use intake_routing_core::canonicalize_body;
use intake_routing_core::canonicalize_subject;
use intake_routing_core::message_fingerprint;
use intake_routing_core::snippet_sha256;
use intake_routing_core::truncate_snippet;

#[test]
fn subject_strips_reply_prefixes_repeatedly() {
    assert_eq!(canonicalize_subject("Re: AW: Fwd:  Schadenmeldung"), "Schadenmeldung");
    assert_eq!(canonicalize_subject("WG: re:   Unfall gestern A2"), "Unfall gestern A2");
}

#[test]
fn subject_collapses_whitespace_and_preserves_case() {
    assert_eq!(canonicalize_subject("  Unfall \t gestern   A2 "), "Unfall gestern A2");
}

#[test]
fn body_strips_quoted_reply_history() {
    let body = "Hallo,\nmein Auto wurde beschädigt.\n\nOn Mon, 3 Jun 2024 wrote:\n> alte Nachricht\n> noch mehr";
    let canonical = canonicalize_body(body);
    assert!(canonical.contains("mein Auto wurde beschädigt."));
    assert!(!canonical.contains("alte Nachricht"));
}

#[test]
fn body_drops_quote_prefixed_lines() {
    let body = "Neue Zeile\n> zitiert\nNoch eine Zeile";
    let canonical = canonicalize_body(body);
    assert_eq!(canonical, "Neue Zeile\nNoch eine Zeile");
}

#[test]
fn body_strips_german_boundary_marker() {
    let body = "Antwort oben\n-- Ursprüngliche Nachricht --\nalter Text";
    let canonical = canonicalize_body(body);
    assert_eq!(canonical, "Antwort oben");
}

#[test]
fn body_normalizes_line_endings_and_trailing_blanks() {
    let canonical = canonicalize_body("eins\r\nzwei\r\n\r\n\r\n");
    assert_eq!(canonical, "eins\nzwei");
}

#[test]
fn fingerprint_is_independent_of_attachment_order() {
    let a = HashDigest::of_bytes(b"attachment-a");
    let b = HashDigest::of_bytes(b"attachment-b");

    let forward =
        message_fingerprint("Subject", "Body", &[a.clone(), b.clone()]).expect("forward");
    let reversed = message_fingerprint("Subject", "Body", &[b, a]).expect("reversed");
    assert_eq!(forward, reversed);
}

#[test]
fn fingerprint_lowercases_but_canonical_text_does_not() {
    let upper = message_fingerprint("SCHADEN", "MELDUNG", &[]).expect("upper");
    let lower = message_fingerprint("schaden", "meldung", &[]).expect("lower");
    assert_eq!(upper, lower, "fingerprinting folds case");
    assert_eq!(canonicalize_subject("SCHADEN"), "SCHADEN", "canonical text preserves case");
}

#[test]
fn fingerprint_changes_with_content() {
    let base = message_fingerprint("Subject", "Body", &[]).expect("base");
    let other = message_fingerprint("Subject", "Body!", &[]).expect("other");
    assert_ne!(base, other);
}

#[test]
fn snippet_hash_covers_utf8_bytes() {
    let digest = snippet_sha256("Unfall");
    assert_eq!(digest, HashDigest::of_bytes("Unfall".as_bytes()));
}

#[test]
fn snippet_truncation_respects_char_boundaries() {
    let snippet = "ä".repeat(150);
    let truncated = truncate_snippet(&snippet);
    assert!(truncated.len() <= MAX_SNIPPET_BYTES);
    assert!(truncated.chars().all(|ch| ch == 'ä'));
}

#[test]
fn short_snippets_pass_through_untruncated() {
    assert_eq!(truncate_snippet("kurz"), "kurz");
}
