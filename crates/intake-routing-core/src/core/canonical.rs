// crates/intake-routing-core/src/core/canonical.rs
// ============================================================================
// Module: Text and Artifact Canonicalization
// Description: Deterministic text, attachment, and snippet canonicalization.
// Purpose: Bind every hash in the pipeline to one shared canonical form.
// Dependencies: crate::core::hashing, regex, unicode-normalization
// ============================================================================

//! ## Overview
//! Canonicalization is the shared primitive behind determinism. Subject and
//! body text are normalized to Unicode NFC, quoted replies are stripped by
//! deterministic boundary rules, and whitespace is collapsed. The canonical
//! (case-preserved) form is what evidence spans verify against; lowercasing
//! is applied for fingerprinting only. Attachment lists order by
//! `(sha256, filename)` so the fingerprint is independent of MIME part order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum snippet length in bytes for redacted audit evidence.
pub const MAX_SNIPPET_BYTES: usize = 200;

/// Reply-boundary markers. A line matching any of these starts quoted
/// history; the line and everything after it is stripped.
static REPLY_BOUNDARIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^-{2,}\s*Original Message\s*-{2,}",
        r"^-{2,}\s*Ursprüngliche Nachricht\s*-{2,}",
        r"^On .{1,200} wrote:\s*$",
        r"^Am .{1,200} schrieb .{1,200}:\s*$",
        r"^Von: .{1,200}$",
        r"^From: .{1,200}$",
        r"^_{10,}\s*$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Subject prefixes stripped during canonicalization. `None` only if the
/// literal pattern fails to compile, in which case prefixes are preserved.
static SUBJECT_PREFIXES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(re|fwd?|aw|wg|sv|antw)\s*:\s*").ok());

// ============================================================================
// SECTION: Text Canonicalization
// ============================================================================

/// Canonicalizes a message body.
///
/// Applies, in order: Unicode NFC, line-ending normalization, quoted-reply
/// stripping, per-line whitespace collapsing, and trailing-blank removal.
/// The result preserves case and is the reference text for evidence offsets.
#[must_use]
pub fn canonicalize_body(raw: &str) -> String {
    let normalized: String = raw.nfc().collect();
    let unified = normalized.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = Vec::new();
    for line in unified.lines() {
        if is_reply_boundary(line) {
            break;
        }
        if line.trim_start().starts_with('>') {
            continue;
        }
        lines.push(collapse_whitespace(line));
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Canonicalizes a subject line.
///
/// Strips reply/forward prefixes repeatedly, normalizes to NFC, and
/// collapses whitespace. Case is preserved.
#[must_use]
pub fn canonicalize_subject(raw: &str) -> String {
    let normalized: String = raw.nfc().collect();
    let mut subject = collapse_whitespace(&normalized);
    if let Some(prefixes) = SUBJECT_PREFIXES.as_ref() {
        loop {
            let stripped = prefixes.replace(&subject, "").into_owned();
            if stripped == subject {
                break;
            }
            subject = stripped;
        }
    }
    subject.trim().to_string()
}

/// Returns the lowercase fingerprint form of canonical text.
///
/// Lowercasing applies to fingerprinting only; evidence always verifies
/// against the case-preserved canonical form.
#[must_use]
pub fn fingerprint_form(canonical: &str) -> String {
    canonical.to_lowercase()
}

/// Returns true when a line marks the start of quoted reply history.
fn is_reply_boundary(line: &str) -> bool {
    REPLY_BOUNDARIES.iter().any(|boundary| boundary.is_match(line))
}

/// Collapses runs of spaces and tabs into single spaces and trims the line.
fn collapse_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_gap = false;
    for ch in line.trim().chars() {
        if ch == ' ' || ch == '\t' {
            if !in_gap {
                out.push(' ');
            }
            in_gap = true;
        } else {
            in_gap = false;
            out.push(ch);
        }
    }
    out
}

// ============================================================================
// SECTION: Fingerprinting
// ============================================================================

/// Canonical fingerprint input.
#[derive(Debug, Serialize)]
struct FingerprintInput<'a> {
    /// Lowercased canonical subject.
    subject: &'a str,
    /// Lowercased canonical body.
    body: &'a str,
    /// Sorted attachment content hashes.
    attachments: &'a [String],
}

/// Computes the message fingerprint over canonical subject, body, and the
/// sorted attachment hash list.
///
/// # Errors
///
/// Returns [`HashError`] when canonical serialization fails.
pub fn message_fingerprint(
    subject_c14n: &str,
    body_c14n: &str,
    attachment_sha256s: &[HashDigest],
) -> Result<HashDigest, HashError> {
    let mut attachments: Vec<String> =
        attachment_sha256s.iter().map(|digest| digest.as_hex().to_string()).collect();
    attachments.sort_unstable();
    let subject = fingerprint_form(subject_c14n);
    let body = fingerprint_form(body_c14n);
    let input = FingerprintInput {
        subject: &subject,
        body: &body,
        attachments: &attachments,
    };
    HashDigest::of_canonical_json(&input)
}

// ============================================================================
// SECTION: Snippets
// ============================================================================

/// Hashes an evidence snippet over its UTF-8 bytes.
#[must_use]
pub fn snippet_sha256(snippet: &str) -> HashDigest {
    HashDigest::of_bytes(snippet.as_bytes())
}

/// Truncates a snippet to the redaction byte budget on a char boundary.
#[must_use]
pub fn truncate_snippet(snippet: &str) -> &str {
    if snippet.len() <= MAX_SNIPPET_BYTES {
        return snippet;
    }
    let mut end = MAX_SNIPPET_BYTES;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }
    &snippet[.. end]
}

// ============================================================================
// SECTION: Attachment Ordering
// ============================================================================

/// Sorts attachment `(sha256, filename)` pairs into canonical order.
pub fn order_attachments<T, F>(attachments: &mut [T], key: F)
where
    F: Fn(&T) -> (String, String),
{
    attachments.sort_by(|a, b| key(a).cmp(&key(b)));
}
