// crates/intake-routing-core/src/core/evidence.rs
// ============================================================================
// Module: Evidence Spans
// Description: Verifiable evidence spans over canonical message text.
// Purpose: Tie every asserted label to a verbatim, hash-checked text span.
// Dependencies: crate::core::{canonical, hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! Evidence spans reference canonical subject, body, or attachment text by
//! offset and carry the snippet plus its hash. Verification re-reads the
//! canonical text at the stated offsets and compares both the verbatim
//! substring and the snippet hash; either mismatch rejects the span.
//! Redacted evidence is the audit-safe projection (snippet capped at the
//! redaction byte budget, full offsets preserved).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::canonical::snippet_sha256;
use crate::core::canonical::truncate_snippet;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::AttachmentId;

// ============================================================================
// SECTION: Evidence Sources
// ============================================================================

/// Text source an evidence span points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceSource {
    /// Canonical subject text.
    #[serde(rename = "SUBJECT")]
    Subject,
    /// Canonical body text.
    #[serde(rename = "BODY")]
    Body,
    /// Canonical extracted attachment text.
    #[serde(rename = "ATTACHMENT_TEXT")]
    AttachmentText,
}

// ============================================================================
// SECTION: Evidence Spans
// ============================================================================

/// Verifiable evidence span over canonical text.
///
/// # Invariants
/// - `snippet` equals the canonical text slice `[start, end)`.
/// - `snippet_sha256` is the digest of the snippet's UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    /// Source text the offsets refer to.
    pub source: EvidenceSource,
    /// Attachment identifier when the source is attachment text.
    pub attachment_id: Option<AttachmentId>,
    /// Byte offset of the span start in the canonical text.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
    /// Verbatim snippet.
    pub snippet: String,
    /// Digest of the snippet bytes.
    pub snippet_sha256: HashDigest,
}

impl EvidenceSpan {
    /// Builds a span over canonical text, computing the snippet hash.
    ///
    /// Returns `None` when the offsets do not land on char boundaries inside
    /// the text.
    #[must_use]
    pub fn over(
        source: EvidenceSource,
        attachment_id: Option<AttachmentId>,
        text: &str,
        start: usize,
        end: usize,
    ) -> Option<Self> {
        let snippet = text.get(start .. end)?;
        Some(Self {
            source,
            attachment_id,
            start,
            end,
            snippet: snippet.to_string(),
            snippet_sha256: snippet_sha256(snippet),
        })
    }

    /// Verifies the span against the canonical text it claims to reference.
    ///
    /// The snippet must be the verbatim substring at the stated offsets and
    /// the stored hash must match a recomputed digest.
    #[must_use]
    pub fn verify(&self, canonical_text: &str) -> bool {
        let Some(slice) = canonical_text.get(self.start .. self.end) else {
            return false;
        };
        slice == self.snippet && snippet_sha256(slice) == self.snippet_sha256
    }

    /// Projects the span into its audit-safe redacted form.
    #[must_use]
    pub fn redacted(&self) -> RedactedEvidence {
        let snippet = truncate_snippet(&self.snippet).to_string();
        RedactedEvidence {
            source: self.source,
            attachment_id: self.attachment_id.clone(),
            start: self.start,
            end: self.end,
            snippet,
            snippet_sha256: self.snippet_sha256.clone(),
        }
    }
}

// ============================================================================
// SECTION: Redacted Evidence
// ============================================================================

/// Audit-safe evidence projection.
///
/// # Invariants
/// - `snippet` is capped at the redaction byte budget.
/// - `snippet_sha256` is the digest of the ORIGINAL full snippet, so the
///   full span remains provable without storing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedEvidence {
    /// Source text the offsets refer to.
    pub source: EvidenceSource,
    /// Attachment identifier when the source is attachment text.
    pub attachment_id: Option<AttachmentId>,
    /// Byte offset of the span start.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
    /// Truncated snippet.
    pub snippet: String,
    /// Digest of the original snippet bytes.
    pub snippet_sha256: HashDigest,
}
