// crates/intake-routing-core/src/core/message.rs
// ============================================================================
// Module: Message and Attachment Model
// Description: Raw MIME references, attachments, and normalized messages.
// Purpose: Define the immutable per-message artifacts produced at ingest and
// normalization.
// Dependencies: crate::core::{artifact, hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The ingest adapter yields raw MIME bytes plus a parsed email view; the
//! Normalize stage turns that view into an immutable [`NormalizedMessage`]
//! with canonical text and a content fingerprint. Attachments are stamped
//! with their AV status before any downstream component may read their text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::artifact::ArtifactRef;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::AttachmentId;
use crate::core::identifiers::MessageId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Raw MIME
// ============================================================================

/// Reference to the immutable raw MIME artifact written at ingest.
///
/// # Invariants
/// - Written once at ingest; never mutated; retention by policy only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMimeRef {
    /// Content hash of the raw MIME bytes.
    pub sha256: HashDigest,
    /// Ingestion source identifier (mailbox, connector).
    pub source_id: String,
    /// Source-assigned message identifier.
    pub source_message_id: String,
    /// Store URI for the raw bytes.
    pub uri: String,
}

// ============================================================================
// SECTION: Attachments
// ============================================================================

/// Antivirus verdict stamped on every attachment before downstream use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvStatus {
    /// Scanner found nothing.
    #[serde(rename = "CLEAN")]
    Clean,
    /// Scanner identified malware.
    #[serde(rename = "INFECTED")]
    Infected,
    /// Scanner flagged the file as suspicious.
    #[serde(rename = "SUSPICIOUS")]
    Suspicious,
    /// Scan did not complete.
    #[serde(rename = "FAILED")]
    Failed,
}

impl AvStatus {
    /// Returns true when downstream components may read the attachment text.
    ///
    /// A failed scan is uncertainty and the pipeline is fail-closed, so only
    /// `CLEAN` grants access.
    #[must_use]
    pub const fn text_usable(self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns true when the status blocks case creation.
    #[must_use]
    pub const fn blocks_case(self) -> bool {
        matches!(self, Self::Infected | Self::Suspicious | Self::Failed)
    }
}

/// Attachment metadata arriving with the parsed email, prior to AV stamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingAttachment {
    /// Attachment identifier scoped to the message.
    pub attachment_id: AttachmentId,
    /// Content hash of the attachment bytes in the attachment store.
    pub sha256: HashDigest,
    /// Original filename.
    pub filename: String,
    /// Declared MIME content type.
    pub content_type: String,
}

/// Immutable attachment record produced by the Attachments stage.
///
/// # Invariants
/// - `av_status` is stamped before any downstream stage reads the text.
/// - Written once per attachment per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Attachment identifier scoped to the message.
    pub attachment_id: AttachmentId,
    /// Content hash of the attachment bytes.
    pub sha256: HashDigest,
    /// Original filename.
    pub filename: String,
    /// Declared MIME content type.
    pub content_type: String,
    /// Antivirus verdict.
    pub av_status: AvStatus,
    /// Scanner version that produced the verdict.
    pub scanner_version: String,
    /// Extracted text artifact, present only for usable attachments.
    pub extracted_text_ref: Option<ArtifactRef>,
    /// OCR confidence for the extracted text, when OCR was applied.
    pub ocr_confidence: Option<f64>,
}

// ============================================================================
// SECTION: Parsed Email Input
// ============================================================================

/// Thread linkage keys taken from message headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadKeys {
    /// RFC 5322 Message-ID header value.
    pub message_id_header: Option<String>,
    /// In-Reply-To header value.
    pub in_reply_to: Option<String>,
    /// Provider conversation identifier, when available.
    pub conversation_id: Option<String>,
}

/// Parsed email view produced by the ingestion adapter.
///
/// Raw MIME parsing belongs to the adapter; the core consumes this typed
/// view together with the [`RawMimeRef`] it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    /// Subject line as received.
    pub subject: String,
    /// Plain-text body as received.
    pub body_text: String,
    /// Sender address.
    pub from: String,
    /// Sender display name, when present.
    pub from_display_name: Option<String>,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Carbon-copy addresses.
    pub cc: Vec<String>,
    /// Thread linkage keys.
    pub thread: ThreadKeys,
}

/// Complete ingest record handed to the pipeline for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestMessage {
    /// Message identifier assigned at ingest.
    pub message_id: MessageId,
    /// Reference to the immutable raw MIME artifact.
    pub raw_mime: RawMimeRef,
    /// Parsed email view.
    pub email: ParsedEmail,
    /// Attachments accompanying the message.
    pub attachments: Vec<IncomingAttachment>,
    /// Ingestion source label.
    pub ingestion_source: String,
    /// Ingest timestamp supplied by the adapter.
    pub ingested_at: Timestamp,
}

// ============================================================================
// SECTION: Normalized Message
// ============================================================================

/// Immutable normalized message artifact.
///
/// # Invariants
/// - One per message; immutable after normalization.
/// - `message_fingerprint` covers canonical subject, canonical body, and the
///   sorted attachment hash list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizedMessage {
    /// Message identifier.
    pub message_id: MessageId,
    /// Canonical subject (NFC, prefix-stripped, whitespace-collapsed).
    pub subject_c14n: String,
    /// Canonical body (NFC, quoted replies stripped, whitespace-collapsed).
    pub body_c14n: String,
    /// Thread linkage keys.
    pub thread: ThreadKeys,
    /// Sender address.
    pub sender: String,
    /// Sender display name, when present.
    pub sender_display_name: Option<String>,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Attachment identifiers in canonical order.
    pub attachment_ids: Vec<AttachmentId>,
    /// Ingestion source label.
    pub ingestion_source: String,
    /// Ingest timestamp.
    pub ingested_at: Timestamp,
    /// Content fingerprint binding subject, body, and attachments.
    pub message_fingerprint: HashDigest,
}
