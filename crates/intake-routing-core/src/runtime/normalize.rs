// crates/intake-routing-core/src/runtime/normalize.rs
// ============================================================================
// Module: Normalize Stage
// Description: Canonical message normalization and fingerprinting.
// Purpose: Produce the immutable normalized message every later stage reads.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Normalization canonicalizes subject and body, orders attachments by
//! `(sha256, filename)`, and computes the content fingerprint. The stage is
//! pure: it performs no I/O and depends only on the ingest record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::HashDigest;
use crate::core::IngestMessage;
use crate::core::NormalizedMessage;
use crate::core::Stage;
use crate::core::StageError;
use crate::core::canonicalize_body;
use crate::core::canonicalize_subject;
use crate::core::message_fingerprint;
use crate::core::order_attachments;

// ============================================================================
// SECTION: Stage Execution
// ============================================================================

/// Runs the Normalize stage.
///
/// # Errors
///
/// Returns [`StageError`] when fingerprint hashing fails.
pub fn run(message: &IngestMessage) -> Result<NormalizedMessage, StageError> {
    let subject_c14n = canonicalize_subject(&message.email.subject);
    let body_c14n = canonicalize_body(&message.email.body_text);

    let mut ordered = message.attachments.clone();
    order_attachments(&mut ordered, |attachment| {
        (attachment.sha256.as_hex().to_string(), attachment.filename.clone())
    });
    let attachment_ids = ordered.iter().map(|attachment| attachment.attachment_id.clone()).collect();
    let attachment_hashes: Vec<HashDigest> =
        ordered.iter().map(|attachment| attachment.sha256.clone()).collect();

    let fingerprint = message_fingerprint(&subject_c14n, &body_c14n, &attachment_hashes)
        .map_err(|err| StageError::internal(Stage::Normalize, err.to_string()))?;

    Ok(NormalizedMessage {
        message_id: message.message_id.clone(),
        subject_c14n,
        body_c14n,
        thread: message.email.thread.clone(),
        sender: message.email.from.clone(),
        sender_display_name: message.email.from_display_name.clone(),
        recipients: message.email.to.clone(),
        attachment_ids,
        ingestion_source: message.ingestion_source.clone(),
        ingested_at: message.ingested_at,
        message_fingerprint: fingerprint,
    })
}
