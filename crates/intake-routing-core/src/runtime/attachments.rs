// crates/intake-routing-core/src/runtime/attachments.rs
// ============================================================================
// Module: Attachments Stage
// Description: AV stamping and text extraction for message attachments.
// Purpose: Gate every attachment behind an AV verdict before downstream use.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{retry, store}
// ============================================================================

//! ## Overview
//! Each attachment is fetched from the content-addressed store, scanned, and
//! stamped with its AV status. Text extraction runs only for `CLEAN`
//! attachments; extracted text is persisted as its own artifact and carried
//! by reference. A scanner that cannot be reached after bounded retry stamps
//! `FAILED`, which downstream treats like a suspicious verdict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ArtifactRef;
use crate::core::AttachmentRecord;
use crate::core::AvStatus;
use crate::core::IngestMessage;
use crate::core::Stage;
use crate::core::StageError;
use crate::core::order_attachments;
use crate::core::registry::SCHEMA_ATTACHMENT;
use crate::interfaces::ArtifactStore;
use crate::interfaces::AttachmentStore;
use crate::interfaces::AvScanner;
use crate::interfaces::ScanError;
use crate::interfaces::TextExtractError;
use crate::interfaces::TextExtractor;
use crate::runtime::retry::Backoff;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::with_retry;
use crate::runtime::store::artifact_uri;

// ============================================================================
// SECTION: Stage Execution
// ============================================================================

/// Runs the Attachments stage.
///
/// # Errors
///
/// Returns [`StageError`] when attachment bytes cannot be fetched or the
/// extracted-text artifact cannot be persisted.
pub fn run(
    message: &IngestMessage,
    attachment_store: &dyn AttachmentStore,
    artifact_store: &dyn ArtifactStore,
    scanner: &dyn AvScanner,
    extractor: &dyn TextExtractor,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<Vec<AttachmentRecord>, StageError> {
    let mut ordered = message.attachments.clone();
    order_attachments(&mut ordered, |attachment| {
        (attachment.sha256.as_hex().to_string(), attachment.filename.clone())
    });

    let mut records = Vec::with_capacity(ordered.len());
    for attachment in &ordered {
        let bytes = attachment_store
            .get(&attachment.sha256)
            .map_err(|err| StageError::dependency(Stage::Attachments, err.to_string()))?;

        let verdict = with_retry(
            retry,
            backoff,
            |err: &ScanError| matches!(err, ScanError::Unavailable(_)),
            || scanner.scan(&bytes),
        );
        let (av_status, scanner_version) = match verdict {
            Ok(verdict) => (verdict.status, verdict.scanner_version),
            Err(err) => (AvStatus::Failed, format!("unavailable: {err}")),
        };

        let (extracted_text_ref, ocr_confidence) = if av_status.text_usable() {
            extract_text(message, attachment, &bytes, artifact_store, extractor, retry, backoff)?
        } else {
            (None, None)
        };

        records.push(AttachmentRecord {
            attachment_id: attachment.attachment_id.clone(),
            sha256: attachment.sha256.clone(),
            filename: attachment.filename.clone(),
            content_type: attachment.content_type.clone(),
            av_status,
            scanner_version,
            extracted_text_ref,
            ocr_confidence,
        });
    }
    Ok(records)
}

/// Extracts text for a clean attachment and persists it as an artifact.
fn extract_text(
    message: &IngestMessage,
    attachment: &crate::core::IncomingAttachment,
    bytes: &[u8],
    artifact_store: &dyn ArtifactStore,
    extractor: &dyn TextExtractor,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<(Option<ArtifactRef>, Option<f64>), StageError> {
    let extracted = with_retry(
        retry,
        backoff,
        |err: &TextExtractError| matches!(err, TextExtractError::Unavailable(_)),
        || extractor.extract(bytes, &attachment.content_type),
    );
    let Ok(extracted) = extracted else {
        // Unsupported or unreachable extraction leaves the attachment
        // without text; identity and classification simply see less input.
        return Ok((None, None));
    };

    let uri = artifact_uri(
        &message.message_id,
        Stage::Attachments,
        &format!("{}.text", attachment.attachment_id),
    );
    let text_bytes = extracted.text.as_bytes();
    let artifact_ref = ArtifactRef::for_bytes(SCHEMA_ATTACHMENT, uri, text_bytes);
    artifact_store
        .put_if_absent(&artifact_ref, text_bytes)
        .map_err(|err| StageError::dependency(Stage::Attachments, err.to_string()))?;
    Ok((Some(artifact_ref), Some(extracted.confidence)))
}
