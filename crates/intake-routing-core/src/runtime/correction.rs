// crates/intake-routing-core/src/runtime/correction.rs
// ============================================================================
// Module: Correction Sink
// Description: Append-only reviewer correction intake.
// Purpose: Persist corrections and link them into the run's audit chain.
// Dependencies: crate::core, crate::interfaces, crate::runtime::store
// ============================================================================

//! ## Overview
//! Reviewer corrections never mutate earlier artifacts. The sink persists
//! the correction record as its own content-addressed artifact under the
//! HITL stage and appends a `correction_recorded` event whose `output_ref`
//! points at the record. A subsequent reprocess run may consume the record
//! offline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::ArtifactRef;
use crate::core::ArtifactRefError;
use crate::core::AuditEvent;
use crate::core::AuditEventBody;
use crate::core::AuditEventKind;
use crate::core::ConfigRef;
use crate::core::CorrectionRecord;
use crate::core::EventId;
use crate::core::GENESIS_HASH;
use crate::core::HashError;
use crate::core::MessageId;
use crate::core::RunId;
use crate::core::Stage;
use crate::core::Timestamp;
use crate::core::canonical_json_bytes;
use crate::core::registry::SCHEMA_CORRECTION_RECORD;
use crate::interfaces::ArtifactStore;
use crate::interfaces::ArtifactStoreError;
use crate::interfaces::AuditStore;
use crate::interfaces::AuditStoreError;
use crate::runtime::store::artifact_uri;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Correction sink errors.
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// A target artifact reference is invalid.
    #[error(transparent)]
    TargetRef(#[from] ArtifactRefError),
    /// Artifact persistence failed.
    #[error(transparent)]
    Artifacts(#[from] ArtifactStoreError),
    /// Audit append failed.
    #[error(transparent)]
    Audit(#[from] AuditStoreError),
    /// Canonical serialization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Submission
// ============================================================================

/// Persists a correction record and links it into the audit chain.
///
/// # Errors
///
/// Returns [`CorrectionError`] when a target reference is non-canonical or
/// persistence fails.
pub fn submit_correction(
    artifacts: &dyn ArtifactStore,
    audit: &dyn AuditStore,
    message_id: &MessageId,
    run_id: &RunId,
    config_ref: &ConfigRef,
    correction: &CorrectionRecord,
    now: Timestamp,
) -> Result<ArtifactRef, CorrectionError> {
    for target in &correction.target_artifact_refs {
        target.validate_schema()?;
    }

    let uri = artifact_uri(
        message_id,
        Stage::Hitl,
        &format!("{}-r{}.json", correction.correction_id, correction.revision),
    );
    let bytes = canonical_json_bytes(correction)?;
    let correction_ref = ArtifactRef::for_bytes(SCHEMA_CORRECTION_RECORD, uri, &bytes);
    artifacts.put_if_absent(&correction_ref, &bytes)?;

    let chain = audit.read_chain(message_id, run_id)?;
    let prev_event_hash =
        chain.last().map_or_else(|| GENESIS_HASH.to_string(), |last| last.event_hash.clone());
    let body = AuditEventBody {
        event_id: EventId::new(format!("evt-{}", chain.len() + 1)),
        message_id: message_id.clone(),
        run_id: run_id.clone(),
        stage: Stage::Hitl,
        kind: AuditEventKind::CorrectionRecorded,
        input_refs: correction.target_artifact_refs.clone(),
        output_ref: Some(correction_ref.clone()),
        decision_hash: None,
        config_ref: config_ref.clone(),
        rules_ref: None,
        model_id: None,
        prompt_sha256: None,
        evidence: Vec::new(),
        reason: None,
        occurred_at: now,
        prev_event_hash,
    };
    let event = AuditEvent::seal(body)?;
    audit.append(message_id, run_id, event)?;
    Ok(correction_ref)
}
