// crates/intake-routing-core/src/core/audit.rs
// ============================================================================
// Module: Audit Events and Hash Chain
// Description: Append-only audit events with per-run hash chaining.
// Purpose: Provide tamper-evident audit records and offline verification.
// Dependencies: crate::core::{artifact, evidence, hashing, identifiers,
// registry, ruleset, snapshot, time}, serde
// ============================================================================

//! ## Overview
//! Audit chains live per `(message_id, run_id)`. Each event's hash covers
//! the full event body including `prev_event_hash`, so altering any event
//! breaks verification from that index onward. The genesis event links to a
//! fixed zero hash. Evidence inside events is always the redacted
//! projection; full values never enter the chain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::artifact::ArtifactRef;
use crate::core::evidence::RedactedEvidence;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identifiers::EventId;
use crate::core::identifiers::MessageId;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::RunId;
use crate::core::registry::Stage;
use crate::core::ruleset::RulesetRef;
use crate::core::snapshot::ConfigRef;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed zero hash linking the genesis event of every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// SECTION: Event Model
// ============================================================================

/// Audit event kinds recorded on the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Stage transitioned to RUNNING.
    StageStarted,
    /// Stage completed and persisted its output.
    StageCompleted,
    /// Stage failed closed with a review outcome.
    StageFailedClosed,
    /// Transport work was dead-lettered.
    StageDeadLettered,
    /// A reviewer correction was recorded.
    CorrectionRecorded,
    /// A replay compared a recomputed decision hash against a stored one.
    ReplayCompared,
}

/// Audit event body; everything the event hash covers.
///
/// # Invariants
/// - `prev_event_hash` is the `event_hash` of the predecessor, or
///   [`GENESIS_HASH`] for the first event of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEventBody {
    /// Event identifier.
    pub event_id: EventId,
    /// Message identifier.
    pub message_id: MessageId,
    /// Run identifier.
    pub run_id: RunId,
    /// Stage the event belongs to.
    pub stage: Stage,
    /// Event kind.
    pub kind: AuditEventKind,
    /// Input artifact references the stage consumed.
    pub input_refs: Vec<ArtifactRef>,
    /// Output artifact reference, when the stage produced one.
    pub output_ref: Option<ArtifactRef>,
    /// Decision hash for decision stages.
    pub decision_hash: Option<HashDigest>,
    /// Configuration reference pinned for the run.
    pub config_ref: ConfigRef,
    /// Ruleset reference for route events.
    pub rules_ref: Option<RulesetRef>,
    /// Model identifier when an LLM contributed.
    pub model_id: Option<ModelId>,
    /// Prompt digest when an LLM contributed.
    pub prompt_sha256: Option<HashDigest>,
    /// Redacted evidence attached to the event.
    pub evidence: Vec<RedactedEvidence>,
    /// Reason code for failed-closed or dead-lettered events.
    pub reason: Option<String>,
    /// Event timestamp supplied by the worker.
    pub occurred_at: Timestamp,
    /// Hash of the predecessor event.
    pub prev_event_hash: String,
}

/// Sealed audit event with its chain hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event body covered by the hash.
    pub body: AuditEventBody,
    /// Hash over the canonical JSON of the body.
    pub event_hash: String,
}

impl AuditEvent {
    /// Seals a body into an event by computing its canonical hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn seal(body: AuditEventBody) -> Result<Self, HashError> {
        let digest = event_hash(&body)?;
        Ok(Self {
            body,
            event_hash: digest.as_hex().to_string(),
        })
    }
}

/// Computes the canonical hash of an event body.
///
/// # Errors
///
/// Returns [`HashError`] when canonical serialization fails.
pub fn event_hash(body: &AuditEventBody) -> Result<HashDigest, HashError> {
    HashDigest::of_canonical_json(body)
}

// ============================================================================
// SECTION: Chain Verification
// ============================================================================

/// Chain verification errors, reporting the first broken index.
#[derive(Debug, Error)]
pub enum ChainVerifyError {
    /// Chain contains no events.
    #[error("audit chain is empty")]
    Empty,
    /// Genesis event does not link to the zero hash or starts at a later
    /// stage than NORMALIZE.
    #[error("audit chain genesis invalid at index 0: {0}")]
    BadGenesis(String),
    /// An event hash does not match its recomputed value.
    #[error("audit event hash mismatch at index {0}")]
    HashMismatch(usize),
    /// An event does not link to its predecessor.
    #[error("audit chain link broken at index {0}")]
    BrokenLink(usize),
    /// Canonical hashing failed during verification.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Verifies a chain of events for one `(message_id, run_id)`.
///
/// Walks the chain recomputing every event hash and checking every
/// `prev_event_hash` link. The error names the index of the first broken
/// event.
///
/// # Errors
///
/// Returns [`ChainVerifyError`] at the first broken link or hash mismatch.
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), ChainVerifyError> {
    let Some(first) = events.first() else {
        return Err(ChainVerifyError::Empty);
    };
    if first.body.prev_event_hash != GENESIS_HASH {
        return Err(ChainVerifyError::BadGenesis("prev_event_hash is not the zero hash".into()));
    }
    if !matches!(first.body.stage, Stage::Ingest | Stage::Normalize) {
        return Err(ChainVerifyError::BadGenesis(format!(
            "chain starts at stage {}",
            first.body.stage
        )));
    }
    let mut prev_hash: Option<&str> = None;
    for (index, event) in events.iter().enumerate() {
        let recomputed = event_hash(&event.body)?;
        if recomputed.as_hex() != event.event_hash {
            return Err(ChainVerifyError::HashMismatch(index));
        }
        if let Some(prev) = prev_hash
            && event.body.prev_event_hash != prev
        {
            return Err(ChainVerifyError::BrokenLink(index));
        }
        prev_hash = Some(&event.event_hash);
    }
    Ok(())
}
