// crates/intake-routing-core/src/core/correction.rs
// ============================================================================
// Module: Correction Records
// Description: Append-only reviewer correction records.
// Purpose: Persist HITL corrections for offline promotion without mutation.
// Dependencies: crate::core::{artifact, identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Reviewer corrections never mutate earlier artifacts. A correction record
//! references the affected artifacts by `(schema_id, sha256)` and carries a
//! merge-style patch; a subsequent reprocess run may consume it offline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::artifact::ArtifactRef;
use crate::core::identifiers::ActorId;
use crate::core::identifiers::CorrectionId;
use crate::core::identifiers::ReviewItemId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Correction Record
// ============================================================================

/// Append-only reviewer correction record.
///
/// # Invariants
/// - Never mutated; a follow-up correction appends a new record with a
///   higher `revision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorrectionRecord {
    /// Correction identifier.
    pub correction_id: CorrectionId,
    /// Review item the correction was submitted from.
    pub review_item_id: ReviewItemId,
    /// Reviewer identifier.
    pub actor_id: ActorId,
    /// Revision number within the review item, starting at 1.
    pub revision: u32,
    /// Merge-style patch over the corrected artifact.
    pub patch: Value,
    /// Artifacts the correction applies to.
    pub target_artifact_refs: Vec<ArtifactRef>,
    /// Submission timestamp.
    pub submitted_at: Timestamp,
}
