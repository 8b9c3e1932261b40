// crates/intake-routing-core/src/core/error.rs
// ============================================================================
// Module: Error Taxonomy
// Description: Typed failure kinds shared by every pipeline stage.
// Purpose: Make every failure classifiable, routable, and auditable.
// Dependencies: crate::core::registry, serde, thiserror
// ============================================================================

//! ## Overview
//! Every failure in the pipeline is a tagged kind plus the stage it occurred
//! in and a stable reason code. Control flow never depends on unwinding: a
//! stage either produces a schema-valid fail-closed artifact itself, or it
//! returns a [`StageError`] and the orchestrator converts it to a
//! fail-closed outcome with an audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::registry::Stage;

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Reason code: LLM needed but no cached inference under determinism mode.
pub const REASON_DETERMINISM_CACHE_MISS: &str = "determinism_cache_miss";
/// Reason code: no routing rule matched.
pub const REASON_NO_RULE_MATCH: &str = "no_rule_match";
/// Reason code: directory adapter unavailable.
pub const REASON_DIRECTORY_UNAVAILABLE: &str = "directory_unavailable";
/// Reason code: artifact failed schema validation.
pub const REASON_SCHEMA_INVALID: &str = "schema_invalid";
/// Reason code: LLM output rejected by the acceptance gates.
pub const REASON_LLM_REJECTED: &str = "llm_rejected";
/// Reason code: deterministic rules disagree with the LLM primary intent.
pub const REASON_RULE_DISAGREEMENT: &str = "rule_disagreement";
/// Reason code: external dependency kept failing after bounded retry.
pub const REASON_DEPENDENCY_EXHAUSTED: &str = "dependency_exhausted";
/// Reason code: incident gate forced review.
pub const REASON_FORCE_REVIEW: &str = "incident_force_review";
/// Reason code: internal invariant violation.
pub const REASON_INTERNAL: &str = "internal_error";

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Failure taxonomy shared by all stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Schema-invalid output or non-canonical label.
    Validation,
    /// Safety override (malware, legal, regulatory, self-harm).
    SafetyOverride,
    /// Transient external dependency failure.
    DependencyUnavailable,
    /// Non-reproducible operation attempted in determinism mode.
    DeterminismViolation,
    /// Audit or artifact integrity violation.
    Integrity,
    /// Programmer error converted to a typed failure.
    Internal,
}

// ============================================================================
// SECTION: Stage Errors
// ============================================================================

/// Typed stage failure carrying kind, stage, and a stable reason code.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{stage} stage failed ({kind:?}): {reason}")]
pub struct StageError {
    /// Stage the failure occurred in.
    pub stage: Stage,
    /// Failure kind.
    pub kind: ErrorKind,
    /// Stable reason code for triage and tests.
    pub reason: String,
}

impl StageError {
    /// Builds a validation failure.
    #[must_use]
    pub fn validation(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::Validation,
            reason: reason.into(),
        }
    }

    /// Builds a dependency failure.
    #[must_use]
    pub fn dependency(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::DependencyUnavailable,
            reason: reason.into(),
        }
    }

    /// Builds a determinism violation.
    #[must_use]
    pub fn determinism(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::DeterminismViolation,
            reason: reason.into(),
        }
    }

    /// Builds an integrity failure.
    #[must_use]
    pub fn integrity(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::Integrity,
            reason: reason.into(),
        }
    }

    /// Builds an internal failure.
    #[must_use]
    pub fn internal(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: ErrorKind::Internal,
            reason: reason.into(),
        }
    }
}
