// crates/intake-routing-core/src/core/identity.rs
// ============================================================================
// Module: Identity Resolution Model
// Description: Signals, candidates, thresholds, and resolution results.
// Purpose: Capture deterministic identity scoring inputs and outcomes.
// Dependencies: crate::core::{evidence, identifiers, registry}, serde
// ============================================================================

//! ## Overview
//! Identity resolution scores directory candidates from weighted signals.
//! Signal strength is classed HARD/MEDIUM/SOFT with fixed base weights;
//! concrete per-signal weights come from the configuration snapshot. The
//! resolution result records the full ranked top-K with signals and evidence
//! so the decision hash covers everything that influenced the status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::evidence::EvidenceSpan;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::MessageId;
use crate::core::registry::EntityType;
use crate::core::registry::IdentityStatus;

// ============================================================================
// SECTION: Signals
// ============================================================================

/// Signal strength classes with fixed base weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    /// Soft contextual signal.
    Soft,
    /// Medium corroborating signal.
    Medium,
    /// Hard identifying signal.
    Hard,
}

impl SignalStrength {
    /// Returns the fixed base weight for the strength class.
    #[must_use]
    pub const fn base_weight(self) -> f64 {
        match self {
            Self::Hard => 1.0,
            Self::Medium => 0.7,
            Self::Soft => 0.3,
        }
    }
}

/// Deterministic identity signal names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalName {
    /// Validated policy number found in the text.
    PolicyNumber,
    /// Validated claim number found in the text.
    ClaimNumber,
    /// Validated customer number found in the text.
    CustomerNumber,
    /// Sender address matched a directory record.
    SenderDirectoryMatch,
    /// Thread headers linked to a prior resolved message.
    ThreadLinkage,
    /// Signature block fuzzy-matched a directory name.
    SignatureFuzzyMatch,
    /// Postal address fuzzy-matched a directory record.
    AddressFuzzyMatch,
    /// Candidate key proposed by LLM assist and validated afterwards.
    LlmAssistProposal,
}

/// One weighted signal contributing to a candidate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySignal {
    /// Signal name.
    pub name: SignalName,
    /// Matched value (already redaction-safe, e.g. an identifier).
    pub value: String,
    /// Strength class.
    pub strength: SignalStrength,
    /// Effective weight applied to the score.
    pub weight: f64,
}

/// Per-signal weights from configuration.
///
/// Defaults follow the strength class of each signal; operators may tune
/// individual weights without touching the strength model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    /// Weight for validated policy numbers.
    pub policy_number: f64,
    /// Weight for validated claim numbers.
    pub claim_number: f64,
    /// Weight for validated customer numbers.
    pub customer_number: f64,
    /// Weight for sender directory matches.
    pub sender_directory_match: f64,
    /// Weight for thread linkage.
    pub thread_linkage: f64,
    /// Weight for fuzzy signature matches.
    pub signature_fuzzy_match: f64,
    /// Weight for fuzzy address matches.
    pub address_fuzzy_match: f64,
    /// Weight for validated LLM-assist proposals.
    pub llm_assist_proposal: f64,
}

impl SignalWeights {
    /// Returns the configured weight for a signal name.
    #[must_use]
    pub const fn weight_for(&self, name: SignalName) -> f64 {
        match name {
            SignalName::PolicyNumber => self.policy_number,
            SignalName::ClaimNumber => self.claim_number,
            SignalName::CustomerNumber => self.customer_number,
            SignalName::SenderDirectoryMatch => self.sender_directory_match,
            SignalName::ThreadLinkage => self.thread_linkage,
            SignalName::SignatureFuzzyMatch => self.signature_fuzzy_match,
            SignalName::AddressFuzzyMatch => self.address_fuzzy_match,
            SignalName::LlmAssistProposal => self.llm_assist_proposal,
        }
    }

    /// Returns the strength class for a signal name.
    #[must_use]
    pub const fn strength_for(name: SignalName) -> SignalStrength {
        match name {
            SignalName::PolicyNumber | SignalName::ClaimNumber | SignalName::CustomerNumber => {
                SignalStrength::Hard
            }
            SignalName::SenderDirectoryMatch
            | SignalName::SignatureFuzzyMatch
            | SignalName::LlmAssistProposal => SignalStrength::Medium,
            SignalName::ThreadLinkage | SignalName::AddressFuzzyMatch => SignalStrength::Soft,
        }
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            policy_number: SignalStrength::Hard.base_weight(),
            claim_number: SignalStrength::Hard.base_weight(),
            customer_number: SignalStrength::Hard.base_weight(),
            sender_directory_match: SignalStrength::Medium.base_weight(),
            thread_linkage: SignalStrength::Soft.base_weight(),
            signature_fuzzy_match: SignalStrength::Medium.base_weight(),
            address_fuzzy_match: SignalStrength::Soft.base_weight(),
            llm_assist_proposal: SignalStrength::Medium.base_weight(),
        }
    }
}

// ============================================================================
// SECTION: Candidates
// ============================================================================

/// Directory lifecycle status for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    /// Active or open in the directory.
    #[serde(rename = "ACTIVE")]
    Active,
    /// Inactive or closed in the directory.
    #[serde(rename = "CLOSED")]
    Closed,
}

/// Scored identity candidate.
///
/// # Invariants
/// - `score` is clamped to `[0.0, 1.0]` after penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityCandidate {
    /// Directory entity type.
    pub entity_type: EntityType,
    /// Directory entity identifier.
    pub entity_id: EntityId,
    /// Clamped deterministic score.
    pub score: f64,
    /// Signals that contributed to the score.
    pub signals: Vec<IdentitySignal>,
    /// Evidence spans backing the signals.
    pub evidence: Vec<EvidenceSpan>,
    /// Directory lifecycle status, when the lookup succeeded.
    pub directory_status: Option<CandidateStatus>,
}

impl IdentityCandidate {
    /// Returns true when any contributing signal is hard.
    #[must_use]
    pub fn has_hard_signal(&self) -> bool {
        self.signals.iter().any(|signal| signal.strength == SignalStrength::Hard)
    }

    /// Returns true when any contributing signal is medium or stronger.
    #[must_use]
    pub fn has_medium_signal(&self) -> bool {
        self.signals.iter().any(|signal| signal.strength >= SignalStrength::Medium)
    }
}

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Status-derivation thresholds pinned by the configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityThresholds {
    /// Minimum top score for CONFIRMED.
    pub theta_confirm: f64,
    /// Minimum margin over the runner-up for CONFIRMED.
    pub delta_confirm: f64,
    /// Minimum top score for PROBABLE.
    pub theta_probable: f64,
    /// Minimum margin over the runner-up for PROBABLE.
    pub delta_probable: f64,
}

// ============================================================================
// SECTION: Resolution Result
// ============================================================================

/// Immutable identity resolution artifact, one per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityResolutionResult {
    /// Message identifier.
    pub message_id: MessageId,
    /// Derived status.
    pub status: IdentityStatus,
    /// Ranked candidates, best first, capped at the configured K.
    pub top_k: Vec<IdentityCandidate>,
    /// Thresholds the status was derived under.
    pub thresholds: IdentityThresholds,
    /// Reason code for degraded outcomes (e.g. `directory_unavailable`).
    pub reason: Option<String>,
}

impl IdentityResolutionResult {
    /// Returns the selected (top-ranked) candidate, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&IdentityCandidate> {
        self.top_k.first()
    }
}
