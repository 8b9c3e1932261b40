// crates/intake-routing-core/src/core/classify.rs
// ============================================================================
// Module: Classification Model
// Description: Multi-label intents, risk findings, and classification results.
// Purpose: Capture classification outcomes with evidence and provenance.
// Dependencies: crate::core::{evidence, hashing, identifiers, registry}, serde
// ============================================================================

//! ## Overview
//! Classification is multi-label with one selected primary intent. Every
//! accepted label carries a confidence and at least one verified evidence
//! span. Risk findings keep their origin: prescan findings can never be
//! removed by a model, only added to.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::evidence::EvidenceSpan;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::MessageId;
use crate::core::identifiers::ModelId;
use crate::core::registry::IntentLabel;
use crate::core::registry::ProductLine;
use crate::core::registry::RiskFlag;
use crate::core::registry::Urgency;

// ============================================================================
// SECTION: Pipeline Mode
// ============================================================================

/// Classifier operating mode selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineMode {
    /// Deterministic rules first, model refinement, LLM off by default.
    #[serde(rename = "BASELINE")]
    Baseline,
    /// LLM produces the result, gated by deterministic checks.
    #[serde(rename = "LLM_FIRST")]
    LlmFirst,
}

// ============================================================================
// SECTION: Intents and Risks
// ============================================================================

/// One scored intent label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    /// Canonical intent label.
    pub label: IntentLabel,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Evidence spans backing the label.
    pub evidence: Vec<EvidenceSpan>,
}

/// Origin of a risk finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskOrigin {
    /// Deterministic prescan rule.
    Prescan,
    /// Attachment AV verdict.
    AttachmentScan,
    /// LLM-proposed addition.
    Llm,
}

/// One risk finding with confidence and evidence.
///
/// # Invariants
/// - Prescan and attachment findings are never removed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFinding {
    /// Canonical risk flag.
    pub flag: RiskFlag,
    /// Confidence in `[0.0, 1.0]`; deterministic origins report `1.0`.
    pub confidence: f64,
    /// Origin of the finding.
    pub origin: RiskOrigin,
    /// Evidence spans backing the finding; empty for attachment verdicts.
    pub evidence: Vec<EvidenceSpan>,
}

// ============================================================================
// SECTION: Classification Result
// ============================================================================

/// Immutable classification artifact, one per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationResult {
    /// Message identifier.
    pub message_id: MessageId,
    /// Scored intent labels, multi-label.
    pub intents: Vec<IntentScore>,
    /// Selected primary intent.
    pub primary_intent: IntentLabel,
    /// Product line.
    pub product_line: ProductLine,
    /// Product line confidence.
    pub product_confidence: f64,
    /// Urgency.
    pub urgency: Urgency,
    /// Urgency confidence.
    pub urgency_confidence: f64,
    /// Risk findings, prescan plus accepted additions.
    pub risk_flags: Vec<RiskFinding>,
    /// Version of the deterministic rule tables used.
    pub rules_version: String,
    /// Mode the classifier ran in.
    pub mode: PipelineMode,
    /// Model identifier when an LLM contributed.
    pub model_id: Option<ModelId>,
    /// Prompt digest when an LLM contributed.
    pub prompt_sha256: Option<HashDigest>,
}

impl ClassificationResult {
    /// Returns the finding for a flag, if present.
    #[must_use]
    pub fn risk(&self, flag: RiskFlag) -> Option<&RiskFinding> {
        self.risk_flags.iter().find(|finding| finding.flag == flag)
    }

    /// Returns true when any of the given flags is present.
    #[must_use]
    pub fn has_any_risk(&self, flags: &[RiskFlag]) -> bool {
        self.risk_flags.iter().any(|finding| flags.contains(&finding.flag))
    }
}
