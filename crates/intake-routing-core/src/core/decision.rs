// crates/intake-routing-core/src/core/decision.rs
// ============================================================================
// Module: Decision Hashing
// Description: Timestamp-free canonical decision inputs and their hashes.
// Purpose: Make identity, classify, and route decisions bit-reproducible.
// Dependencies: crate::core::{classify, hashing, identity, registry, routing,
// ruleset, snapshot}, serde, serde_json
// ============================================================================

//! ## Overview
//! Each decision stage hashes a canonical input describing everything that
//! influenced its outcome and nothing that varies between replays. Run ids,
//! event ids, timestamps, hostnames, worker ids, and random seeds are
//! structurally absent, and the hasher additionally walks the serialized
//! input and rejects any member whose name matches the exclusion list. Two
//! runs over identical inputs, configuration, ruleset, and cached inference
//! artifacts therefore produce bit-identical hashes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::classify::ClassificationResult;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identity::IdentityCandidate;
use crate::core::identity::IdentityResolutionResult;
use crate::core::identity::IdentityThresholds;
use crate::core::identity::SignalName;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::ModelId;
use crate::core::identifiers::RuleId;
use crate::core::registry::Action;
use crate::core::registry::EntityType;
use crate::core::registry::IdentityStatus;
use crate::core::registry::IntentLabel;
use crate::core::registry::ProductLine;
use crate::core::registry::QueueId;
use crate::core::registry::RiskFlag;
use crate::core::registry::SlaId;
use crate::core::registry::Stage;
use crate::core::registry::Urgency;
use crate::core::routing::RoutingDecision;
use crate::core::ruleset::RulesetRef;
use crate::core::snapshot::ConfigRef;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Stable system identifier embedded in every decision input.
pub const SYSTEM_ID: &str = "ieim-intake-routing-engine";

/// Specification version the decision inputs conform to.
pub const SPEC_SEMVER: &str = "1.0.0";

/// Member names that must never appear in a canonical decision input.
pub const EXCLUDED_MEMBERS: &[&str] =
    &["run_id", "event_id", "hostname", "worker_id", "random_seed"];

/// Member-name suffix that must never appear in a canonical decision input.
pub const EXCLUDED_SUFFIX: &str = "_at";

// ============================================================================
// SECTION: Shared Context
// ============================================================================

/// Per-run context shared by all decision inputs.
///
/// Deliberately excludes the run identifier: the context binds the decision
/// to the message content and configuration, not to one execution.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionContext {
    /// Message content fingerprint.
    pub message_fingerprint: HashDigest,
    /// Raw MIME content hash.
    pub raw_mime_sha256: HashDigest,
    /// Configuration reference.
    pub config_ref: ConfigRef,
    /// Determinism mode in effect.
    pub determinism_mode: bool,
}

// ============================================================================
// SECTION: Digest Fragments
// ============================================================================

/// Signal digest inside a candidate digest.
#[derive(Debug, Clone, Serialize)]
pub struct SignalDigest {
    /// Signal name.
    pub name: SignalName,
    /// Matched value.
    pub value: String,
    /// Effective weight.
    pub weight: f64,
}

/// Candidate digest inside the identity decision input.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateDigest {
    /// Directory entity type.
    pub entity_type: EntityType,
    /// Directory entity identifier.
    pub entity_id: EntityId,
    /// Deterministic score.
    pub score: f64,
    /// Contributing signals.
    pub signals: Vec<SignalDigest>,
    /// Snippet hashes of the backing evidence.
    pub evidence_snippet_sha256: Vec<String>,
}

impl CandidateDigest {
    /// Projects a full candidate into its digest form.
    #[must_use]
    pub fn from_candidate(candidate: &IdentityCandidate) -> Self {
        Self {
            entity_type: candidate.entity_type,
            entity_id: candidate.entity_id.clone(),
            score: candidate.score,
            signals: candidate
                .signals
                .iter()
                .map(|signal| SignalDigest {
                    name: signal.name,
                    value: signal.value.clone(),
                    weight: signal.weight,
                })
                .collect(),
            evidence_snippet_sha256: candidate
                .evidence
                .iter()
                .map(|span| span.snippet_sha256.as_hex().to_string())
                .collect(),
        }
    }
}

/// Selected-candidate digest.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedDigest {
    /// Directory entity type.
    pub entity_type: EntityType,
    /// Directory entity identifier.
    pub entity_id: EntityId,
    /// Deterministic score.
    pub score: f64,
}

/// Scored-label digest for intents and risk flags.
#[derive(Debug, Clone, Serialize)]
pub struct LabelDigest<L: Serialize> {
    /// Canonical label.
    pub label: L,
    /// Confidence.
    pub confidence: f64,
    /// Snippet hashes of the backing evidence.
    pub evidence_snippet_sha256: Vec<String>,
}

/// LLM involvement digest.
#[derive(Debug, Clone, Serialize)]
pub struct LlmDigest {
    /// True when an LLM contributed to the decision.
    pub enabled: bool,
    /// Provider label.
    pub provider: String,
    /// Model identifier.
    pub model_id: ModelId,
    /// Prompt digest.
    pub prompt_sha256: Option<String>,
}

// ============================================================================
// SECTION: Decision Inputs
// ============================================================================

/// Canonical identity decision input.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityDecisionInput {
    /// Stable system identifier.
    pub system_id: &'static str,
    /// Specification version.
    pub spec_semver: &'static str,
    /// Stage discriminator.
    pub stage: Stage,
    /// Shared decision context.
    #[serde(flatten)]
    pub context: DecisionContext,
    /// Derived identity status.
    pub status: IdentityStatus,
    /// Selected candidate, when one exists.
    pub selected: Option<SelectedDigest>,
    /// Ranked candidate digests.
    pub top_k: Vec<CandidateDigest>,
    /// Thresholds the status was derived under.
    pub thresholds: IdentityThresholds,
}

impl IdentityDecisionInput {
    /// Builds the canonical input from an identity resolution artifact.
    #[must_use]
    pub fn from_result(context: DecisionContext, result: &IdentityResolutionResult) -> Self {
        let selected = result.selected().map(|candidate| SelectedDigest {
            entity_type: candidate.entity_type,
            entity_id: candidate.entity_id.clone(),
            score: candidate.score,
        });
        Self {
            system_id: SYSTEM_ID,
            spec_semver: SPEC_SEMVER,
            stage: Stage::Identity,
            context,
            status: result.status,
            selected,
            top_k: result.top_k.iter().map(CandidateDigest::from_candidate).collect(),
            thresholds: result.thresholds,
        }
    }
}

/// Canonical classification decision input.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyDecisionInput {
    /// Stable system identifier.
    pub system_id: &'static str,
    /// Specification version.
    pub spec_semver: &'static str,
    /// Stage discriminator.
    pub stage: Stage,
    /// Shared decision context.
    #[serde(flatten)]
    pub context: DecisionContext,
    /// Deterministic rules version.
    pub rules_version: String,
    /// LLM involvement, when an LLM contributed.
    pub llm: Option<LlmDigest>,
    /// Selected primary intent.
    pub primary_intent: IntentLabel,
    /// Scored intent digests.
    pub intents: Vec<LabelDigest<IntentLabel>>,
    /// Product line.
    pub product_line: ProductLine,
    /// Urgency.
    pub urgency: Urgency,
    /// Risk flag digests.
    pub risk_flags: Vec<LabelDigest<RiskFlag>>,
}

impl ClassifyDecisionInput {
    /// Builds the canonical input from a classification artifact.
    #[must_use]
    pub fn from_result(
        context: DecisionContext,
        result: &ClassificationResult,
        llm: Option<LlmDigest>,
    ) -> Self {
        Self {
            system_id: SYSTEM_ID,
            spec_semver: SPEC_SEMVER,
            stage: Stage::Classify,
            context,
            rules_version: result.rules_version.clone(),
            llm,
            primary_intent: result.primary_intent,
            intents: result
                .intents
                .iter()
                .map(|intent| LabelDigest {
                    label: intent.label,
                    confidence: intent.confidence,
                    evidence_snippet_sha256: intent
                        .evidence
                        .iter()
                        .map(|span| span.snippet_sha256.as_hex().to_string())
                        .collect(),
                })
                .collect(),
            product_line: result.product_line,
            urgency: result.urgency,
            risk_flags: result
                .risk_flags
                .iter()
                .map(|finding| LabelDigest {
                    label: finding.flag,
                    confidence: finding.confidence,
                    evidence_snippet_sha256: finding
                        .evidence
                        .iter()
                        .map(|span| span.snippet_sha256.as_hex().to_string())
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Decision summary inside the route decision input.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionSummary {
    /// Target queue.
    pub queue_id: QueueId,
    /// Target SLA.
    pub sla_id: SlaId,
    /// Queue priority.
    pub priority: u32,
    /// Actions in canonical order.
    pub actions: Vec<Action>,
    /// Rule that produced the decision.
    pub rule_id: RuleId,
    /// Fail-closed marker.
    pub fail_closed: bool,
    /// Fail-closed reason.
    pub fail_closed_reason: Option<String>,
}

/// Canonical route decision input.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDecisionInput {
    /// Stable system identifier.
    pub system_id: &'static str,
    /// Specification version.
    pub spec_semver: &'static str,
    /// Stage discriminator.
    pub stage: Stage,
    /// Shared decision context.
    #[serde(flatten)]
    pub context: DecisionContext,
    /// Ruleset reference.
    pub rules_ref: RulesetRef,
    /// Identity status consumed by the evaluator.
    pub identity_status: IdentityStatus,
    /// Primary intent consumed by the evaluator.
    pub primary_intent: IntentLabel,
    /// Product line consumed by the evaluator.
    pub product_line: ProductLine,
    /// Urgency consumed by the evaluator.
    pub urgency: Urgency,
    /// Risk flags consumed by the evaluator, in canonical order.
    pub risk_flags: Vec<RiskFlag>,
    /// Summary of the decision produced.
    pub decision_summary: DecisionSummary,
}

impl RouteDecisionInput {
    /// Builds the canonical input from the evaluator inputs and decision.
    #[must_use]
    pub fn from_decision(
        context: DecisionContext,
        identity_status: IdentityStatus,
        classification: &ClassificationResult,
        decision: &RoutingDecision,
    ) -> Self {
        let mut risk_flags: Vec<RiskFlag> =
            classification.risk_flags.iter().map(|finding| finding.flag).collect();
        risk_flags.sort_unstable();
        risk_flags.dedup();
        Self {
            system_id: SYSTEM_ID,
            spec_semver: SPEC_SEMVER,
            stage: Stage::Route,
            context,
            rules_ref: decision.ruleset_ref.clone(),
            identity_status,
            primary_intent: classification.primary_intent,
            product_line: classification.product_line,
            urgency: classification.urgency,
            risk_flags,
            decision_summary: DecisionSummary {
                queue_id: decision.queue_id,
                sla_id: decision.sla_id,
                priority: decision.priority,
                actions: decision.actions.clone(),
                rule_id: decision.rule_id.clone(),
                fail_closed: decision.fail_closed,
                fail_closed_reason: decision.fail_closed_reason.clone(),
            },
        }
    }
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Decision hashing errors.
#[derive(Debug, Error)]
pub enum DecisionHashError {
    /// Canonical serialization failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// The input serialization failed.
    #[error("decision input serialization failed: {0}")]
    Serialization(String),
    /// The input contains an excluded member name.
    #[error("decision input contains excluded member: {0}")]
    ExcludedMember(String),
}

/// Computes the decision hash over a canonical decision input.
///
/// The serialized input is audited for excluded member names before
/// hashing; any match is a programming error surfaced as
/// [`DecisionHashError::ExcludedMember`] rather than a silently unstable
/// hash.
///
/// # Errors
///
/// Returns [`DecisionHashError`] on serialization failure or exclusion
/// violations.
pub fn decision_hash<T: Serialize>(input: &T) -> Result<HashDigest, DecisionHashError> {
    let value = serde_json::to_value(input)
        .map_err(|err| DecisionHashError::Serialization(err.to_string()))?;
    check_excluded_members(&value)?;
    Ok(HashDigest::of_canonical_json(&value)?)
}

/// Walks a JSON value and rejects excluded member names.
fn check_excluded_members(value: &Value) -> Result<(), DecisionHashError> {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if EXCLUDED_MEMBERS.contains(&key.as_str()) || key.ends_with(EXCLUDED_SUFFIX) {
                    return Err(DecisionHashError::ExcludedMember(key.clone()));
                }
                check_excluded_members(nested)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                check_excluded_members(item)?;
            }
            Ok(())
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
    }
}
