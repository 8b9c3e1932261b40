// crates/intake-routing-core/src/core/snapshot.rs
// ============================================================================
// Module: Configuration Snapshot
// Description: Immutable per-run configuration with canonical hashing.
// Purpose: Pin every decision to one validated configuration state.
// Dependencies: crate::core::{classify, hashing, identity, registry}, serde
// ============================================================================

//! ## Overview
//! Configuration is an immutable snapshot loaded at process start and pinned
//! per run. Reloads produce a new snapshot with a new hash and are never
//! visible to in-flight runs. The snapshot validates at construction;
//! invalid configuration fails closed before any message is processed. The
//! `ConfigRef` (path plus canonical hash) binds every decision hash to the
//! exact configuration it was made under.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::classify::PipelineMode;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identity::IdentityThresholds;
use crate::core::identity::SignalWeights;
use crate::core::identifiers::ModelId;
use crate::core::registry::QueueId;
use crate::core::registry::RiskFlag;
use crate::core::registry::SlaId;

// ============================================================================
// SECTION: Config Reference
// ============================================================================

/// Reference binding decisions to a configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRef {
    /// Source path or URI the snapshot was loaded from.
    pub path: String,
    /// Canonical hash of the snapshot.
    pub sha256: HashDigest,
}

// ============================================================================
// SECTION: Section Types
// ============================================================================

/// Identity resolution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Status-derivation thresholds.
    pub thresholds: IdentityThresholds,
    /// Penalty subtracted when the sender is a configured shared mailbox.
    pub shared_mailbox_penalty: f64,
    /// Normalized similarity threshold for fuzzy signature/address matches.
    pub fuzzy_match_threshold: f64,
    /// Maximum candidates retained in the ranked top-K.
    pub top_k: usize,
    /// Shared mailbox addresses subject to the penalty.
    pub shared_mailboxes: Vec<String>,
    /// Per-signal score weights.
    pub signal_weights: SignalWeights,
}

/// Classifier acceptance-gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Minimum accepted confidence for the primary intent.
    pub min_primary_intent: f64,
    /// Minimum accepted confidence for the product line.
    pub min_product_line: f64,
    /// Minimum accepted confidence for the urgency.
    pub min_urgency: f64,
    /// Minimum accepted confidence per LLM-added risk flag.
    pub min_risk_flag: f64,
    /// Rule confidence at which a deterministic disagreement forces review.
    pub disagreement_rule_confidence: f64,
    /// Maximum LLM attempts (primary prompt plus repair prompt).
    pub max_llm_attempts: u32,
    /// Version of the deterministic rule tables.
    pub rules_version: String,
    /// Sender addresses the risk prescan flags as VIP.
    pub vip_senders: Vec<String>,
}

/// LLM provider configuration with deterministic parameters only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider label.
    pub provider: String,
    /// Model identifier.
    pub model_id: ModelId,
    /// Sampling temperature; zero for deterministic output.
    pub temperature: f64,
    /// Nucleus sampling bound.
    pub top_p: f64,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

/// Process-wide incident gates consulted on every stage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentGates {
    /// Force every message into a review queue.
    pub force_review: bool,
    /// Queue used when `force_review` is set.
    pub force_review_queue_id: QueueId,
    /// SLA used when `force_review` is set.
    pub force_review_sla_id: SlaId,
    /// Disable all LLM involvement.
    pub disable_llm: bool,
    /// Risk flags that strip `CREATE_CASE` and insert `BLOCK_CASE_CREATE`.
    pub block_case_create_risk_flags_any: Vec<RiskFlag>,
}

/// Extraction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Gate for IBAN extraction.
    pub iban_enabled: bool,
}

/// External I/O deadlines and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Directory lookup deadline in milliseconds.
    pub directory_timeout_ms: u64,
    /// LLM call deadline in milliseconds.
    pub llm_timeout_ms: u64,
    /// Case adapter deadline in milliseconds.
    pub case_timeout_ms: u64,
    /// Bounded retry attempts for transport errors.
    pub retry_attempts: u32,
    /// Fixed backoff sequence in milliseconds, one entry per retry.
    pub retry_backoff_ms: Vec<u64>,
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Immutable configuration snapshot pinned per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Classifier operating mode.
    pub mode: PipelineMode,
    /// Determinism mode: disallow any non-reproducible operation.
    pub determinism_mode: bool,
    /// Identity resolution configuration.
    pub identity: IdentityConfig,
    /// Classifier configuration.
    pub classify: ClassifyConfig,
    /// LLM configuration.
    pub llm: LlmConfig,
    /// Incident gates.
    pub incident: IncidentGates,
    /// Extraction configuration.
    pub extraction: ExtractionConfig,
    /// External I/O configuration.
    pub io: IoConfig,
}

impl ConfigSnapshot {
    /// Computes the canonical hash of the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn canonical_hash(&self) -> Result<HashDigest, HashError> {
        HashDigest::of_canonical_json(self)
    }

    /// Validates the snapshot invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when a value is out of range.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let thresholds = &self.identity.thresholds;
        for (name, value) in [
            ("identity.thresholds.theta_confirm", thresholds.theta_confirm),
            ("identity.thresholds.delta_confirm", thresholds.delta_confirm),
            ("identity.thresholds.theta_probable", thresholds.theta_probable),
            ("identity.thresholds.delta_probable", thresholds.delta_probable),
            ("identity.shared_mailbox_penalty", self.identity.shared_mailbox_penalty),
            ("identity.fuzzy_match_threshold", self.identity.fuzzy_match_threshold),
            ("classify.min_primary_intent", self.classify.min_primary_intent),
            ("classify.min_product_line", self.classify.min_product_line),
            ("classify.min_urgency", self.classify.min_urgency),
            ("classify.min_risk_flag", self.classify.min_risk_flag),
            ("classify.disagreement_rule_confidence", self.classify.disagreement_rule_confidence),
        ] {
            if !(0.0 ..= 1.0).contains(&value) {
                return Err(SnapshotError::OutOfRange {
                    key: name,
                    value,
                });
            }
        }
        if thresholds.theta_probable > thresholds.theta_confirm {
            return Err(SnapshotError::ThresholdOrder);
        }
        if self.identity.top_k == 0 {
            return Err(SnapshotError::ZeroTopK);
        }
        if self.classify.max_llm_attempts == 0 || self.classify.max_llm_attempts > 2 {
            return Err(SnapshotError::LlmAttemptsOutOfRange(self.classify.max_llm_attempts));
        }
        if self.classify.rules_version.trim().is_empty() {
            return Err(SnapshotError::MissingRulesVersion);
        }
        let backoff_budget = usize::try_from(self.io.retry_attempts).unwrap_or(usize::MAX);
        if self.io.retry_backoff_ms.len().saturating_add(1) < backoff_budget {
            return Err(SnapshotError::BackoffTooShort);
        }
        Ok(())
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Baseline,
            determinism_mode: false,
            identity: IdentityConfig {
                thresholds: IdentityThresholds {
                    theta_confirm: 0.85,
                    delta_confirm: 0.15,
                    theta_probable: 0.6,
                    delta_probable: 0.05,
                },
                shared_mailbox_penalty: 0.2,
                fuzzy_match_threshold: 0.85,
                top_k: 5,
                shared_mailboxes: Vec::new(),
                signal_weights: SignalWeights::default(),
            },
            classify: ClassifyConfig {
                min_primary_intent: 0.72,
                min_product_line: 0.65,
                min_urgency: 0.60,
                min_risk_flag: 0.80,
                disagreement_rule_confidence: 0.85,
                max_llm_attempts: 2,
                rules_version: "rules-v1".to_string(),
                vip_senders: Vec::new(),
            },
            llm: LlmConfig {
                provider: "local".to_string(),
                model_id: ModelId::new("intake-classifier-12b"),
                temperature: 0.0,
                top_p: 1.0,
                max_tokens: 1024,
            },
            incident: IncidentGates {
                force_review: false,
                force_review_queue_id: QueueId::IntakeReviewGeneral,
                force_review_sla_id: SlaId::OneBusinessDay,
                disable_llm: false,
                block_case_create_risk_flags_any: vec![RiskFlag::SecurityMalware],
            },
            extraction: ExtractionConfig {
                iban_enabled: true,
            },
            io: IoConfig {
                directory_timeout_ms: 2_000,
                llm_timeout_ms: 20_000,
                case_timeout_ms: 10_000,
                retry_attempts: 3,
                retry_backoff_ms: vec![100, 500],
            },
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Snapshot validation errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A ratio value is outside `[0.0, 1.0]`.
    #[error("config value {key} = {value} is outside [0.0, 1.0]")]
    OutOfRange {
        /// Dotted config key.
        key: &'static str,
        /// Offending value.
        value: f64,
    },
    /// Probable threshold exceeds confirm threshold.
    #[error("theta_probable must not exceed theta_confirm")]
    ThresholdOrder,
    /// Top-K must be at least one.
    #[error("identity.top_k must be at least 1")]
    ZeroTopK,
    /// LLM attempts must be 1 or 2.
    #[error("classify.max_llm_attempts must be 1 or 2, got {0}")]
    LlmAttemptsOutOfRange(u32),
    /// Rules version string is empty.
    #[error("classify.rules_version must not be empty")]
    MissingRulesVersion,
    /// Backoff sequence shorter than the retry budget.
    #[error("io.retry_backoff_ms must cover retry_attempts - 1 retries")]
    BackoffTooShort,
}
