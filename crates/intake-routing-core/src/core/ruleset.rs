// crates/intake-routing-core/src/core/ruleset.rs
// ============================================================================
// Module: Routing Ruleset
// Description: Versioned product/intent decision table with validation.
// Purpose: Define the canonical rule table consumed by the routing evaluator.
// Dependencies: crate::core::{hashing, identifiers, registry}, serde
// ============================================================================

//! ## Overview
//! The routing ruleset is the versioned decision table evaluated after all
//! hard overrides. Rules match on intent, product line, urgency, and
//! identity status; an empty match list means "any". Evaluation is
//! first-match by ascending priority. Validation rejects duplicate rule ids
//! and duplicate priorities at load time, so an ambiguous table can never
//! reach the evaluator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::identifiers::RuleId;
use crate::core::registry::Action;
use crate::core::registry::IdentityStatus;
use crate::core::registry::IntentLabel;
use crate::core::registry::ProductLine;
use crate::core::registry::QueueId;
use crate::core::registry::SlaId;
use crate::core::registry::Urgency;

// ============================================================================
// SECTION: Ruleset Reference
// ============================================================================

/// Reference binding a route decision to the exact ruleset evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetRef {
    /// Source path or URI the ruleset was loaded from.
    pub path: String,
    /// Canonical hash of the ruleset.
    pub sha256: HashDigest,
    /// Ruleset version string.
    pub version: String,
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Match condition for one routing rule. Empty lists match any value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Intents the rule applies to.
    #[serde(default)]
    pub intents: Vec<IntentLabel>,
    /// Product lines the rule applies to.
    #[serde(default)]
    pub product_lines: Vec<ProductLine>,
    /// Urgencies the rule applies to.
    #[serde(default)]
    pub urgencies: Vec<Urgency>,
    /// Identity statuses the rule applies to.
    #[serde(default)]
    pub identity_statuses: Vec<IdentityStatus>,
}

impl RuleMatch {
    /// Returns true when the rule matches the given stage outputs.
    #[must_use]
    pub fn matches(
        &self,
        intent: IntentLabel,
        product: ProductLine,
        urgency: Urgency,
        identity_status: IdentityStatus,
    ) -> bool {
        (self.intents.is_empty() || self.intents.contains(&intent))
            && (self.product_lines.is_empty() || self.product_lines.contains(&product))
            && (self.urgencies.is_empty() || self.urgencies.contains(&urgency))
            && (self.identity_statuses.is_empty()
                || self.identity_statuses.contains(&identity_status))
    }
}

/// One routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Stable rule identifier.
    pub rule_id: RuleId,
    /// Evaluation priority; lower values evaluate first.
    pub priority: u32,
    /// Match condition; an absent condition matches everything.
    #[serde(rename = "match", default)]
    pub condition: RuleMatch,
    /// Target queue.
    pub queue_id: QueueId,
    /// Target SLA.
    pub sla_id: SlaId,
    /// Actions attached to the decision.
    pub actions: Vec<Action>,
}

// ============================================================================
// SECTION: Ruleset
// ============================================================================

/// Versioned routing decision table.
///
/// # Invariants
/// - Rule identifiers and priorities are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRuleset {
    /// Ruleset version string.
    pub ruleset_version: String,
    /// Rules of the decision table.
    pub rules: Vec<RoutingRule>,
}

impl RoutingRuleset {
    /// Computes the canonical hash of the ruleset.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonical serialization fails.
    pub fn canonical_hash(&self) -> Result<HashDigest, HashError> {
        HashDigest::of_canonical_json(self)
    }

    /// Validates the ruleset invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError`] when validation fails.
    pub fn validate(&self) -> Result<(), RulesetError> {
        if self.ruleset_version.trim().is_empty() {
            return Err(RulesetError::MissingVersion);
        }
        if self.rules.is_empty() {
            return Err(RulesetError::EmptyRuleset);
        }
        for (index, rule) in self.rules.iter().enumerate() {
            if self.rules.iter().skip(index + 1).any(|other| other.rule_id == rule.rule_id) {
                return Err(RulesetError::DuplicateRuleId(rule.rule_id.to_string()));
            }
            if self.rules.iter().skip(index + 1).any(|other| other.priority == rule.priority) {
                return Err(RulesetError::DuplicatePriority(rule.priority));
            }
        }
        Ok(())
    }

    /// Returns the first rule matching the stage outputs, by ascending
    /// priority.
    #[must_use]
    pub fn first_match(
        &self,
        intent: IntentLabel,
        product: ProductLine,
        urgency: Urgency,
        identity_status: IdentityStatus,
    ) -> Option<&RoutingRule> {
        let mut ordered: Vec<&RoutingRule> = self.rules.iter().collect();
        ordered.sort_by_key(|rule| rule.priority);
        ordered
            .into_iter()
            .find(|rule| rule.condition.matches(intent, product, urgency, identity_status))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ruleset validation errors.
#[derive(Debug, Error)]
pub enum RulesetError {
    /// Ruleset version string is empty.
    #[error("ruleset version must not be empty")]
    MissingVersion,
    /// Ruleset contains no rules.
    #[error("ruleset must define at least one rule")]
    EmptyRuleset,
    /// Duplicate rule identifier.
    #[error("duplicate rule identifier: {0}")]
    DuplicateRuleId(String),
    /// Duplicate rule priority.
    #[error("duplicate rule priority: {0}")]
    DuplicatePriority(u32),
}
