// crates/intake-routing-config/src/ruleset.rs
// ============================================================================
// Module: Ruleset Loading
// Description: Versioned routing decision-table loading and defaults.
// Purpose: Load validated rulesets and provide the built-in table.
// Dependencies: intake-routing-core, toml
// ============================================================================

//! ## Overview
//! Rulesets load from TOML into the core decision-table model. Validation
//! runs at load time: duplicate rule ids or priorities, empty tables, and
//! non-canonical labels (rejected by closed-enum parsing) all fail closed.
//! The built-in default table covers the standard product and intent
//! routing; the hard overrides of the evaluator are not part of the table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use intake_routing_core::Action;
use intake_routing_core::HashError;
use intake_routing_core::IntentLabel;
use intake_routing_core::ProductLine;
use intake_routing_core::QueueId;
use intake_routing_core::RoutingRule;
use intake_routing_core::RoutingRuleset;
use intake_routing_core::RuleId;
use intake_routing_core::RuleMatch;
use intake_routing_core::RulesetError;
use intake_routing_core::RulesetRef;
use intake_routing_core::SlaId;
use thiserror::Error;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Loaded Ruleset
// ============================================================================

/// Validated ruleset plus the reference binding route decisions to it.
#[derive(Debug, Clone)]
pub struct LoadedRuleset {
    /// Versioned decision table.
    pub ruleset: RoutingRuleset,
    /// Canonical reference for decision hashing.
    pub ruleset_ref: RulesetRef,
}

/// Ruleset loading errors.
#[derive(Debug, Error)]
pub enum RulesetLoadError {
    /// File could not be read.
    #[error("ruleset read failed for {path}: {reason}")]
    Io {
        /// Attempted path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// TOML parsing failed (including non-canonical labels).
    #[error("ruleset parse failed: {0}")]
    Parse(String),
    /// Ruleset validation failed.
    #[error(transparent)]
    Invalid(#[from] RulesetError),
    /// Canonical hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl From<RulesetLoadError> for ConfigError {
    fn from(err: RulesetLoadError) -> Self {
        Self::Parse(err.to_string())
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads and validates a ruleset from a TOML file.
///
/// # Errors
///
/// Returns [`RulesetLoadError`] when reading, parsing, or validation fails.
pub fn load_ruleset(path: &Path) -> Result<LoadedRuleset, RulesetLoadError> {
    let display = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|err| RulesetLoadError::Io {
        path: display.clone(),
        reason: err.to_string(),
    })?;
    load_ruleset_from_str(&contents, &display)
}

/// Loads and validates a ruleset from TOML text.
///
/// # Errors
///
/// Returns [`RulesetLoadError`] when parsing or validation fails.
pub fn load_ruleset_from_str(
    contents: &str,
    path: &str,
) -> Result<LoadedRuleset, RulesetLoadError> {
    let ruleset: RoutingRuleset =
        toml::from_str(contents).map_err(|err| RulesetLoadError::Parse(err.to_string()))?;
    ruleset.validate()?;
    let ruleset_ref = RulesetRef {
        path: path.to_string(),
        sha256: ruleset.canonical_hash()?,
        version: ruleset.ruleset_version.clone(),
    };
    Ok(LoadedRuleset {
        ruleset,
        ruleset_ref,
    })
}

// ============================================================================
// SECTION: Built-In Table
// ============================================================================

/// Returns the built-in routing decision table.
///
/// # Errors
///
/// Returns [`RulesetLoadError::Hash`] when canonical hashing fails.
pub fn default_ruleset() -> Result<LoadedRuleset, RulesetLoadError> {
    let claims = vec![IntentLabel::ClaimNew, IntentLabel::ClaimUpdate];
    let case_actions =
        vec![Action::CreateCase, Action::AttachOriginalEmail, Action::AttachAllFiles];
    let rules = vec![
        table_rule("claims-auto", 100, RuleMatch {
            intents: claims.clone(),
            product_lines: vec![ProductLine::Auto],
            ..RuleMatch::default()
        }, QueueId::ClaimsAuto, SlaId::FourHours, case_actions.clone()),
        table_rule("claims-property", 110, RuleMatch {
            intents: claims.clone(),
            product_lines: vec![ProductLine::Household, ProductLine::Building],
            ..RuleMatch::default()
        }, QueueId::ClaimsProperty, SlaId::FourHours, case_actions.clone()),
        table_rule("claims-liability", 120, RuleMatch {
            intents: claims.clone(),
            product_lines: vec![ProductLine::Liability],
            ..RuleMatch::default()
        }, QueueId::ClaimsLiability, SlaId::FourHours, case_actions.clone()),
        table_rule("claims-general", 130, RuleMatch {
            intents: claims,
            ..RuleMatch::default()
        }, QueueId::ClaimsGeneral, SlaId::FourHours, case_actions.clone()),
        table_rule("policy-service", 200, RuleMatch {
            intents: vec![IntentLabel::PolicyCancellation, IntentLabel::PolicyChange],
            ..RuleMatch::default()
        }, QueueId::PolicyService, SlaId::OneBusinessDay, vec![
            Action::CreateCase,
            Action::AttachOriginalEmail,
        ]),
        table_rule("billing", 210, RuleMatch {
            intents: vec![IntentLabel::BillingQuestion],
            ..RuleMatch::default()
        }, QueueId::Billing, SlaId::OneBusinessDay, vec![
            Action::CreateCase,
            Action::AttachOriginalEmail,
        ]),
        table_rule("documents", 220, RuleMatch {
            intents: vec![IntentLabel::DocumentSubmission],
            ..RuleMatch::default()
        }, QueueId::DocumentIntake, SlaId::OneBusinessDay, case_actions.clone()),
        table_rule("coverage", 230, RuleMatch {
            intents: vec![IntentLabel::CoverageQuestion],
            ..RuleMatch::default()
        }, QueueId::CoverageAdvice, SlaId::OneBusinessDay, vec![
            Action::CreateCase,
            Action::AttachOriginalEmail,
        ]),
        table_rule("broker", 240, RuleMatch {
            intents: vec![IntentLabel::BrokerIntermediary],
            ..RuleMatch::default()
        }, QueueId::BrokerDesk, SlaId::OneBusinessDay, vec![
            Action::CreateCase,
            Action::AttachOriginalEmail,
        ]),
        table_rule("complaints", 250, RuleMatch {
            intents: vec![IntentLabel::Complaint],
            ..RuleMatch::default()
        }, QueueId::Complaints, SlaId::FourHours, case_actions),
        table_rule("legal", 260, RuleMatch {
            intents: vec![IntentLabel::Legal],
            ..RuleMatch::default()
        }, QueueId::Legal, SlaId::OneBusinessDay, vec![
            Action::CreateCase,
            Action::AttachOriginalEmail,
        ]),
        table_rule("technical", 270, RuleMatch {
            intents: vec![IntentLabel::Technical],
            ..RuleMatch::default()
        }, QueueId::IntakeReviewGeneral, SlaId::ThreeBusinessDays, vec![
            Action::AttachOriginalEmail,
        ]),
        table_rule("general-inquiry", 280, RuleMatch {
            intents: vec![IntentLabel::GeneralInquiry],
            ..RuleMatch::default()
        }, QueueId::IntakeReviewGeneral, SlaId::ThreeBusinessDays, vec![
            Action::AttachOriginalEmail,
        ]),
    ];

    let ruleset = RoutingRuleset {
        ruleset_version: "routing-v1".to_string(),
        rules,
    };
    let ruleset_ref = RulesetRef {
        path: "<built-in>".to_string(),
        sha256: ruleset.canonical_hash()?,
        version: ruleset.ruleset_version.clone(),
    };
    Ok(LoadedRuleset {
        ruleset,
        ruleset_ref,
    })
}

/// Builds one table rule.
fn table_rule(
    rule_id: &str,
    priority: u32,
    condition: RuleMatch,
    queue_id: QueueId,
    sla_id: SlaId,
    actions: Vec<Action>,
) -> RoutingRule {
    RoutingRule {
        rule_id: RuleId::new(rule_id),
        priority,
        condition,
        queue_id,
        sla_id,
        actions,
    }
}
