// crates/intake-routing-core/src/runtime/route.rs
// ============================================================================
// Module: Route Stage
// Description: Versioned decision-table evaluation with hard risk overrides.
// Purpose: Turn stage outputs into one deterministic routing decision.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The evaluator is a pure function over the identity status, accepted
//! classification, validated entity hints, and incident toggles. Evaluation
//! is first-match by a fixed priority ladder: incident gates, hard risk
//! overrides in canonical order, privacy requests, the identity
//! needs-review modifier, the versioned product/intent table, and finally
//! the fail-closed fallback. Case-creation blocking is applied as a
//! post-processing step so no rule can bypass it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Action;
use crate::core::ClassificationResult;
use crate::core::ExtractionResult;
use crate::core::ExtractedEntityType;
use crate::core::IdentityResolutionResult;
use crate::core::IntentLabel;
use crate::core::MessageId;
use crate::core::ProductLine;
use crate::core::QueueId;
use crate::core::RiskFlag;
use crate::core::RoutingDecision;
use crate::core::RoutingRuleset;
use crate::core::RuleId;
use crate::core::RulesetRef;
use crate::core::SlaId;
use crate::core::error::REASON_NO_RULE_MATCH;
use crate::core::registry::EntityType;
use crate::core::snapshot::ConfigSnapshot;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Inputs to the routing evaluator.
pub struct RouteInputs<'a> {
    /// Message identifier.
    pub message_id: &'a MessageId,
    /// Identity resolution result.
    pub identity: &'a IdentityResolutionResult,
    /// Accepted classification.
    pub classification: &'a ClassificationResult,
    /// Validated extraction result.
    pub extraction: &'a ExtractionResult,
    /// Configuration snapshot (incident gates, review SLAs).
    pub snapshot: &'a ConfigSnapshot,
    /// Versioned routing ruleset.
    pub ruleset: &'a RoutingRuleset,
    /// Reference to the evaluated ruleset.
    pub ruleset_ref: &'a RulesetRef,
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates the routing decision.
#[must_use]
pub fn evaluate(inputs: &RouteInputs<'_>) -> RoutingDecision {
    let decision = first_match(inputs);
    apply_case_create_blocks(inputs, decision)
}

/// Walks the priority ladder and returns the first matching decision.
fn first_match(inputs: &RouteInputs<'_>) -> RoutingDecision {
    let incident = &inputs.snapshot.incident;

    // 1. Incident gates.
    if incident.force_review {
        return decision(
            inputs,
            incident.force_review_queue_id,
            incident.force_review_sla_id,
            0,
            vec![Action::AttachOriginalEmail],
            "gate.force_review",
            false,
            None,
        );
    }

    // 2. Hard risk overrides in canonical order.
    for flag in RiskFlag::OVERRIDE_ORDER {
        if inputs.classification.risk(*flag).is_some() {
            return risk_override(inputs, *flag);
        }
    }

    // 3. Privacy / GDPR.
    if inputs.classification.primary_intent == IntentLabel::GdprRequest {
        return decision(
            inputs,
            QueueId::PrivacyDsr,
            SlaId::OneBusinessDay,
            10,
            vec![Action::CreateCase, Action::AttachOriginalEmail, Action::AttachAllFiles],
            "override.gdpr",
            false,
            None,
        );
    }

    // 4. Identity needs-review modifier.
    if inputs.identity.status.needs_review() {
        let mut actions = vec![Action::AttachOriginalEmail];
        if request_info_permitted(inputs) {
            actions.push(Action::AddRequestInfoDraft);
        }
        return decision(
            inputs,
            QueueId::IdentityReview,
            SlaId::OneBusinessDay,
            20,
            actions,
            "modifier.identity_review",
            false,
            None,
        );
    }

    // 5a. Unknown product needing an authoritative identifier.
    if unknown_product_review_applies(inputs) {
        return decision(
            inputs,
            QueueId::UnknownProductReview,
            SlaId::OneBusinessDay,
            30,
            vec![Action::AttachOriginalEmail],
            "modifier.unknown_product",
            false,
            None,
        );
    }

    // 5b. Versioned product/intent decision table.
    if let Some(rule) = inputs.ruleset.first_match(
        inputs.classification.primary_intent,
        inputs.classification.product_line,
        inputs.classification.urgency,
        inputs.identity.status,
    ) {
        return RoutingDecision {
            message_id: inputs.message_id.clone(),
            queue_id: rule.queue_id,
            sla_id: rule.sla_id,
            priority: rule.priority,
            actions: canonical_actions(rule.actions.clone()),
            rule_id: rule.rule_id.clone(),
            ruleset_ref: inputs.ruleset_ref.clone(),
            fail_closed: false,
            fail_closed_reason: None,
        };
    }

    // 6. Fail-closed fallback.
    decision(
        inputs,
        QueueId::IntakeReviewGeneral,
        SlaId::OneBusinessDay,
        100,
        vec![Action::AttachOriginalEmail],
        "fallback.no_rule_match",
        true,
        Some(REASON_NO_RULE_MATCH.to_string()),
    )
}

/// Builds the decision for one hard risk override.
fn risk_override(inputs: &RouteInputs<'_>, flag: RiskFlag) -> RoutingDecision {
    let (queue_id, sla_id, actions, rule_id) = match flag {
        RiskFlag::SecurityMalware => (
            QueueId::SecurityReview,
            SlaId::OneHour,
            vec![Action::BlockCaseCreate, Action::AttachOriginalEmail],
            "override.security_malware",
        ),
        RiskFlag::Regulatory => (
            QueueId::Complaints,
            SlaId::OneHour,
            vec![Action::CreateCase, Action::AttachOriginalEmail, Action::AttachAllFiles],
            "override.regulatory",
        ),
        RiskFlag::LegalThreat => (
            QueueId::Legal,
            SlaId::OneHour,
            vec![Action::CreateCase, Action::AttachOriginalEmail, Action::AttachAllFiles],
            "override.legal_threat",
        ),
        RiskFlag::FraudSignal => (
            QueueId::Fraud,
            SlaId::FourHours,
            vec![Action::CreateCase, Action::AttachOriginalEmail, Action::AttachAllFiles],
            "override.fraud_signal",
        ),
        RiskFlag::SelfHarmThreat => (
            QueueId::IntakeReviewGeneral,
            SlaId::OneHour,
            vec![Action::HumanEscalation, Action::AttachOriginalEmail],
            "override.self_harm",
        ),
        RiskFlag::LanguageUnsupported
        | RiskFlag::AutoreplyLoop
        | RiskFlag::PhishingSuspected
        | RiskFlag::MediaPress
        | RiskFlag::VipSender => (
            QueueId::IntakeReviewGeneral,
            SlaId::OneBusinessDay,
            vec![Action::AttachOriginalEmail],
            "override.language_unsupported",
        ),
    };
    decision(inputs, queue_id, sla_id, 1, actions, rule_id, false, None)
}

/// Builds a decision with the shared fields filled in.
#[allow(
    clippy::too_many_arguments,
    reason = "A builder would obscure the one-call-site decision shape."
)]
fn decision(
    inputs: &RouteInputs<'_>,
    queue_id: QueueId,
    sla_id: SlaId,
    priority: u32,
    actions: Vec<Action>,
    rule_id: &str,
    fail_closed: bool,
    fail_closed_reason: Option<String>,
) -> RoutingDecision {
    RoutingDecision {
        message_id: inputs.message_id.clone(),
        queue_id,
        sla_id,
        priority,
        actions: canonical_actions(actions),
        rule_id: RuleId::new(rule_id),
        ruleset_ref: inputs.ruleset_ref.clone(),
        fail_closed,
        fail_closed_reason,
    }
}

// ============================================================================
// SECTION: Modifier Conditions
// ============================================================================

/// Returns true when a request-info draft may be attached.
///
/// The draft template requires a reply address and is suppressed on
/// auto-reply loops, which would bounce indefinitely.
fn request_info_permitted(inputs: &RouteInputs<'_>) -> bool {
    !inputs.classification.has_any_risk(&[RiskFlag::AutoreplyLoop])
}

/// Returns true when the unknown-product review modifier applies.
fn unknown_product_review_applies(inputs: &RouteInputs<'_>) -> bool {
    if inputs.classification.product_line != ProductLine::Unknown {
        return false;
    }
    let intent = inputs.classification.primary_intent;
    let product_service_intent = intent.is_claim_related()
        || matches!(intent, IntentLabel::PolicyCancellation | IntentLabel::PolicyChange);
    if !product_service_intent {
        return false;
    }
    // An authoritative identifier (resolved policy or claim) determines the
    // product; without one the product stays unresolvable.
    let authoritative_identity = inputs
        .identity
        .selected()
        .is_some_and(|candidate| {
            matches!(candidate.entity_type, EntityType::Policy | EntityType::Claim)
        });
    let authoritative_entity = inputs
        .extraction
        .entities
        .iter()
        .any(|entity| {
            !entity.directory_miss
                && matches!(
                    entity.entity_type,
                    ExtractedEntityType::PolicyNumber | ExtractedEntityType::ClaimNumber
                )
        });
    !authoritative_identity && !authoritative_entity
}

// ============================================================================
// SECTION: Post-Processing
// ============================================================================

/// Applies the incident case-create block list to a decision.
fn apply_case_create_blocks(
    inputs: &RouteInputs<'_>,
    mut decision: RoutingDecision,
) -> RoutingDecision {
    let blocked = inputs
        .classification
        .has_any_risk(&inputs.snapshot.incident.block_case_create_risk_flags_any);
    if blocked {
        decision.actions.retain(|action| *action != Action::CreateCase);
        if !decision.actions.contains(&Action::BlockCaseCreate) {
            decision.actions.push(Action::BlockCaseCreate);
        }
        decision.actions = canonical_actions(decision.actions);
    }
    decision
}

/// Sorts actions into canonical registry order and removes duplicates.
fn canonical_actions(mut actions: Vec<Action>) -> Vec<Action> {
    actions.sort_unstable();
    actions.dedup();
    actions
}
