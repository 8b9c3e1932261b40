// crates/intake-routing-core/src/core/routing.rs
// ============================================================================
// Module: Routing Decision Model
// Description: The routing decision artifact emitted by the Route stage.
// Purpose: Record queue, SLA, actions, and fail-closed provenance per run.
// Dependencies: crate::core::{identifiers, registry, ruleset}, serde
// ============================================================================

//! ## Overview
//! A routing decision names the target queue, SLA, priority, and action set
//! plus the rule and ruleset that produced it. Fail-closed decisions carry a
//! machine-readable reason for operator triage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::MessageId;
use crate::core::identifiers::RuleId;
use crate::core::registry::Action;
use crate::core::registry::QueueId;
use crate::core::registry::SlaId;
use crate::core::ruleset::RulesetRef;

// ============================================================================
// SECTION: Routing Decision
// ============================================================================

/// Immutable routing decision artifact, one per run.
///
/// # Invariants
/// - `actions` never contains both `CREATE_CASE` and `BLOCK_CASE_CREATE`.
/// - `fail_closed_reason` is present iff `fail_closed` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingDecision {
    /// Message identifier.
    pub message_id: MessageId,
    /// Target queue.
    pub queue_id: QueueId,
    /// Target SLA.
    pub sla_id: SlaId,
    /// Queue priority; lower values are more urgent.
    pub priority: u32,
    /// Actions for the case layer, in canonical order.
    pub actions: Vec<Action>,
    /// Rule that produced the decision.
    pub rule_id: RuleId,
    /// Ruleset the rule came from.
    pub ruleset_ref: RulesetRef,
    /// True when the decision is a fail-closed fallback.
    pub fail_closed: bool,
    /// Machine-readable fail-closed reason.
    pub fail_closed_reason: Option<String>,
}

impl RoutingDecision {
    /// Returns true when the decision includes the given action.
    #[must_use]
    pub fn has_action(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}
