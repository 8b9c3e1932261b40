// crates/intake-routing-core/tests/decision_hash.rs
// ============================================================================
// Module: Decision Hashing Tests
// Description: Verifies timestamp-free, reproducible decision hashing.
// ============================================================================
//! ## Overview
//! Checks that canonical decision inputs contain no excluded member names,
//! that identical inputs hash bit-identically, and that configuration
//! changes move the hash.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::ConfigRef;
use intake_routing_core::DecisionContext;
use intake_routing_core::DecisionHashError;
use intake_routing_core::EXCLUDED_MEMBERS;
use intake_routing_core::EXCLUDED_SUFFIX;
use intake_routing_core::EntityId;
use intake_routing_core::HashDigest;
use intake_routing_core::IdentityCandidate;
use intake_routing_core::IdentityDecisionInput;
use intake_routing_core::IdentityResolutionResult;
use intake_routing_core::IdentitySignal;
use intake_routing_core::IdentityStatus;
use intake_routing_core::MessageId;
use intake_routing_core::SignalName;
use intake_routing_core::SignalStrength;
use intake_routing_core::decision_hash;
use intake_routing_core::identity::IdentityThresholds;
use intake_routing_core::registry::EntityType;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a decision context bound to a config hash seed.
fn context(config_seed: &[u8]) -> DecisionContext {
    DecisionContext {
        message_fingerprint: HashDigest::of_bytes(b"fingerprint"),
        raw_mime_sha256: HashDigest::of_bytes(b"raw-mime"),
        config_ref: ConfigRef {
            path: "intake-routing.toml".to_string(),
            sha256: HashDigest::of_bytes(config_seed),
        },
        determinism_mode: false,
    }
}

/// Builds an identity resolution fixture with one confirmed candidate.
fn identity_result() -> IdentityResolutionResult {
    IdentityResolutionResult {
        message_id: MessageId::new("msg-hash"),
        status: IdentityStatus::Confirmed,
        top_k: vec![IdentityCandidate {
            entity_type: EntityType::Policy,
            entity_id: EntityId::new("POL-2024-00012345"),
            score: 1.0,
            signals: vec![IdentitySignal {
                name: SignalName::PolicyNumber,
                value: "POL-2024-00012345".to_string(),
                strength: SignalStrength::Hard,
                weight: 1.0,
            }],
            evidence: Vec::new(),
            directory_status: None,
        }],
        thresholds: IdentityThresholds {
            theta_confirm: 0.85,
            delta_confirm: 0.15,
            theta_probable: 0.6,
            delta_probable: 0.05,
        },
        reason: None,
    }
}

/// Collects every member name of a JSON value, recursively.
fn member_names(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                out.push(key.clone());
                member_names(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                member_names(item, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn identity_input_contains_no_excluded_members() {
    let input = IdentityDecisionInput::from_result(context(b"config-a"), &identity_result());
    let value = serde_json::to_value(&input).expect("serialize");
    let mut names = Vec::new();
    member_names(&value, &mut names);
    for name in &names {
        assert!(!EXCLUDED_MEMBERS.contains(&name.as_str()), "excluded member {name}");
        assert!(!name.ends_with(EXCLUDED_SUFFIX), "timestamped member {name}");
    }
}

#[test]
fn identical_inputs_hash_bit_identically() {
    let first = decision_hash(&IdentityDecisionInput::from_result(
        context(b"config-a"),
        &identity_result(),
    ))
    .expect("first");
    let second = decision_hash(&IdentityDecisionInput::from_result(
        context(b"config-a"),
        &identity_result(),
    ))
    .expect("second");
    assert_eq!(first, second);
}

#[test]
fn config_change_moves_the_hash() {
    let first = decision_hash(&IdentityDecisionInput::from_result(
        context(b"config-a"),
        &identity_result(),
    ))
    .expect("first");
    let second = decision_hash(&IdentityDecisionInput::from_result(
        context(b"config-b"),
        &identity_result(),
    ))
    .expect("second");
    assert_ne!(first, second);
}

#[test]
fn status_change_moves_the_hash() {
    let mut degraded = identity_result();
    degraded.status = IdentityStatus::Probable;
    let confirmed = decision_hash(&IdentityDecisionInput::from_result(
        context(b"config-a"),
        &identity_result(),
    ))
    .expect("confirmed");
    let probable =
        decision_hash(&IdentityDecisionInput::from_result(context(b"config-a"), &degraded))
            .expect("probable");
    assert_ne!(confirmed, probable);
}

#[derive(Serialize)]
struct Smuggled {
    /// A timestamped member that must be rejected.
    decided_at: u64,
    /// Payload.
    value: u32,
}

#[test]
fn hasher_rejects_smuggled_timestamp_members() {
    let err = decision_hash(&Smuggled {
        decided_at: 123,
        value: 1,
    })
    .unwrap_err();
    assert!(matches!(err, DecisionHashError::ExcludedMember(name) if name == "decided_at"));
}

#[derive(Serialize)]
struct SmuggledRunId {
    /// A run identifier that must be rejected.
    run_id: String,
}

#[test]
fn hasher_rejects_smuggled_run_ids() {
    let err = decision_hash(&SmuggledRunId {
        run_id: "run-1".to_string(),
    })
    .unwrap_err();
    assert!(matches!(err, DecisionHashError::ExcludedMember(name) if name == "run_id"));
}
