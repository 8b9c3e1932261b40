// crates/intake-routing-core/tests/audit_chain.rs
// ============================================================================
// Module: Audit Chain Tests
// Description: Verifies hash chaining, tamper detection, and linkage rules.
// ============================================================================
//! ## Overview
//! Builds small chains and checks that verification passes for intact
//! chains, reports the exact index of the first broken event, and enforces
//! the genesis rules.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::AuditEvent;
use intake_routing_core::AuditEventBody;
use intake_routing_core::AuditEventKind;
use intake_routing_core::ChainVerifyError;
use intake_routing_core::ConfigRef;
use intake_routing_core::EventId;
use intake_routing_core::GENESIS_HASH;
use intake_routing_core::HashDigest;
use intake_routing_core::MessageId;
use intake_routing_core::RunId;
use intake_routing_core::Stage;
use intake_routing_core::Timestamp;
use intake_routing_core::verify_chain;

/// Builds an event body linking to the given predecessor hash.
fn body(ordinal: u64, stage: Stage, prev: &str) -> AuditEventBody {
    AuditEventBody {
        event_id: EventId::new(format!("evt-{ordinal}")),
        message_id: MessageId::new("msg-1"),
        run_id: RunId::new("run-1"),
        stage,
        kind: AuditEventKind::StageCompleted,
        input_refs: Vec::new(),
        output_ref: None,
        decision_hash: None,
        config_ref: ConfigRef {
            path: "intake-routing.toml".to_string(),
            sha256: HashDigest::of_bytes(b"config"),
        },
        rules_ref: None,
        model_id: None,
        prompt_sha256: None,
        evidence: Vec::new(),
        reason: None,
        occurred_at: Timestamp::from_unix_millis(i64::try_from(ordinal).unwrap_or(0)),
        prev_event_hash: prev.to_string(),
    }
}

/// Builds a valid chain of the requested length.
fn chain(stages: &[Stage]) -> Vec<AuditEvent> {
    let mut events: Vec<AuditEvent> = Vec::new();
    for (ordinal, stage) in stages.iter().enumerate() {
        let prev = events.last().map_or(GENESIS_HASH, |event| event.event_hash.as_str()).to_string();
        let event = AuditEvent::seal(body(ordinal as u64 + 1, *stage, &prev)).expect("seal");
        events.push(event);
    }
    events
}

#[test]
fn intact_chain_verifies() {
    let events = chain(&[Stage::Ingest, Stage::Normalize, Stage::Identity, Stage::Route]);
    assert!(verify_chain(&events).is_ok());
}

#[test]
fn single_event_chain_verifies() {
    let events = chain(&[Stage::Normalize]);
    assert!(verify_chain(&events).is_ok());
}

#[test]
fn empty_chain_is_rejected() {
    assert!(matches!(verify_chain(&[]), Err(ChainVerifyError::Empty)));
}

#[test]
fn tampered_event_fails_at_exact_index() {
    let mut events = chain(&[Stage::Ingest, Stage::Normalize, Stage::Identity, Stage::Route]);
    events[2].body.reason = Some("tampered".to_string());
    assert!(matches!(verify_chain(&events), Err(ChainVerifyError::HashMismatch(2))));
}

#[test]
fn tampering_the_genesis_event_fails_at_index_zero() {
    let mut events = chain(&[Stage::Ingest, Stage::Normalize]);
    events[0].body.reason = Some("tampered".to_string());
    assert!(matches!(verify_chain(&events), Err(ChainVerifyError::HashMismatch(0))));
}

#[test]
fn broken_link_fails_at_exact_index() {
    let mut events = chain(&[Stage::Ingest, Stage::Normalize, Stage::Identity]);
    // Re-seal event 2 with a foreign prev hash: its own hash is valid but
    // the linkage is broken.
    let mut foreign = body(2, Stage::Normalize, GENESIS_HASH);
    foreign.prev_event_hash = HashDigest::of_bytes(b"foreign").as_hex().to_string();
    events[1] = AuditEvent::seal(foreign).expect("seal");
    assert!(matches!(verify_chain(&events), Err(ChainVerifyError::BrokenLink(1))));
}

#[test]
fn genesis_must_link_to_zero_hash() {
    let events = vec![
        AuditEvent::seal(body(1, Stage::Ingest, "1111111111111111111111111111111111111111111111111111111111111111"))
            .expect("seal"),
    ];
    assert!(matches!(verify_chain(&events), Err(ChainVerifyError::BadGenesis(_))));
}

#[test]
fn genesis_must_be_ingest_or_normalize() {
    let events = chain(&[Stage::Classify]);
    assert!(matches!(verify_chain(&events), Err(ChainVerifyError::BadGenesis(_))));
}
