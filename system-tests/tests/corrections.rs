// system-tests/tests/corrections.rs
// ============================================================================
// Module: Correction Sink End-to-End Tests
// Description: Reviewer corrections linked into the audit chain.
// ============================================================================
//! ## Overview
//! Corrections append to the run's audit chain without touching earlier
//! artifacts; the chain must still verify afterwards and the record must be
//! retrievable by reference.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod helpers;

use helpers::FakeDirectory;
use helpers::FakeScanner;
use helpers::Harness;
use helpers::ScriptedLlm;
use intake_routing_core::ActorId;
use intake_routing_core::AuditEventKind;
use intake_routing_core::ConfigSnapshot;
use intake_routing_core::CorrectionId;
use intake_routing_core::CorrectionRecord;
use intake_routing_core::ReviewItemId;
use intake_routing_core::RunId;
use intake_routing_core::Timestamp;
use intake_routing_core::interfaces::ArtifactStore;
use intake_routing_core::interfaces::AuditStore;
use intake_routing_core::submit_correction;
use intake_routing_core::verify_chain;
use intake_routing_config::default_ruleset;
use serde_json::json;

#[test]
fn corrections_append_to_the_chain_without_mutation() {
    let harness = Harness::new(
        ConfigSnapshot::default(),
        default_ruleset().expect("default ruleset"),
        FakeDirectory::default(),
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message =
        harness.message("msg-correction-1", "Frage", "Eine allgemeine Frage ohne Kennungen.", &[]);
    let run_id = RunId::new("run-1");
    let outcome = harness
        .orchestrator
        .process(&message, &run_id, Timestamp::from_unix_millis(10))
        .expect("run");
    let routing_bytes_before =
        harness.artifacts.get(&outcome.routing_ref).expect("routing artifact");

    let correction = CorrectionRecord {
        correction_id: CorrectionId::new("corr-1"),
        review_item_id: ReviewItemId::new("review-1"),
        actor_id: ActorId::new("reviewer-7"),
        revision: 1,
        patch: json!({"primary_intent": "INTENT_BILLING_QUESTION"}),
        target_artifact_refs: vec![outcome.routing_ref.clone()],
        submitted_at: Timestamp::from_unix_millis(50),
    };
    let correction_ref = submit_correction(
        &harness.artifacts,
        &harness.audit,
        &outcome.message_id,
        &run_id,
        harness.orchestrator.config_ref(),
        &correction,
        Timestamp::from_unix_millis(50),
    )
    .expect("submit correction");

    // The chain still verifies and ends with the correction event.
    let chain = harness.audit.read_chain(&outcome.message_id, &run_id).expect("chain");
    verify_chain(&chain).expect("chain verifies");
    let last = chain.last().expect("events");
    assert_eq!(last.body.kind, AuditEventKind::CorrectionRecorded);
    assert_eq!(last.body.output_ref.as_ref(), Some(&correction_ref));

    // Earlier artifacts are untouched; the record round-trips.
    let routing_bytes_after =
        harness.artifacts.get(&outcome.routing_ref).expect("routing artifact");
    assert_eq!(routing_bytes_before, routing_bytes_after);
    let stored: CorrectionRecord = serde_json::from_slice(
        &harness.artifacts.get(&correction_ref).expect("correction artifact"),
    )
    .expect("correction parses");
    assert_eq!(stored, correction);
}

#[test]
fn second_revision_appends_a_new_record() {
    let harness = Harness::new(
        ConfigSnapshot::default(),
        default_ruleset().expect("default ruleset"),
        FakeDirectory::default(),
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message = harness.message("msg-correction-2", "Frage", "Noch eine Frage.", &[]);
    let run_id = RunId::new("run-1");
    let outcome = harness
        .orchestrator
        .process(&message, &run_id, Timestamp::from_unix_millis(10))
        .expect("run");

    let mut correction = CorrectionRecord {
        correction_id: CorrectionId::new("corr-2"),
        review_item_id: ReviewItemId::new("review-2"),
        actor_id: ActorId::new("reviewer-7"),
        revision: 1,
        patch: json!({"urgency": "URG_LOW"}),
        target_artifact_refs: vec![outcome.routing_ref.clone()],
        submitted_at: Timestamp::from_unix_millis(50),
    };
    let first_ref = submit_correction(
        &harness.artifacts,
        &harness.audit,
        &outcome.message_id,
        &run_id,
        harness.orchestrator.config_ref(),
        &correction,
        Timestamp::from_unix_millis(50),
    )
    .expect("first revision");

    correction.revision = 2;
    correction.patch = json!({"urgency": "URG_NORMAL"});
    let second_ref = submit_correction(
        &harness.artifacts,
        &harness.audit,
        &outcome.message_id,
        &run_id,
        harness.orchestrator.config_ref(),
        &correction,
        Timestamp::from_unix_millis(60),
    )
    .expect("second revision");

    assert_ne!(first_ref, second_ref, "revisions are separate artifacts");
    let chain = harness.audit.read_chain(&outcome.message_id, &run_id).expect("chain");
    verify_chain(&chain).expect("chain verifies");
    let corrections = chain
        .iter()
        .filter(|event| event.body.kind == AuditEventKind::CorrectionRecorded)
        .count();
    assert_eq!(corrections, 2);
}
