// system-tests/tests/pipeline.rs
// ============================================================================
// Module: Pipeline End-to-End Tests
// Description: Seed scenarios for the full intake pipeline.
// ============================================================================
//! ## Overview
//! Drives complete messages through the orchestrator: the auto claim happy
//! path, the malware override, GDPR priority, identity ambiguity, the
//! determinism gate, and the no-rule-match fallback. Every run's audit
//! chain must verify.

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
use helpers::RecordingCase;
use helpers::ScriptedLlm;
use intake_routing_core::Action;
use intake_routing_core::AvStatus;
use intake_routing_core::ConfigSnapshot;
use intake_routing_core::IdentityStatus;
use intake_routing_core::IntentLabel;
use intake_routing_core::PipelineMode;
use intake_routing_core::ProductLine;
use intake_routing_core::QueueId;
use intake_routing_core::RiskFlag;
use intake_routing_core::RunId;
use intake_routing_core::SlaId;
use intake_routing_core::Stage;
use intake_routing_core::Timestamp;
use intake_routing_core::Urgency;
use intake_routing_core::interfaces::AuditStore;
use intake_routing_core::registry::EntityType;
use intake_routing_core::verify_chain;
use intake_routing_core::identity::CandidateStatus;
use intake_routing_config::default_ruleset;

/// Builds a baseline-mode harness with the built-in ruleset.
fn baseline_harness(directory: FakeDirectory, scanner: FakeScanner) -> Harness {
    Harness::new(
        ConfigSnapshot::default(),
        default_ruleset().expect("default ruleset"),
        directory,
        scanner,
        ScriptedLlm::default(),
        Some(RecordingCase::default()),
    )
}

#[test]
fn auto_claim_with_policy_number_routes_to_claims_auto() {
    let directory =
        FakeDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    let harness = baseline_harness(directory, FakeScanner::default());
    let message = harness.message(
        "msg-claim-1",
        "Unfall gestern A2",
        "Gestern ist mir auf der A2 ein Unfall passiert. Meine Police POL-2024-00012345.",
        &[("fotos.pdf", b"unfallfotos")],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    let identity = outcome.identity.expect("identity result");
    assert_eq!(identity.status, IdentityStatus::Confirmed);
    let selected = identity.selected().expect("selected");
    assert_eq!(selected.entity_type, EntityType::Policy);
    assert_eq!(selected.entity_id.as_str(), "POL-2024-00012345");

    let classification = outcome.classification.expect("classification");
    assert_eq!(classification.primary_intent, IntentLabel::ClaimNew);
    assert_eq!(classification.product_line, ProductLine::Auto);
    assert_eq!(classification.urgency, Urgency::High);

    assert_eq!(outcome.routing.queue_id, QueueId::ClaimsAuto);
    assert_eq!(outcome.routing.sla_id, SlaId::FourHours);
    assert!(outcome.routing.has_action(Action::CreateCase));
    assert!(outcome.routing.has_action(Action::AttachOriginalEmail));
    assert!(outcome.routing.has_action(Action::AttachAllFiles));
    assert!(!outcome.routing.fail_closed);

    let chain = harness
        .audit
        .read_chain(&outcome.message_id, &outcome.run_id)
        .expect("chain");
    verify_chain(&chain).expect("chain verifies");
    assert!(chain.iter().any(|event| event.body.stage == Stage::Route));
}

#[test]
fn infected_attachment_overrides_everything() {
    let infected: &[u8] = b"definitely-malware";
    let directory =
        FakeDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    let scanner = FakeScanner::default().with_verdict(infected, AvStatus::Infected);
    let harness = baseline_harness(directory, scanner);
    let message = harness.message(
        "msg-malware-1",
        "Unfall gestern A2",
        "Unfall passiert, Police POL-2024-00012345.",
        &[("rechnung.exe", infected)],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    let classification = outcome.classification.expect("classification");
    assert!(classification.risk_flags.iter().any(|finding| finding.flag == RiskFlag::SecurityMalware));

    assert_eq!(outcome.routing.queue_id, QueueId::SecurityReview);
    assert_eq!(outcome.routing.sla_id, SlaId::OneHour);
    assert!(outcome.routing.has_action(Action::BlockCaseCreate));
    assert!(!outcome.routing.has_action(Action::CreateCase));
}

#[test]
fn gdpr_request_beats_legal_and_complaint() {
    let harness = baseline_harness(FakeDirectory::default(), FakeScanner::default());
    let message = harness.message(
        "msg-gdpr-1",
        "Auskunftsersuchen",
        "Auskunftsersuchen gemäß DSGVO. Meine Anwältin ist informiert.",
        &[],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    let classification = outcome.classification.expect("classification");
    assert_eq!(classification.primary_intent, IntentLabel::GdprRequest);
    assert_eq!(outcome.routing.queue_id, QueueId::PrivacyDsr);
}

#[test]
fn ambiguous_identity_routes_to_identity_review() {
    // Both policies are pattern-valid but unknown to the directory, so both
    // candidates carry only downgraded (medium) signals and tie closely.
    let harness = baseline_harness(FakeDirectory::default(), FakeScanner::default());
    let message = harness.message(
        "msg-ambiguous-1",
        "Frage zu meinen Verträgen",
        "Es geht um POL-2024-00012345 oder POL-2024-00054321, ich bin unsicher.",
        &[],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    let identity = outcome.identity.expect("identity");
    assert_eq!(identity.status, IdentityStatus::NeedsReview);
    assert!(!identity.top_k.is_empty());

    assert_eq!(outcome.routing.queue_id, QueueId::IdentityReview);
    assert!(outcome.routing.has_action(Action::AddRequestInfoDraft));
    assert!(!outcome.routing.has_action(Action::CreateCase));
}

#[test]
fn determinism_cache_miss_fails_closed_to_classification_review() {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.mode = PipelineMode::LlmFirst;
    snapshot.determinism_mode = true;
    let harness = Harness::new(
        snapshot,
        default_ruleset().expect("default ruleset"),
        FakeDirectory::default(),
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message = harness.message(
        "msg-determinism-1",
        "Unfall",
        "Gestern ein Unfall auf der A2.",
        &[],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    assert_eq!(outcome.fail_closed_stage, Some(Stage::Classify));
    assert_eq!(outcome.routing.queue_id, QueueId::ClassificationReview);
    assert!(outcome.routing.fail_closed);
    assert_eq!(
        outcome.routing.fail_closed_reason.as_deref(),
        Some("determinism_cache_miss")
    );

    let chain = harness
        .audit
        .read_chain(&outcome.message_id, &outcome.run_id)
        .expect("chain");
    verify_chain(&chain).expect("chain verifies even on fail-closed runs");
}

#[test]
fn coverage_question_routes_through_the_table() {
    let directory =
        FakeDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    let harness = baseline_harness(directory, FakeScanner::default());
    let message = harness.message(
        "msg-coverage-1",
        "Frage zur Deckung",
        "Ist mein Fahrrad versichert? Meine Police POL-2024-00012345.",
        &[],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    let classification = outcome.classification.expect("classification");
    assert_eq!(classification.primary_intent, IntentLabel::CoverageQuestion);
    assert_eq!(classification.product_line, ProductLine::Unknown);
    assert_eq!(outcome.routing.queue_id, QueueId::CoverageAdvice);
}

#[test]
fn uncovered_combination_falls_back_fail_closed() {
    // A table that only knows auto claims leaves coverage questions
    // uncovered; the evaluator must fall back fail-closed.
    let narrow = intake_routing_config::load_ruleset_from_str(
        r#"
ruleset_version = "routing-narrow"

[[rules]]
rule_id = "claims-auto"
priority = 100
queue_id = "QUEUE_CLAIMS_AUTO"
sla_id = "SLA_4H"
actions = ["CREATE_CASE", "ATTACH_ORIGINAL_EMAIL"]

[rules.match]
intents = ["INTENT_CLAIM_NEW", "INTENT_CLAIM_UPDATE"]
product_lines = ["PROD_AUTO"]
"#,
        "<narrow>",
    )
    .expect("narrow ruleset");
    let directory =
        FakeDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    let harness = Harness::new(
        ConfigSnapshot::default(),
        narrow,
        directory,
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message = harness.message(
        "msg-fallback-1",
        "Frage zur Deckung",
        "Ist mein Fahrrad versichert? Meine Police POL-2024-00012345.",
        &[],
    );

    let outcome = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");

    assert_eq!(outcome.routing.queue_id, QueueId::IntakeReviewGeneral);
    assert!(outcome.routing.fail_closed);
    assert_eq!(outcome.routing.fail_closed_reason.as_deref(), Some("no_rule_match"));
}

#[test]
fn processing_twice_reuses_artifacts_and_emits_no_new_completions() {
    let directory =
        FakeDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    // No case adapter: redelivery must leave nothing but the ingest record.
    let harness = Harness::new(
        ConfigSnapshot::default(),
        default_ruleset().expect("default ruleset"),
        directory,
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message = harness.message(
        "msg-idempotent-1",
        "Unfall gestern A2",
        "Unfall passiert, Police POL-2024-00012345.",
        &[],
    );

    let first = harness
        .orchestrator
        .process(&message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("first run");
    let second = harness
        .orchestrator
        .process(&message, &RunId::new("run-2"), Timestamp::from_unix_millis(20))
        .expect("second run");

    assert_eq!(first.routing_ref, second.routing_ref, "artifact reused");
    assert_eq!(first.route_decision_hash, second.route_decision_hash);

    let second_chain = harness
        .audit
        .read_chain(&second.message_id, &second.run_id)
        .expect("chain");
    // Redelivery observes existing artifacts: only the ingest record lands
    // on the new chain, no stage completions.
    assert!(second_chain.iter().all(|event| event.body.stage == Stage::Ingest));
}
