// crates/intake-routing-core/tests/classify.rs
// ============================================================================
// Module: Classification Tests
// Description: Verifies prescan rules, baseline classification, and LLM gates.
// ============================================================================
//! ## Overview
//! Covers the risk prescan vocabulary, baseline rule/model classification,
//! the determinism cache-miss failure, the acceptance gates, and the
//! disagreement gate.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use intake_routing_core::ConfigSnapshot;
use intake_routing_core::HashDigest;
use intake_routing_core::ErrorKind;
use intake_routing_core::IngestMessage;
use intake_routing_core::IntentLabel;
use intake_routing_core::MessageId;
use intake_routing_core::NormalizedMessage;
use intake_routing_core::ParsedEmail;
use intake_routing_core::PipelineMode;
use intake_routing_core::ProductLine;
use intake_routing_core::RawMimeRef;
use intake_routing_core::RiskFlag;
use intake_routing_core::ThreadKeys;
use intake_routing_core::Timestamp;
use intake_routing_core::Urgency;
use intake_routing_core::inference::InferenceParams;
use intake_routing_core::interfaces::LlmError;
use intake_routing_core::interfaces::LlmProvider;
use intake_routing_core::runtime::ClassifyInputs;
use intake_routing_core::runtime::InMemoryInferenceCache;
use intake_routing_core::runtime::NoopBackoff;
use intake_routing_core::runtime::RetryPolicy;
use intake_routing_core::runtime::classify::classify;
use intake_routing_core::runtime::classify::prescan_risks;
use intake_routing_core::runtime::normalize;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// LLM stub returning a fixed completion.
struct FixedLlm {
    /// Completion text returned on every call.
    response: String,
}

impl LlmProvider for FixedLlm {
    fn infer(&self, _prompt: &str, _params: &InferenceParams) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }
}

/// Builds a normalized message from subject and body.
fn normalized(subject: &str, body: &str) -> NormalizedMessage {
    let message = IngestMessage {
        message_id: MessageId::new("msg-classify"),
        raw_mime: RawMimeRef {
            sha256: HashDigest::of_bytes(body.as_bytes()),
            source_id: "mailbox-1".to_string(),
            source_message_id: "src-1".to_string(),
            uri: "mail://mailbox-1/src-1".to_string(),
        },
        email: ParsedEmail {
            subject: subject.to_string(),
            body_text: body.to_string(),
            from: "kunde@example.com".to_string(),
            from_display_name: None,
            to: vec!["intake@insurer.example".to_string()],
            cc: Vec::new(),
            thread: ThreadKeys::default(),
        },
        attachments: Vec::new(),
        ingestion_source: "m365".to_string(),
        ingested_at: Timestamp::from_unix_millis(1),
    };
    normalize::run(&message).expect("normalize")
}

/// Runs classification with the given snapshot and LLM response.
fn run_classify(
    message: &NormalizedMessage,
    snapshot: &ConfigSnapshot,
    llm_response: &str,
) -> Result<intake_routing_core::ClassificationResult, intake_routing_core::StageError> {
    let inputs = ClassifyInputs {
        normalized: message,
        attachment_texts: &[],
        attachments: &[],
    };
    let llm = FixedLlm {
        response: llm_response.to_string(),
    };
    let cache = InMemoryInferenceCache::new();
    let retry = RetryPolicy::from_io(&snapshot.io);
    classify(&inputs, snapshot, &llm, &cache, &retry, &NoopBackoff)
}

/// Builds an LLM answer asserting one intent with evidence into the body.
fn llm_answer(message: &NormalizedMessage, label: &str, needle: &str) -> String {
    let start = message.body_c14n.find(needle).expect("needle present");
    let end = start + needle.len();
    json!({
        "intents": [{
            "label": label,
            "confidence": 0.9,
            "evidence": [{"source": "BODY", "start": start, "end": end, "snippet": needle}],
        }],
        "primary_intent": label,
        "product_line": {
            "label": "PROD_AUTO",
            "confidence": 0.8,
            "evidence": [{"source": "BODY", "start": start, "end": end, "snippet": needle}],
        },
        "urgency": {
            "label": "URG_HIGH",
            "confidence": 0.8,
            "evidence": [{"source": "BODY", "start": start, "end": end, "snippet": needle}],
        },
        "risk_flags": [],
    })
    .to_string()
}

// ============================================================================
// SECTION: Prescan
// ============================================================================

#[test]
fn prescan_flags_explicit_legal_threats_only() {
    let threatening = normalized("Frist", "Ich werde rechtliche Schritte einleiten.");
    let inputs = ClassifyInputs {
        normalized: &threatening,
        attachment_texts: &[],
        attachments: &[],
    };
    let findings = prescan_risks(&inputs, &ConfigSnapshot::default());
    assert!(findings.iter().any(|finding| finding.flag == RiskFlag::LegalThreat));

    // A mere lawyer mention is the LEGAL intent, not a threat.
    let mention = normalized("Vertretung", "Meine Anwältin wird sich melden.");
    let inputs = ClassifyInputs {
        normalized: &mention,
        attachment_texts: &[],
        attachments: &[],
    };
    let findings = prescan_risks(&inputs, &ConfigSnapshot::default());
    assert!(!findings.iter().any(|finding| finding.flag == RiskFlag::LegalThreat));
}

#[test]
fn prescan_flags_configured_vip_senders() {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.classify.vip_senders = vec!["Kunde@Example.com".to_string()];
    let message = normalized("Frage", "Eine gewöhnliche Frage.");
    let inputs = ClassifyInputs {
        normalized: &message,
        attachment_texts: &[],
        attachments: &[],
    };
    // Matching folds case, so the configured mixed-case entry still hits.
    let findings = prescan_risks(&inputs, &snapshot);
    assert!(findings.iter().any(|finding| finding.flag == RiskFlag::VipSender));

    let findings = prescan_risks(&inputs, &ConfigSnapshot::default());
    assert!(!findings.iter().any(|finding| finding.flag == RiskFlag::VipSender));
}

#[test]
fn prescan_detects_autoreply_loops() {
    let message = normalized("Out of Office", "Automatische Antwort: bin im Urlaub.");
    let inputs = ClassifyInputs {
        normalized: &message,
        attachment_texts: &[],
        attachments: &[],
    };
    let findings = prescan_risks(&inputs, &ConfigSnapshot::default());
    assert!(findings.iter().any(|finding| finding.flag == RiskFlag::AutoreplyLoop));
}

// ============================================================================
// SECTION: Baseline
// ============================================================================

#[test]
fn baseline_classifies_an_auto_claim() {
    let message =
        normalized("Unfall gestern A2", "Gestern ist mir auf der A2 ein Unfall passiert.");
    let snapshot = ConfigSnapshot::default();
    let result = run_classify(&message, &snapshot, "unused").expect("classification");

    assert_eq!(result.primary_intent, IntentLabel::ClaimNew);
    assert_eq!(result.product_line, ProductLine::Auto);
    assert_eq!(result.urgency, Urgency::High);
    assert_eq!(result.mode, PipelineMode::Baseline);
    assert!(result.model_id.is_none());
}

#[test]
fn baseline_gdpr_beats_legal_by_priority() {
    let message = normalized(
        "Auskunft",
        "Auskunftsersuchen gemäß DSGVO. Meine Anwältin ist informiert.",
    );
    let result =
        run_classify(&message, &ConfigSnapshot::default(), "unused").expect("classification");
    assert_eq!(result.primary_intent, IntentLabel::GdprRequest);
    assert!(result.intents.iter().any(|intent| intent.label == IntentLabel::Legal));
}

#[test]
fn baseline_falls_back_to_general_inquiry() {
    let message = normalized("Hallo", "Nur ein freundlicher Gruß.");
    let result =
        run_classify(&message, &ConfigSnapshot::default(), "unused").expect("classification");
    assert_eq!(result.primary_intent, IntentLabel::GeneralInquiry);
}

// ============================================================================
// SECTION: LLM-First Gates
// ============================================================================

/// Snapshot in LLM_FIRST mode.
fn llm_first_snapshot() -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.mode = PipelineMode::LlmFirst;
    snapshot
}

#[test]
fn determinism_cache_miss_fails_closed() {
    let mut snapshot = llm_first_snapshot();
    snapshot.determinism_mode = true;
    let message = normalized("Unfall", "Gestern ein Unfall auf der A2.");
    let err = run_classify(&message, &snapshot, "irrelevant").unwrap_err();
    assert_eq!(err.kind, ErrorKind::DeterminismViolation);
    assert_eq!(err.reason, "determinism_cache_miss");
}

#[test]
fn accepted_llm_result_carries_model_provenance() {
    let snapshot = llm_first_snapshot();
    let message = normalized("Unfall gestern A2", "Gestern ein Unfall auf der A2 passiert.");
    let answer = llm_answer(&message, "INTENT_CLAIM_NEW", "Unfall");
    let result = run_classify(&message, &snapshot, &answer).expect("accepted");

    assert_eq!(result.primary_intent, IntentLabel::ClaimNew);
    assert!(result.model_id.is_some());
    assert!(result.prompt_sha256.is_some());
}

#[test]
fn invalid_json_fails_closed_after_repair_attempt() {
    let snapshot = llm_first_snapshot();
    let message = normalized("Unfall", "Gestern ein Unfall auf der A2.");
    let err = run_classify(&message, &snapshot, "this is not json").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(err.reason.starts_with("llm_rejected"));
}

#[test]
fn non_canonical_label_is_rejected() {
    let snapshot = llm_first_snapshot();
    let message = normalized("Unfall", "Gestern ein Unfall auf der A2.");
    let answer = json!({
        "intents": [{"label": "INTENT_SOMETHING", "confidence": 0.9, "evidence": []}],
        "primary_intent": "INTENT_SOMETHING",
        "product_line": {"label": "PROD_AUTO", "confidence": 0.8},
        "urgency": {"label": "URG_HIGH", "confidence": 0.8},
        "risk_flags": [],
    })
    .to_string();
    let err = run_classify(&message, &snapshot, &answer).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[test]
fn fabricated_evidence_is_rejected() {
    let snapshot = llm_first_snapshot();
    let message = normalized("Unfall gestern A2", "Gestern ein Unfall auf der A2 passiert.");
    let answer = json!({
        "intents": [{
            "label": "INTENT_CLAIM_NEW",
            "confidence": 0.9,
            "evidence": [{"source": "BODY", "start": 0, "end": 6, "snippet": "Betrug"}],
        }],
        "primary_intent": "INTENT_CLAIM_NEW",
        "product_line": {
            "label": "PROD_AUTO",
            "confidence": 0.8,
            "evidence": [{"source": "BODY", "start": 0, "end": 6, "snippet": "Betrug"}],
        },
        "urgency": {
            "label": "URG_HIGH",
            "confidence": 0.8,
            "evidence": [{"source": "BODY", "start": 0, "end": 6, "snippet": "Betrug"}],
        },
        "risk_flags": [],
    })
    .to_string();
    let err = run_classify(&message, &snapshot, &answer).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(err.reason.contains("evidence"));
}

#[test]
fn low_confidence_primary_is_rejected() {
    let snapshot = llm_first_snapshot();
    let message = normalized("Unfall gestern A2", "Gestern ein Unfall auf der A2 passiert.");
    let mut answer: serde_json::Value =
        serde_json::from_str(&llm_answer(&message, "INTENT_CLAIM_NEW", "Unfall"))
            .expect("answer json");
    answer["intents"][0]["confidence"] = json!(0.5);
    let err = run_classify(&message, &snapshot, &answer.to_string()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[test]
fn rule_disagreement_forces_review() {
    let snapshot = llm_first_snapshot();
    // Deterministic rules assert a cancellation with confidence 0.9; the
    // model claims a coverage question instead.
    let message = normalized("Kündigung", "Hiermit möchte ich meinen Vertrag kündigen.");
    let answer = llm_answer(&message, "INTENT_COVERAGE_QUESTION", "kündigen");
    let err = run_classify(&message, &snapshot, &answer).unwrap_err();
    assert_eq!(err.reason, "rule_disagreement");
}

#[test]
fn llm_risk_additions_never_remove_prescan_flags() {
    let snapshot = llm_first_snapshot();
    let message = normalized(
        "Unfall gestern A2",
        "Gestern ein Unfall auf der A2 passiert. Ich werde rechtliche Schritte einleiten.",
    );
    // The model reports no risks at all; prescan found a legal threat.
    let answer = llm_answer(&message, "INTENT_CLAIM_NEW", "Unfall");
    let result = run_classify(&message, &snapshot, &answer);
    // Either accepted with the prescan flag intact, or rejected; it must
    // never be accepted without the flag.
    if let Ok(result) = result {
        assert!(result.risk_flags.iter().any(|finding| finding.flag == RiskFlag::LegalThreat));
    }
}
