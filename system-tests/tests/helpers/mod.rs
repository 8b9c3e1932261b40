// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: In-memory adapters and harness wiring for end-to-end suites.
// ============================================================================
//! ## Overview
//! Deterministic fakes for every external collaborator plus a harness that
//! wires an orchestrator over in-memory stores.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers; each suite uses a subset."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use intake_routing_core::ArtifactRef;
use intake_routing_core::AttachmentId;
use intake_routing_core::AvStatus;
use intake_routing_core::ConfigSnapshot;
use intake_routing_core::EntityId;
use intake_routing_core::HashDigest;
use intake_routing_core::IncomingAttachment;
use intake_routing_core::IngestMessage;
use intake_routing_core::JobId;
use intake_routing_core::MessageId;
use intake_routing_core::Orchestrator;
use intake_routing_core::ParsedEmail;
use intake_routing_core::RawMimeRef;
use intake_routing_core::SharedArtifactStore;
use intake_routing_core::SharedAttachmentStore;
use intake_routing_core::SharedAuditStore;
use intake_routing_core::SharedInferenceCache;
use intake_routing_core::SharedMetrics;
use intake_routing_core::ThreadKeys;
use intake_routing_core::Timestamp;
use intake_routing_core::identity::CandidateStatus;
use intake_routing_core::inference::InferenceParams;
use intake_routing_core::interfaces::AttachmentStore;
use intake_routing_core::interfaces::AvScanner;
use intake_routing_core::interfaces::CaseAdapter;
use intake_routing_core::interfaces::CaseError;
use intake_routing_core::interfaces::CaseReceipt;
use intake_routing_core::interfaces::DirectoryAdapter;
use intake_routing_core::interfaces::DirectoryError;
use intake_routing_core::interfaces::DirectoryRecord;
use intake_routing_core::interfaces::LlmError;
use intake_routing_core::interfaces::LlmProvider;
use intake_routing_core::interfaces::ScanError;
use intake_routing_core::interfaces::ScanVerdict;
use intake_routing_core::interfaces::TextExtractError;
use intake_routing_core::interfaces::TextExtractor;
use intake_routing_core::registry::EntityType;
use intake_routing_core::runtime::InMemoryArtifactStore;
use intake_routing_core::runtime::InMemoryAttachmentStore;
use intake_routing_core::runtime::InMemoryAuditStore;
use intake_routing_core::runtime::InMemoryInferenceCache;
use intake_routing_config::LoadedRuleset;

// ============================================================================
// SECTION: Fake Directory
// ============================================================================

/// In-memory directory adapter.
#[derive(Default, Clone)]
pub struct FakeDirectory {
    /// Records keyed by entity id.
    records: BTreeMap<String, DirectoryRecord>,
}

impl FakeDirectory {
    /// Registers a policy record.
    #[must_use]
    pub fn with_policy(mut self, id: &str, status: CandidateStatus) -> Self {
        self.records.insert(id.to_string(), DirectoryRecord {
            entity_type: EntityType::Policy,
            entity_id: EntityId::new(id),
            status,
            email: None,
            display_name: None,
        });
        self
    }

    /// Registers a claim record.
    #[must_use]
    pub fn with_claim(mut self, id: &str, status: CandidateStatus) -> Self {
        self.records.insert(id.to_string(), DirectoryRecord {
            entity_type: EntityType::Claim,
            entity_id: EntityId::new(id),
            status,
            email: None,
            display_name: None,
        });
        self
    }
}

impl DirectoryAdapter for FakeDirectory {
    fn lookup_policy(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        Ok(self.records.get(id.as_str()).cloned())
    }

    fn lookup_claim(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        Ok(self.records.get(id.as_str()).cloned())
    }

    fn lookup_customer(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        Ok(self.records.get(id.as_str()).cloned())
    }

    fn lookup_customer_by_email(
        &self,
        _email: &str,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// SECTION: Fake Scanner and OCR
// ============================================================================

/// AV scanner with per-hash verdicts; unknown hashes scan clean.
#[derive(Default, Clone)]
pub struct FakeScanner {
    /// Verdicts keyed by hex digest.
    verdicts: BTreeMap<String, AvStatus>,
}

impl FakeScanner {
    /// Registers a verdict for attachment bytes.
    #[must_use]
    pub fn with_verdict(mut self, bytes: &[u8], status: AvStatus) -> Self {
        let digest = HashDigest::of_bytes(bytes);
        self.verdicts.insert(digest.as_hex().to_string(), status);
        self
    }
}

impl AvScanner for FakeScanner {
    fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ScanError> {
        let digest = HashDigest::of_bytes(bytes);
        Ok(ScanVerdict {
            status: self.verdicts.get(digest.as_hex()).copied().unwrap_or(AvStatus::Clean),
            scanner_version: "fake-av-1".to_string(),
        })
    }
}

/// OCR engine that treats attachment bytes as UTF-8 text.
#[derive(Default, Clone)]
pub struct FakeOcr;

impl TextExtractor for FakeOcr {
    fn extract(
        &self,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<intake_routing_core::interfaces::ExtractedText, TextExtractError> {
        Ok(intake_routing_core::interfaces::ExtractedText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            confidence: 0.99,
        })
    }
}

// ============================================================================
// SECTION: Scripted LLM
// ============================================================================

/// LLM stub answering by prompt kind.
#[derive(Clone)]
pub struct ScriptedLlm {
    /// Response to classification prompts.
    pub classify_json: String,
    /// Response to extraction prompts.
    pub extract_json: String,
    /// Response to identity-assist prompts.
    pub assist_json: String,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self {
            classify_json: "{}".to_string(),
            extract_json: "{\"entities\": []}".to_string(),
            assist_json: "{\"candidate_keys\": []}".to_string(),
        }
    }
}

impl LlmProvider for ScriptedLlm {
    fn infer(&self, prompt: &str, _params: &InferenceParams) -> Result<String, LlmError> {
        if prompt.contains("classifier") {
            Ok(self.classify_json.clone())
        } else if prompt.contains("extractor") {
            Ok(self.extract_json.clone())
        } else {
            Ok(self.assist_json.clone())
        }
    }
}

// ============================================================================
// SECTION: Recording Case Adapter
// ============================================================================

/// Case adapter recording every call.
#[derive(Default, Clone)]
pub struct RecordingCase {
    /// Created case payload log.
    pub created: Arc<Mutex<Vec<String>>>,
}

impl CaseAdapter for RecordingCase {
    fn create_or_update(
        &self,
        idempotency_key: &JobId,
        _payload: &serde_json::Value,
    ) -> Result<CaseReceipt, CaseError> {
        self.created.lock().expect("lock").push(idempotency_key.as_str().to_string());
        Ok(CaseReceipt {
            case_id: format!("case-{idempotency_key}"),
            created: true,
        })
    }

    fn attach(&self, _case_id: &str, _artifact: &ArtifactRef) -> Result<(), CaseError> {
        Ok(())
    }

    fn add_draft(&self, _case_id: &str, _artifact: &ArtifactRef) -> Result<(), CaseError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Fully wired pipeline harness over in-memory stores.
pub struct Harness {
    /// Orchestrator under test.
    pub orchestrator: Orchestrator<FakeDirectory, FakeScanner, FakeOcr, ScriptedLlm, RecordingCase>,
    /// Shared artifact store handle.
    pub artifacts: InMemoryArtifactStore,
    /// Shared audit store handle.
    pub audit: InMemoryAuditStore,
    /// Shared attachment store handle.
    pub attachment_store: InMemoryAttachmentStore,
}

impl Harness {
    /// Builds a harness from configuration, ruleset, and adapters.
    #[must_use]
    pub fn new(
        snapshot: ConfigSnapshot,
        ruleset: LoadedRuleset,
        directory: FakeDirectory,
        scanner: FakeScanner,
        llm: ScriptedLlm,
        case: Option<RecordingCase>,
    ) -> Self {
        let artifacts = InMemoryArtifactStore::new();
        let audit = InMemoryAuditStore::new();
        let attachment_store = InMemoryAttachmentStore::new();
        let orchestrator = Orchestrator::new(
            snapshot,
            "intake-routing.toml",
            ruleset.ruleset,
            &ruleset.ruleset_ref.path,
            directory,
            scanner,
            FakeOcr,
            llm,
            case,
            SharedInferenceCache::from_cache(InMemoryInferenceCache::new()),
            SharedArtifactStore::from_store(artifacts.clone()),
            SharedAuditStore::from_store(audit.clone()),
            SharedAttachmentStore::from_store(attachment_store.clone()),
            SharedMetrics::noop(),
        )
        .expect("orchestrator construction");
        Self {
            orchestrator,
            artifacts,
            audit,
            attachment_store,
        }
    }

    /// Builds an ingest message, storing attachment bytes first.
    #[must_use]
    pub fn message(
        &self,
        message_id: &str,
        subject: &str,
        body: &str,
        attachments: &[(&str, &[u8])],
    ) -> IngestMessage {
        let mut incoming = Vec::new();
        for (index, (filename, bytes)) in attachments.iter().enumerate() {
            let sha256: HashDigest = self.attachment_store.put(bytes).expect("store attachment");
            incoming.push(IncomingAttachment {
                attachment_id: AttachmentId::new(format!("att-{index}")),
                sha256,
                filename: (*filename).to_string(),
                content_type: "application/octet-stream".to_string(),
            });
        }
        IngestMessage {
            message_id: MessageId::new(message_id),
            raw_mime: RawMimeRef {
                sha256: HashDigest::of_bytes(body.as_bytes()),
                source_id: "mailbox-1".to_string(),
                source_message_id: format!("src-{message_id}"),
                uri: format!("mail://mailbox-1/{message_id}"),
            },
            email: ParsedEmail {
                subject: subject.to_string(),
                body_text: body.to_string(),
                from: "kunde@example.com".to_string(),
                from_display_name: Some("Max Mustermann".to_string()),
                to: vec!["intake@insurer.example".to_string()],
                cc: Vec::new(),
                thread: ThreadKeys::default(),
            },
            attachments: incoming,
            ingestion_source: "m365".to_string(),
            ingested_at: Timestamp::from_unix_millis(1),
        }
    }
}

/// Builds a classification answer asserting one intent with verified body
/// evidence for the given needle.
#[must_use]
pub fn classify_answer(body_c14n: &str, label: &str, product: &str, needle: &str) -> String {
    let start = body_c14n.find(needle).expect("needle present in canonical body");
    let end = start + needle.len();
    serde_json::json!({
        "intents": [{
            "label": label,
            "confidence": 0.92,
            "evidence": [{"source": "BODY", "start": start, "end": end, "snippet": needle}],
        }],
        "primary_intent": label,
        "product_line": {
            "label": product,
            "confidence": 0.85,
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
