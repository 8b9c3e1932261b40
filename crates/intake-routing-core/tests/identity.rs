// crates/intake-routing-core/tests/identity.rs
// ============================================================================
// Module: Identity Resolution Tests
// Description: Verifies scoring, ranking, thresholds, and degraded outcomes.
// ============================================================================
//! ## Overview
//! Exercises the identity resolver against an in-memory directory: hard
//! signal confirmation, near-tie ambiguity, directory outages, lexicographic
//! tie-breaking, and the shared-mailbox penalty.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use intake_routing_core::ConfigSnapshot;
use intake_routing_core::HashDigest;
use intake_routing_core::EntityId;
use intake_routing_core::IdentityStatus;
use intake_routing_core::IngestMessage;
use intake_routing_core::MessageId;
use intake_routing_core::ParsedEmail;
use intake_routing_core::RawMimeRef;
use intake_routing_core::ThreadKeys;
use intake_routing_core::Timestamp;
use intake_routing_core::identity::CandidateStatus;
use intake_routing_core::interfaces::DirectoryAdapter;
use intake_routing_core::interfaces::DirectoryError;
use intake_routing_core::interfaces::DirectoryRecord;
use intake_routing_core::registry::EntityType;
use intake_routing_core::runtime::IdentityInputs;
use intake_routing_core::runtime::NoopBackoff;
use intake_routing_core::runtime::RetryPolicy;
use intake_routing_core::runtime::identity::resolve;
use intake_routing_core::runtime::normalize;

// ============================================================================
// SECTION: Test Directory
// ============================================================================

/// In-memory directory with an availability switch.
#[derive(Default)]
struct TestDirectory {
    /// Records keyed by entity id.
    records: BTreeMap<String, DirectoryRecord>,
    /// Records keyed by email address.
    by_email: BTreeMap<String, Vec<DirectoryRecord>>,
    /// When true, every call fails as unavailable.
    unavailable: Mutex<bool>,
}

impl TestDirectory {
    fn with_policy(mut self, id: &str, status: CandidateStatus) -> Self {
        self.records.insert(id.to_string(), DirectoryRecord {
            entity_type: EntityType::Policy,
            entity_id: EntityId::new(id),
            status,
            email: None,
            display_name: None,
        });
        self
    }

    fn lookup(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        if *self.unavailable.lock().expect("lock") {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        Ok(self.records.get(id.as_str()).cloned())
    }
}

impl DirectoryAdapter for TestDirectory {
    fn lookup_policy(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        self.lookup(id)
    }

    fn lookup_claim(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        self.lookup(id)
    }

    fn lookup_customer(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        self.lookup(id)
    }

    fn lookup_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        if *self.unavailable.lock().expect("lock") {
            return Err(DirectoryError::Unavailable("directory offline".to_string()));
        }
        Ok(self.by_email.get(email).cloned().unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a normalized message with the given subject and body.
fn normalized(subject: &str, body: &str) -> intake_routing_core::NormalizedMessage {
    let message = IngestMessage {
        message_id: MessageId::new("msg-identity"),
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

/// Runs the resolver with default config against the given directory.
fn run_resolve(
    normalized: &intake_routing_core::NormalizedMessage,
    directory: &TestDirectory,
    snapshot: &ConfigSnapshot,
) -> intake_routing_core::IdentityResolutionResult {
    let inputs = IdentityInputs {
        normalized,
        attachment_texts: &[],
        assist_proposals: &[],
        thread_entities: &[],
        claim_related_hint: false,
    };
    let retry = RetryPolicy::from_io(&snapshot.io);
    resolve(&inputs, snapshot, directory, &retry, &NoopBackoff).expect("resolve")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn validated_policy_number_confirms_identity() {
    let directory =
        TestDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    let message = normalized("Unfall gestern A2", "Meine Police POL-2024-00012345, bitte melden.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());

    assert_eq!(result.status, IdentityStatus::Confirmed);
    let selected = result.selected().expect("selected");
    assert_eq!(selected.entity_type, EntityType::Policy);
    assert_eq!(selected.entity_id.as_str(), "POL-2024-00012345");
    assert!(selected.has_hard_signal());
}

#[test]
fn invalid_policy_year_yields_no_candidate() {
    let directory = TestDirectory::default();
    let message = normalized("Frage", "Referenz POL-1817-00012345 ohne Bedeutung.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());
    assert_eq!(result.status, IdentityStatus::NoCandidate);
}

#[test]
fn near_tie_without_margin_never_confirms() {
    let directory = TestDirectory::default()
        .with_policy("POL-2024-00012345", CandidateStatus::Active)
        .with_policy("POL-2024-00054321", CandidateStatus::Active);
    let message = normalized(
        "Zwei Verträge",
        "Es geht um POL-2024-00012345 oder POL-2024-00054321, ich bin unsicher.",
    );
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());

    assert_eq!(result.top_k.len(), 2);
    assert_ne!(result.status, IdentityStatus::Confirmed);
    assert_eq!(result.status, IdentityStatus::NeedsReview);
}

#[test]
fn tie_breaks_lexicographically_on_entity_id() {
    let directory = TestDirectory::default()
        .with_policy("POL-2024-00012345", CandidateStatus::Active)
        .with_policy("POL-2024-00054321", CandidateStatus::Active);
    let message =
        normalized("Zwei Verträge", "POL-2024-00054321 und POL-2024-00012345 genannt.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());
    assert_eq!(result.top_k[0].entity_id.as_str(), "POL-2024-00012345");
}

#[test]
fn active_status_outranks_closed() {
    let directory = TestDirectory::default()
        .with_policy("POL-2024-00012345", CandidateStatus::Closed)
        .with_policy("POL-2024-00054321", CandidateStatus::Active);
    let message =
        normalized("Zwei Verträge", "POL-2024-00012345 und POL-2024-00054321 genannt.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());
    assert_eq!(result.top_k[0].entity_id.as_str(), "POL-2024-00054321");
}

#[test]
fn directory_outage_degrades_to_needs_review() {
    let directory =
        TestDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    *directory.unavailable.lock().expect("lock") = true;
    let message = normalized("Unfall", "Meine Police POL-2024-00012345.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());

    assert_eq!(result.status, IdentityStatus::NeedsReview);
    assert_eq!(result.reason.as_deref(), Some("directory_unavailable"));
}

#[test]
fn unknown_identifier_is_downgraded_to_medium() {
    // Pattern-valid but absent from the directory: medium at best.
    let directory = TestDirectory::default();
    let message = normalized("Frage", "Meine Police POL-2024-00012345.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());

    let top = result.selected().expect("candidate");
    assert!(!top.has_hard_signal());
    assert_ne!(result.status, IdentityStatus::Confirmed);
}

#[test]
fn shared_mailbox_penalty_reduces_the_score() {
    let directory =
        TestDirectory::default().with_policy("POL-2024-00012345", CandidateStatus::Active);
    let mut snapshot = ConfigSnapshot::default();
    snapshot.identity.shared_mailboxes = vec!["kunde@example.com".to_string()];
    snapshot.identity.shared_mailbox_penalty = 0.3;

    let message = normalized("Unfall", "Meine Police POL-2024-00012345.");
    let result = run_resolve(&message, &directory, &snapshot);
    let top = result.selected().expect("candidate");
    assert!((top.score - 0.7).abs() < 1e-9);
}

#[test]
fn empty_message_yields_no_candidate() {
    let directory = TestDirectory::default();
    let message = normalized("Hallo", "Nur ein Gruß ohne Kennungen.");
    let result = run_resolve(&message, &directory, &ConfigSnapshot::default());
    assert_eq!(result.status, IdentityStatus::NoCandidate);
    assert!(result.top_k.is_empty());
}
