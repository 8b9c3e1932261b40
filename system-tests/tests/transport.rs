// system-tests/tests/transport.rs
// ============================================================================
// Module: Transport End-to-End Tests
// Description: Broker delivery and mail-ingest cursor semantics.
// ============================================================================
//! ## Overview
//! Exercises the at-least-once broker contract around the pipeline: dequeued
//! jobs process and acknowledge, negative acknowledgement redelivers, and
//! dead-lettered jobs stay inspectable. A minimal mail source checks the
//! durable-cursor surface.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions are permitted."
)]

mod helpers;

use std::collections::BTreeMap;
use std::collections::VecDeque;

use helpers::FakeDirectory;
use helpers::FakeScanner;
use helpers::Harness;
use helpers::ScriptedLlm;
use intake_routing_core::BrokerJob;
use intake_routing_core::ConfigSnapshot;
use intake_routing_core::JobId;
use intake_routing_core::QueueId;
use intake_routing_core::RunId;
use intake_routing_core::Timestamp;
use intake_routing_core::interfaces::Broker;
use intake_routing_core::interfaces::MailIngest;
use intake_routing_core::interfaces::MailIngestError;
use intake_routing_core::interfaces::RawMailMessage;
use intake_routing_core::runtime::InMemoryBroker;
use intake_routing_config::default_ruleset;

/// Minimal mail source over a queue of raw messages.
struct VecMailSource {
    /// Pending messages.
    pending: VecDeque<RawMailMessage>,
    /// Committed cursor positions.
    committed: Vec<String>,
}

impl VecMailSource {
    fn new(messages: Vec<RawMailMessage>) -> Self {
        Self {
            pending: messages.into(),
            committed: Vec::new(),
        }
    }
}

impl MailIngest for VecMailSource {
    fn next_message(&mut self) -> Result<Option<RawMailMessage>, MailIngestError> {
        Ok(self.pending.pop_front())
    }

    fn commit(&mut self, source_message_id: &str) -> Result<(), MailIngestError> {
        self.committed.push(source_message_id.to_string());
        Ok(())
    }
}

#[test]
fn dequeued_jobs_process_and_acknowledge() {
    let harness = Harness::new(
        ConfigSnapshot::default(),
        default_ruleset().expect("default ruleset"),
        FakeDirectory::default(),
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message = harness.message("msg-broker-1", "Frage", "Eine allgemeine Frage.", &[]);

    let broker = InMemoryBroker::new();
    broker
        .enqueue(BrokerJob {
            job_id: JobId::new("job-1"),
            message: message.clone(),
        })
        .expect("enqueue");

    let (job, token) = broker.dequeue().expect("dequeue").expect("job available");
    let outcome = harness
        .orchestrator
        .process(&job.message, &RunId::new("run-1"), Timestamp::from_unix_millis(10))
        .expect("run");
    assert_eq!(outcome.routing.queue_id, QueueId::IntakeReviewGeneral);
    broker.ack(token).expect("ack");

    assert!(broker.dequeue().expect("dequeue").is_none(), "queue drained");
    assert!(broker.dead_letters().expect("dead letters").is_empty());
}

#[test]
fn nack_redelivers_and_dead_letter_parks_the_job() {
    let broker = InMemoryBroker::new();
    let harness = Harness::new(
        ConfigSnapshot::default(),
        default_ruleset().expect("default ruleset"),
        FakeDirectory::default(),
        FakeScanner::default(),
        ScriptedLlm::default(),
        None,
    );
    let message = harness.message("msg-broker-2", "Frage", "Noch eine Frage.", &[]);
    broker
        .enqueue(BrokerJob {
            job_id: JobId::new("job-2"),
            message,
        })
        .expect("enqueue");

    // First delivery is rejected for redelivery.
    let (_, token) = broker.dequeue().expect("dequeue").expect("first delivery");
    broker.nack(token, false).expect("nack");

    // Redelivered, then dead-lettered.
    let (job, token) = broker.dequeue().expect("dequeue").expect("redelivery");
    assert_eq!(job.job_id.as_str(), "job-2");
    broker.nack(token, true).expect("dead letter");

    assert!(broker.dequeue().expect("dequeue").is_none());
    let dead = broker.dead_letters().expect("dead letters");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].job_id.as_str(), "job-2");
}

#[test]
fn mail_cursor_advances_only_on_commit() {
    let raw = RawMailMessage {
        raw_mime_bytes: b"From: kunde@example.com\r\nSubject: Frage\r\n\r\nHallo".to_vec(),
        source_metadata: BTreeMap::from([("mailbox".to_string(), "intake".to_string())]),
        source_message_id: "src-100".to_string(),
    };
    let mut source = VecMailSource::new(vec![raw]);

    let delivered = source.next_message().expect("next").expect("message");
    assert_eq!(delivered.source_message_id, "src-100");
    assert!(source.committed.is_empty(), "no cursor movement before commit");

    source.commit(&delivered.source_message_id).expect("commit");
    assert_eq!(source.committed, vec!["src-100".to_string()]);
    assert!(source.next_message().expect("next").is_none());
}
