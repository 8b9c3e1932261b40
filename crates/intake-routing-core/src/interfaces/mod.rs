// crates/intake-routing-core/src/interfaces/mod.rs
// ============================================================================
// Module: External Interfaces
// Description: Backend-agnostic interfaces for directories, stores, and providers.
// Purpose: Define the contract surfaces the deterministic core depends on.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the decision core integrates with its external
//! collaborators without embedding backend details. Implementations must be
//! deterministic from the core's point of view and fail closed on missing or
//! invalid data. Every method on these traits is a suspension point in the
//! concurrency model; the core itself never blocks elsewhere.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::ArtifactRef;
use crate::core::AuditEvent;
use crate::core::AvStatus;
use crate::core::EntityId;
use crate::core::HashDigest;
use crate::core::IngestMessage;
use crate::core::JobId;
use crate::core::MessageId;
use crate::core::RunId;
use crate::core::Stage;
use crate::core::identity::CandidateStatus;
use crate::core::inference::InferenceParams;
use crate::core::registry::EntityType;

// ============================================================================
// SECTION: Mail Ingest
// ============================================================================

/// Raw message yielded by a mail source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMailMessage {
    /// Raw MIME bytes.
    pub raw_mime_bytes: Vec<u8>,
    /// Source metadata (mailbox, folder, connector labels).
    pub source_metadata: BTreeMap<String, String>,
    /// Source-assigned message identifier.
    pub source_message_id: String,
}

/// Mail ingest errors.
#[derive(Debug, Error)]
pub enum MailIngestError {
    /// Source reported an error.
    #[error("mail ingest error: {0}")]
    Source(String),
}

/// Mail source with durable cursor semantics.
pub trait MailIngest {
    /// Returns the next raw message, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MailIngestError`] when the source fails.
    fn next_message(&mut self) -> Result<Option<RawMailMessage>, MailIngestError>;

    /// Durably advances the cursor past a processed message.
    ///
    /// # Errors
    ///
    /// Returns [`MailIngestError`] when the cursor write fails.
    fn commit(&mut self, source_message_id: &str) -> Result<(), MailIngestError>;
}

// ============================================================================
// SECTION: Attachment Store
// ============================================================================

/// Attachment store errors.
#[derive(Debug, Error)]
pub enum AttachmentStoreError {
    /// Store reported an error.
    #[error("attachment store error: {0}")]
    Store(String),
    /// Requested content hash is unknown.
    #[error("attachment not found: {0}")]
    NotFound(String),
}

/// Append-only content-addressed attachment store.
pub trait AttachmentStore {
    /// Stores bytes and returns their content hash.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentStoreError`] when the write fails.
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, AttachmentStoreError>;

    /// Fetches bytes by content hash.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentStoreError::NotFound`] for unknown hashes.
    fn get(&self, sha256: &HashDigest) -> Result<Vec<u8>, AttachmentStoreError>;
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Outcome of an idempotent artifact write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Artifact bytes were written.
    Written,
    /// An artifact with this reference already existed; nothing was written.
    AlreadyPresent,
}

/// Artifact store errors.
#[derive(Debug, Error)]
pub enum ArtifactStoreError {
    /// Store reported an error.
    #[error("artifact store error: {0}")]
    Store(String),
    /// Requested artifact is unknown.
    #[error("artifact not found: {0}")]
    NotFound(String),
    /// Stored bytes do not match the reference hash.
    #[error("artifact integrity violation: {0}")]
    Integrity(String),
}

/// Immutable, content-addressed artifact store.
///
/// # Invariants
/// - Writes are write-if-absent; prior artifacts are never overwritten.
pub trait ArtifactStore {
    /// Writes artifact bytes unless the reference already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the write fails or the bytes do
    /// not match the reference hash.
    fn put_if_absent(
        &self,
        artifact_ref: &ArtifactRef,
        bytes: &[u8],
    ) -> Result<PutOutcome, ArtifactStoreError>;

    /// Fetches artifact bytes by reference.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError::NotFound`] for unknown references.
    fn get(&self, artifact_ref: &ArtifactRef) -> Result<Vec<u8>, ArtifactStoreError>;

    /// Lists artifact references for a message and stage.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactStoreError`] when the listing fails.
    fn list(&self, message_id: &MessageId, stage: Stage)
    -> Result<Vec<ArtifactRef>, ArtifactStoreError>;
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// Audit store errors.
#[derive(Debug, Error)]
pub enum AuditStoreError {
    /// Store reported an error.
    #[error("audit store error: {0}")]
    Store(String),
    /// Append would break the chain linkage.
    #[error("audit chain linkage violation: {0}")]
    Linkage(String),
}

/// Append-only audit store keyed by `(message_id, run_id)`.
pub trait AuditStore {
    /// Appends an event to a chain. The write is acknowledged only after it
    /// is durable.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError`] when the append fails or the event does
    /// not link to the current chain head.
    fn append(
        &self,
        message_id: &MessageId,
        run_id: &RunId,
        event: AuditEvent,
    ) -> Result<(), AuditStoreError>;

    /// Reads the full chain for a message and run.
    ///
    /// # Errors
    ///
    /// Returns [`AuditStoreError`] when the read fails.
    fn read_chain(
        &self,
        message_id: &MessageId,
        run_id: &RunId,
    ) -> Result<Vec<AuditEvent>, AuditStoreError>;
}

// ============================================================================
// SECTION: Broker
// ============================================================================

/// Job delivered through the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerJob {
    /// Deterministic job identifier for idempotency.
    pub job_id: JobId,
    /// Ingest message carried by the job.
    pub message: IngestMessage,
}

/// Opaque acknowledgement token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken(pub String);

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Broker reported an error.
    #[error("broker error: {0}")]
    Broker(String),
}

/// Durable at-least-once job broker.
pub trait Broker {
    /// Enqueues a job durably.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the enqueue fails.
    fn enqueue(&self, job: BrokerJob) -> Result<(), BrokerError>;

    /// Dequeues the next job, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the dequeue fails.
    fn dequeue(&self) -> Result<Option<(BrokerJob, AckToken)>, BrokerError>;

    /// Acknowledges a processed job.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the acknowledge fails.
    fn ack(&self, token: AckToken) -> Result<(), BrokerError>;

    /// Rejects a job, optionally dead-lettering it.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the reject fails.
    fn nack(&self, token: AckToken, dead_letter: bool) -> Result<(), BrokerError>;
}

// ============================================================================
// SECTION: Directory Adapter
// ============================================================================

/// Directory record returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity identifier.
    pub entity_id: EntityId,
    /// Lifecycle status.
    pub status: CandidateStatus,
    /// Primary email address on file, when known.
    pub email: Option<String>,
    /// Display name on file, when known.
    pub display_name: Option<String>,
}

/// Directory adapter errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Directory is unavailable (transient).
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    /// Directory rejected the query.
    #[error("directory query rejected: {0}")]
    Rejected(String),
}

/// CRM / policy / claims directory lookups.
pub trait DirectoryAdapter {
    /// Looks up a policy by number.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup fails.
    fn lookup_policy(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError>;

    /// Looks up a claim by number.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup fails.
    fn lookup_claim(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError>;

    /// Looks up a customer by number.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup fails.
    fn lookup_customer(&self, id: &EntityId) -> Result<Option<DirectoryRecord>, DirectoryError>;

    /// Looks up customers by email address.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup fails.
    fn lookup_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError>;
}

// ============================================================================
// SECTION: AV Scanner
// ============================================================================

/// Scan verdict stamped on an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanVerdict {
    /// Antivirus status.
    pub status: AvStatus,
    /// Scanner version string.
    pub scanner_version: String,
}

/// AV scanner errors.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Scanner is unavailable (transient).
    #[error("av scanner unavailable: {0}")]
    Unavailable(String),
}

/// Antivirus scanner.
pub trait AvScanner {
    /// Scans attachment bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when the scanner cannot be reached; a completed
    /// scan that found problems reports them through the verdict status.
    fn scan(&self, bytes: &[u8]) -> Result<ScanVerdict, ScanError>;
}

// ============================================================================
// SECTION: Text Extraction / OCR
// ============================================================================

/// Extracted text with confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Extracted plain text.
    pub text: String,
    /// Extraction confidence in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Text extraction errors.
#[derive(Debug, Error)]
pub enum TextExtractError {
    /// Extractor is unavailable (transient).
    #[error("text extractor unavailable: {0}")]
    Unavailable(String),
    /// Content type is not extractable.
    #[error("unsupported content type: {0}")]
    Unsupported(String),
}

/// Text extractor / OCR engine.
pub trait TextExtractor {
    /// Extracts text from attachment bytes.
    ///
    /// # Errors
    ///
    /// Returns [`TextExtractError`] when extraction fails.
    fn extract(&self, bytes: &[u8], content_type: &str)
    -> Result<ExtractedText, TextExtractError>;
}

// ============================================================================
// SECTION: LLM Provider
// ============================================================================

/// LLM provider errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Provider is unavailable (transient).
    #[error("llm provider unavailable: {0}")]
    Unavailable(String),
    /// Provider rejected the request.
    #[error("llm request rejected: {0}")]
    Rejected(String),
}

/// LLM provider accepting deterministic parameters only.
pub trait LlmProvider {
    /// Runs one inference and returns the raw completion text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] when the provider fails.
    fn infer(&self, prompt: &str, params: &InferenceParams) -> Result<String, LlmError>;
}

// ============================================================================
// SECTION: Case Adapter
// ============================================================================

/// Receipt returned by the case system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReceipt {
    /// Case identifier in the case system.
    pub case_id: String,
    /// True when the call created a new case.
    pub created: bool,
}

/// Case adapter errors.
#[derive(Debug, Error)]
pub enum CaseError {
    /// Case system is unavailable (transient).
    #[error("case system unavailable: {0}")]
    Unavailable(String),
    /// Case system rejected the payload.
    #[error("case payload rejected: {0}")]
    Rejected(String),
}

/// Case / ticket system adapter.
pub trait CaseAdapter {
    /// Creates or updates a case idempotently.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError`] when the call fails.
    fn create_or_update(
        &self,
        idempotency_key: &JobId,
        payload: &Value,
    ) -> Result<CaseReceipt, CaseError>;

    /// Attaches an artifact to a case.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError`] when the call fails.
    fn attach(&self, case_id: &str, artifact: &ArtifactRef) -> Result<(), CaseError>;

    /// Adds a draft (e.g. a request-for-information email) to a case.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError`] when the call fails.
    fn add_draft(&self, case_id: &str, artifact: &ArtifactRef) -> Result<(), CaseError>;
}
