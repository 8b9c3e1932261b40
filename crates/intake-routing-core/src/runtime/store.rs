// crates/intake-routing-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Stores
// Description: Deterministic in-memory store implementations.
// Purpose: Provide artifact, audit, attachment, and broker backends for tests
// and embedded use.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! These implementations honor the same contracts durable backends must
//! provide: write-if-absent artifact storage with integrity checks,
//! append-only audit chains with linkage validation, content-addressed
//! attachment bytes, and an at-least-once broker with dead-lettering. They
//! are not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::ArtifactRef;
use crate::core::AuditEvent;
use crate::core::GENESIS_HASH;
use crate::core::HashDigest;
use crate::core::MessageId;
use crate::core::RunId;
use crate::core::Stage;
use crate::interfaces::AckToken;
use crate::interfaces::ArtifactStore;
use crate::interfaces::ArtifactStoreError;
use crate::interfaces::AttachmentStore;
use crate::interfaces::AttachmentStoreError;
use crate::interfaces::AuditStore;
use crate::interfaces::AuditStoreError;
use crate::interfaces::Broker;
use crate::interfaces::BrokerError;
use crate::interfaces::BrokerJob;
use crate::interfaces::PutOutcome;

// ============================================================================
// SECTION: Artifact URIs
// ============================================================================

/// Builds the canonical artifact URI for a message, stage, and name.
#[must_use]
pub fn artifact_uri(message_id: &MessageId, stage: Stage, name: &str) -> String {
    format!("artifact://{message_id}/{}/{name}", stage.label())
}

/// Parses `(message_id, stage_label)` out of a canonical artifact URI.
fn parse_uri(uri: &str) -> Option<(String, String)> {
    let rest = uri.strip_prefix("artifact://")?;
    let mut parts = rest.splitn(3, '/');
    let message_id = parts.next()?.to_string();
    let stage = parts.next()?.to_string();
    parts.next()?;
    Some((message_id, stage))
}

// ============================================================================
// SECTION: In-Memory Artifact Store
// ============================================================================

/// In-memory write-if-absent artifact store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifactStore {
    /// Artifacts keyed by URI.
    entries: Arc<Mutex<BTreeMap<String, (ArtifactRef, Vec<u8>)>>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put_if_absent(
        &self,
        artifact_ref: &ArtifactRef,
        bytes: &[u8],
    ) -> Result<PutOutcome, ArtifactStoreError> {
        let digest = HashDigest::of_bytes(bytes);
        if digest != artifact_ref.sha256 {
            return Err(ArtifactStoreError::Integrity(format!(
                "bytes hash {} does not match reference {}",
                digest.as_hex(), artifact_ref.sha256.as_hex()
            )));
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| ArtifactStoreError::Store("artifact store mutex poisoned".to_string()))?;
        if guard.contains_key(&artifact_ref.uri) {
            return Ok(PutOutcome::AlreadyPresent);
        }
        guard.insert(artifact_ref.uri.clone(), (artifact_ref.clone(), bytes.to_vec()));
        Ok(PutOutcome::Written)
    }

    fn get(&self, artifact_ref: &ArtifactRef) -> Result<Vec<u8>, ArtifactStoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| ArtifactStoreError::Store("artifact store mutex poisoned".to_string()))?;
        guard
            .get(&artifact_ref.uri)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ArtifactStoreError::NotFound(artifact_ref.uri.clone()))
    }

    fn list(
        &self,
        message_id: &MessageId,
        stage: Stage,
    ) -> Result<Vec<ArtifactRef>, ArtifactStoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| ArtifactStoreError::Store("artifact store mutex poisoned".to_string()))?;
        let mut refs = Vec::new();
        for (uri, (artifact_ref, _)) in guard.iter() {
            if let Some((mid, stage_label)) = parse_uri(uri)
                && mid == message_id.as_str()
                && stage_label == stage.label()
            {
                refs.push(artifact_ref.clone());
            }
        }
        Ok(refs)
    }
}

// ============================================================================
// SECTION: In-Memory Audit Store
// ============================================================================

/// In-memory append-only audit store with linkage validation.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStore {
    /// Chains keyed by `(message_id, run_id)`.
    chains: Arc<Mutex<BTreeMap<(String, String), Vec<AuditEvent>>>>,
}

impl InMemoryAuditStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append(
        &self,
        message_id: &MessageId,
        run_id: &RunId,
        event: AuditEvent,
    ) -> Result<(), AuditStoreError> {
        let mut guard = self
            .chains
            .lock()
            .map_err(|_| AuditStoreError::Store("audit store mutex poisoned".to_string()))?;
        let chain = guard
            .entry((message_id.as_str().to_string(), run_id.as_str().to_string()))
            .or_default();
        let expected_prev =
            chain.last().map_or(GENESIS_HASH, |last| last.event_hash.as_str());
        if event.body.prev_event_hash != expected_prev {
            return Err(AuditStoreError::Linkage(format!(
                "expected prev hash {expected_prev}, got {}",
                event.body.prev_event_hash
            )));
        }
        chain.push(event);
        Ok(())
    }

    fn read_chain(
        &self,
        message_id: &MessageId,
        run_id: &RunId,
    ) -> Result<Vec<AuditEvent>, AuditStoreError> {
        let guard = self
            .chains
            .lock()
            .map_err(|_| AuditStoreError::Store("audit store mutex poisoned".to_string()))?;
        Ok(guard
            .get(&(message_id.as_str().to_string(), run_id.as_str().to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// SECTION: In-Memory Attachment Store
// ============================================================================

/// In-memory content-addressed attachment store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAttachmentStore {
    /// Bytes keyed by hex digest.
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryAttachmentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttachmentStore for InMemoryAttachmentStore {
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, AttachmentStoreError> {
        let digest = HashDigest::of_bytes(bytes);
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| AttachmentStoreError::Store("attachment store mutex poisoned".into()))?;
        guard.entry(digest.as_hex().to_string()).or_insert_with(|| bytes.to_vec());
        Ok(digest)
    }

    fn get(&self, sha256: &HashDigest) -> Result<Vec<u8>, AttachmentStoreError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| AttachmentStoreError::Store("attachment store mutex poisoned".into()))?;
        guard
            .get(sha256.as_hex())
            .cloned()
            .ok_or_else(|| AttachmentStoreError::NotFound(sha256.as_hex().to_string()))
    }
}

// ============================================================================
// SECTION: In-Memory Broker
// ============================================================================

/// In-memory at-least-once broker with dead-letter support.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBroker {
    /// Pending jobs.
    queue: Arc<Mutex<VecDeque<BrokerJob>>>,
    /// In-flight jobs keyed by token.
    inflight: Arc<Mutex<BTreeMap<String, BrokerJob>>>,
    /// Dead-lettered jobs.
    dead: Arc<Mutex<Vec<BrokerJob>>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dead-lettered jobs for operational inspection.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when internal state is poisoned.
    pub fn dead_letters(&self) -> Result<Vec<BrokerJob>, BrokerError> {
        let guard = self
            .dead
            .lock()
            .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }
}

impl Broker for InMemoryBroker {
    fn enqueue(&self, job: BrokerJob) -> Result<(), BrokerError> {
        self.queue
            .lock()
            .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?
            .push_back(job);
        Ok(())
    }

    fn dequeue(&self) -> Result<Option<(BrokerJob, AckToken)>, BrokerError> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?;
        let Some(job) = queue.pop_front() else {
            return Ok(None);
        };
        drop(queue);
        let token = AckToken(format!("token-{}", job.job_id));
        self.inflight
            .lock()
            .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?
            .insert(token.0.clone(), job.clone());
        Ok(Some((job, token)))
    }

    fn ack(&self, token: AckToken) -> Result<(), BrokerError> {
        self.inflight
            .lock()
            .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?
            .remove(&token.0);
        Ok(())
    }

    fn nack(&self, token: AckToken, dead_letter: bool) -> Result<(), BrokerError> {
        let job = self
            .inflight
            .lock()
            .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?
            .remove(&token.0);
        let Some(job) = job else {
            return Ok(());
        };
        if dead_letter {
            self.dead
                .lock()
                .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?
                .push(job);
        } else {
            self.queue
                .lock()
                .map_err(|_| BrokerError::Broker("broker mutex poisoned".to_string()))?
                .push_back(job);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Store Wrappers
// ============================================================================

/// Shared artifact store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedArtifactStore {
    /// Inner store implementation.
    inner: Arc<dyn ArtifactStore + Send + Sync>,
}

impl SharedArtifactStore {
    /// Wraps an artifact store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl ArtifactStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl ArtifactStore for SharedArtifactStore {
    fn put_if_absent(
        &self,
        artifact_ref: &ArtifactRef,
        bytes: &[u8],
    ) -> Result<PutOutcome, ArtifactStoreError> {
        self.inner.put_if_absent(artifact_ref, bytes)
    }

    fn get(&self, artifact_ref: &ArtifactRef) -> Result<Vec<u8>, ArtifactStoreError> {
        self.inner.get(artifact_ref)
    }

    fn list(
        &self,
        message_id: &MessageId,
        stage: Stage,
    ) -> Result<Vec<ArtifactRef>, ArtifactStoreError> {
        self.inner.list(message_id, stage)
    }
}

/// Shared audit store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedAuditStore {
    /// Inner store implementation.
    inner: Arc<dyn AuditStore + Send + Sync>,
}

impl SharedAuditStore {
    /// Wraps an audit store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl AuditStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl AuditStore for SharedAuditStore {
    fn append(
        &self,
        message_id: &MessageId,
        run_id: &RunId,
        event: AuditEvent,
    ) -> Result<(), AuditStoreError> {
        self.inner.append(message_id, run_id, event)
    }

    fn read_chain(
        &self,
        message_id: &MessageId,
        run_id: &RunId,
    ) -> Result<Vec<AuditEvent>, AuditStoreError> {
        self.inner.read_chain(message_id, run_id)
    }
}

/// Shared attachment store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedAttachmentStore {
    /// Inner store implementation.
    inner: Arc<dyn AttachmentStore + Send + Sync>,
}

impl SharedAttachmentStore {
    /// Wraps an attachment store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl AttachmentStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl AttachmentStore for SharedAttachmentStore {
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, AttachmentStoreError> {
        self.inner.put(bytes)
    }

    fn get(&self, sha256: &HashDigest) -> Result<Vec<u8>, AttachmentStoreError> {
        self.inner.get(sha256)
    }
}
