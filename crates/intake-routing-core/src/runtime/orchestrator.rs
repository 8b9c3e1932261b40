// crates/intake-routing-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Stage Orchestrator
// Description: Idempotent stage execution, audit emission, and replay.
// Purpose: Drive the per-message pipeline with fail-closed conversion and
// deterministic job keys.
// Dependencies: crate::core, crate::interfaces, crate::runtime
// ============================================================================

//! ## Overview
//! The orchestrator owns the per-stage job contract. Every stage runs under
//! a deterministic job key derived from the message, stage, configuration
//! hash, and input artifact references; a second attempt observes the
//! existing artifact and emits no new writes or completion events. Stage
//! failures are converted to schema-valid fail-closed routing decisions.
//! Replay re-executes the decision stages against the inference cache and
//! compares recomputed decision hashes with the stored ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::core::Action;
use crate::core::ArtifactRef;
use crate::core::AttachmentId;
use crate::core::AttachmentRecord;
use crate::core::AuditEvent;
use crate::core::AuditEventBody;
use crate::core::AuditEventKind;
use crate::core::ClassificationResult;
use crate::core::ClassifyDecisionInput;
use crate::core::ConfigRef;
use crate::core::ConfigSnapshot;
use crate::core::DecisionContext;
use crate::core::DecisionHashError;
use crate::core::ErrorKind;
use crate::core::EventId;
use crate::core::ExtractionResult;
use crate::core::GENESIS_HASH;
use crate::core::HashDigest;
use crate::core::HashError;
use crate::core::IdentityDecisionInput;
use crate::core::IdentityResolutionResult;
use crate::core::IdentityStatus;
use crate::core::IngestMessage;
use crate::core::IntentLabel;
use crate::core::JobId;
use crate::core::LlmDigest;
use crate::core::MessageId;
use crate::core::NormalizedMessage;
use crate::core::PipelineMode;
use crate::core::ProductLine;
use crate::core::RedactedEvidence;
use crate::core::RouteDecisionInput;
use crate::core::RoutingDecision;
use crate::core::RoutingRuleset;
use crate::core::RuleId;
use crate::core::RulesetError;
use crate::core::RulesetRef;
use crate::core::RunId;
use crate::core::SlaId;
use crate::core::SnapshotError;
use crate::core::Stage;
use crate::core::StageError;
use crate::core::Timestamp;
use crate::core::Urgency;
use crate::core::canonical_json_bytes;
use crate::core::canonicalize_body;
use crate::core::decision_hash;
use crate::core::inference::InferenceParams;
use crate::core::inference::InferencePurpose;
use crate::core::inference::LlmInferenceArtifact;
use crate::core::inference::llm_cache_key;
use crate::core::registry::QueueId;
use crate::core::registry::SCHEMA_ATTACHMENT;
use crate::core::registry::SCHEMA_CLASSIFICATION;
use crate::core::registry::SCHEMA_EXTRACTION;
use crate::core::registry::SCHEMA_IDENTITY_RESOLUTION;
use crate::core::registry::SCHEMA_NORMALIZED_MESSAGE;
use crate::core::registry::SCHEMA_RAW_MIME;
use crate::core::registry::SCHEMA_ROUTING_DECISION;
use crate::interfaces::ArtifactStore;
use crate::interfaces::ArtifactStoreError;
use crate::interfaces::AuditStore;
use crate::interfaces::AuditStoreError;
use crate::interfaces::AvScanner;
use crate::interfaces::CaseAdapter;
use crate::interfaces::CaseError;
use crate::interfaces::DirectoryAdapter;
use crate::interfaces::LlmProvider;
use crate::interfaces::TextExtractor;
use crate::runtime::attachments;
use crate::runtime::cache::CacheError;
use crate::runtime::cache::InferenceCache;
use crate::runtime::cache::SharedInferenceCache;
use crate::runtime::classify;
use crate::runtime::classify::ClassifyInputs;
use crate::runtime::extract;
use crate::runtime::extract::ExtractInputs;
use crate::runtime::identity;
use crate::runtime::identity::IdentityInputs;
use crate::runtime::normalize;
use crate::runtime::retry::Backoff;
use crate::runtime::retry::NoopBackoff;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::with_retry;
use crate::runtime::route;
use crate::runtime::route::RouteInputs;
use crate::runtime::store::SharedArtifactStore;
use crate::runtime::store::SharedAttachmentStore;
use crate::runtime::store::SharedAuditStore;
use crate::runtime::store::artifact_uri;
use crate::runtime::telemetry::PipelineMetrics;
use crate::runtime::telemetry::SharedMetrics;
use crate::runtime::telemetry::StageOutcome;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Orchestrator infrastructure errors.
///
/// These are distinct from [`StageError`]: a stage error converts to a
/// fail-closed outcome, while an orchestrator error means the run could not
/// be recorded at all.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Artifact store failure.
    #[error(transparent)]
    Artifacts(#[from] ArtifactStoreError),
    /// Audit store failure.
    #[error(transparent)]
    Audit(#[from] AuditStoreError),
    /// Canonical hashing failure.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// Decision hashing failure.
    #[error(transparent)]
    DecisionHash(#[from] DecisionHashError),
    /// Inference cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Configuration snapshot failed validation.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Ruleset failed validation.
    #[error(transparent)]
    Ruleset(#[from] RulesetError),
    /// Artifact serialization failure.
    #[error("artifact serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Run Outcome
// ============================================================================

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run identifier.
    pub run_id: RunId,
    /// Message identifier.
    pub message_id: MessageId,
    /// Normalized message artifact reference.
    pub normalized_ref: ArtifactRef,
    /// Normalized message.
    pub normalized: NormalizedMessage,
    /// Attachment record artifact reference.
    pub attachments_ref: ArtifactRef,
    /// Stamped attachment records.
    pub attachments: Vec<AttachmentRecord>,
    /// Identity artifact reference, when the stage ran.
    pub identity_ref: Option<ArtifactRef>,
    /// Identity resolution result, when the stage ran.
    pub identity: Option<IdentityResolutionResult>,
    /// Identity decision hash, when the stage ran.
    pub identity_decision_hash: Option<HashDigest>,
    /// Classification artifact reference, when the stage ran.
    pub classification_ref: Option<ArtifactRef>,
    /// Classification result, when accepted.
    pub classification: Option<ClassificationResult>,
    /// Classification decision hash, when the stage ran.
    pub classify_decision_hash: Option<HashDigest>,
    /// Extraction artifact reference, when the stage ran.
    pub extraction_ref: Option<ArtifactRef>,
    /// Extraction result, when the stage ran.
    pub extraction: Option<ExtractionResult>,
    /// Routing decision artifact reference.
    pub routing_ref: ArtifactRef,
    /// Routing decision.
    pub routing: RoutingDecision,
    /// Routing decision hash.
    pub route_decision_hash: HashDigest,
    /// Stage that failed closed, when the run degraded.
    pub fail_closed_stage: Option<Stage>,
}

/// Per-stage hash comparison from a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayComparison {
    /// Compared stage.
    pub stage: Stage,
    /// Decision hash of the original run.
    pub stored: Option<HashDigest>,
    /// Decision hash recomputed by the replay.
    pub recomputed: Option<HashDigest>,
    /// True when both hashes are present and bit-identical.
    pub matches: bool,
}

/// Replay report over the decision stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Replay run identifier.
    pub run_id: RunId,
    /// Per-stage comparisons.
    pub comparisons: Vec<ReplayComparison>,
}

impl ReplayReport {
    /// Returns true when every compared stage matched.
    #[must_use]
    pub fn all_match(&self) -> bool {
        self.comparisons.iter().all(|comparison| comparison.matches)
    }
}

// ============================================================================
// SECTION: Audit Chain Cursor
// ============================================================================

/// Mutable cursor over one run's audit chain.
struct ChainCursor {
    /// Hash of the last appended event.
    last_hash: String,
    /// Next event ordinal.
    next_ordinal: u64,
}

impl ChainCursor {
    /// Starts a fresh chain at the genesis hash.
    const fn new() -> Self {
        Self {
            last_hash: String::new(),
            next_ordinal: 1,
        }
    }

    /// Returns the prev hash for the next event.
    fn prev_hash(&self) -> String {
        if self.last_hash.is_empty() {
            GENESIS_HASH.to_string()
        } else {
            self.last_hash.clone()
        }
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Stage orchestrator driving the per-message pipeline.
pub struct Orchestrator<Dir, Scan, Ocr, Llm, Case> {
    /// Pinned configuration snapshot.
    snapshot: ConfigSnapshot,
    /// Reference binding decisions to the snapshot.
    config_ref: ConfigRef,
    /// Versioned routing ruleset.
    ruleset: RoutingRuleset,
    /// Reference binding route decisions to the ruleset.
    ruleset_ref: RulesetRef,
    /// Directory adapter.
    directory: Dir,
    /// AV scanner.
    scanner: Scan,
    /// Text extractor / OCR engine.
    extractor: Ocr,
    /// LLM provider.
    llm: Llm,
    /// Case adapter, when case execution is wired.
    case: Option<Case>,
    /// Inference cache.
    cache: SharedInferenceCache,
    /// Artifact store.
    artifacts: SharedArtifactStore,
    /// Audit store.
    audit: SharedAuditStore,
    /// Attachment store.
    attachment_store: SharedAttachmentStore,
    /// Metrics sink.
    metrics: SharedMetrics,
    /// Backoff hook for bounded retries.
    backoff: Box<dyn Backoff + Send + Sync>,
    /// Bounded retry policy from the snapshot.
    retry: RetryPolicy,
}

impl<Dir, Scan, Ocr, Llm, Case> Orchestrator<Dir, Scan, Ocr, Llm, Case>
where
    Dir: DirectoryAdapter,
    Scan: AvScanner,
    Ocr: TextExtractor,
    Llm: LlmProvider,
    Case: CaseAdapter,
{
    /// Creates an orchestrator over validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] when the snapshot or ruleset fails
    /// validation or canonical hashing.
    #[allow(clippy::too_many_arguments, reason = "Construction wires every collaborator once.")]
    pub fn new(
        snapshot: ConfigSnapshot,
        config_path: &str,
        ruleset: RoutingRuleset,
        ruleset_path: &str,
        directory: Dir,
        scanner: Scan,
        extractor: Ocr,
        llm: Llm,
        case: Option<Case>,
        cache: SharedInferenceCache,
        artifacts: SharedArtifactStore,
        audit: SharedAuditStore,
        attachment_store: SharedAttachmentStore,
        metrics: SharedMetrics,
    ) -> Result<Self, OrchestratorError> {
        snapshot.validate()?;
        ruleset.validate()?;
        let config_ref = ConfigRef {
            path: config_path.to_string(),
            sha256: snapshot.canonical_hash()?,
        };
        let ruleset_ref = RulesetRef {
            path: ruleset_path.to_string(),
            sha256: ruleset.canonical_hash()?,
            version: ruleset.ruleset_version.clone(),
        };
        let retry = RetryPolicy::from_io(&snapshot.io);
        Ok(Self {
            snapshot,
            config_ref,
            ruleset,
            ruleset_ref,
            directory,
            scanner,
            extractor,
            llm,
            case,
            cache,
            artifacts,
            audit,
            attachment_store,
            metrics,
            backoff: Box::new(NoopBackoff),
            retry,
        })
    }

    /// Replaces the backoff hook (e.g. with a sleeping backoff in workers).
    pub fn set_backoff(&mut self, backoff: impl Backoff + Send + Sync + 'static) {
        self.backoff = Box::new(backoff);
    }

    /// Returns the pinned configuration reference.
    #[must_use]
    pub const fn config_ref(&self) -> &ConfigRef {
        &self.config_ref
    }

    /// Returns the pinned ruleset reference.
    #[must_use]
    pub const fn ruleset_ref(&self) -> &RulesetRef {
        &self.ruleset_ref
    }

    // ------------------------------------------------------------------
    // Pipeline execution
    // ------------------------------------------------------------------

    /// Processes one message through the full stage pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] only for infrastructure failures;
    /// stage failures convert to fail-closed routing outcomes.
    pub fn process(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
        now: Timestamp,
    ) -> Result<RunOutcome, OrchestratorError> {
        self.run_pipeline(message, run_id, now, false)
    }

    /// Replays a completed run in determinism mode and compares decision
    /// hashes. Artifacts written during replay are new versions; nothing is
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] for infrastructure failures.
    pub fn replay(
        &self,
        message: &IngestMessage,
        prior: &RunOutcome,
        replay_run_id: &RunId,
        now: Timestamp,
    ) -> Result<ReplayReport, OrchestratorError> {
        let outcome = self.run_pipeline(message, replay_run_id, now, true)?;
        let comparisons = vec![
            compare_stage(Stage::Identity, &prior.identity_decision_hash, &outcome.identity_decision_hash),
            compare_stage(Stage::Classify, &prior.classify_decision_hash, &outcome.classify_decision_hash),
            compare_stage(
                Stage::Route,
                &Some(prior.route_decision_hash.clone()),
                &Some(outcome.route_decision_hash.clone()),
            ),
        ];
        let mut cursor = self.load_cursor(message, replay_run_id)?;
        for comparison in &comparisons {
            self.append_event(
                message,
                replay_run_id,
                &mut cursor,
                comparison.stage,
                AuditEventKind::ReplayCompared,
                Vec::new(),
                None,
                comparison.recomputed.clone(),
                Vec::new(),
                (!comparison.matches).then(|| "replay_hash_mismatch".to_string()),
                now,
            )?;
        }
        Ok(ReplayReport {
            run_id: replay_run_id.clone(),
            comparisons,
        })
    }

    /// Runs the stage pipeline, optionally in replay (cache-only) mode.
    #[allow(
        clippy::too_many_lines,
        reason = "Maintain a single linear flow for ordered stage execution and auditability."
    )]
    fn run_pipeline(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
        now: Timestamp,
        replay_mode: bool,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut cursor = ChainCursor::new();
        let raw_mime_ref = raw_mime_artifact_ref(message);

        // Genesis event records ingest acceptance.
        self.append_event(
            message,
            run_id,
            &mut cursor,
            Stage::Ingest,
            AuditEventKind::StageCompleted,
            vec![raw_mime_ref.clone()],
            None,
            None,
            Vec::new(),
            None,
            now,
        )?;

        // Effective snapshot: replay forbids live inference regardless of
        // the pinned determinism flag. Decision hashing keeps the pinned
        // flag so replayed hashes stay comparable.
        let mut effective = self.snapshot.clone();
        if replay_mode {
            effective.determinism_mode = true;
        }

        // NORMALIZE.
        let normalized = match normalize::run(message) {
            Ok(normalized) => normalized,
            Err(err) => {
                return self.fail_closed_run(
                    message, run_id, now, &mut cursor, raw_mime_ref, None, None, None, None, err,
                );
            }
        };
        let (normalized_ref, _) = self.persist_stage(
            message,
            run_id,
            &mut cursor,
            Stage::Normalize,
            SCHEMA_NORMALIZED_MESSAGE,
            &[raw_mime_ref.clone()],
            &normalized,
            None,
            Vec::new(),
            now,
        )?;

        // ATTACHMENTS.
        let attachment_records = match attachments::run(
            message,
            &self.attachment_store,
            &self.artifacts,
            &self.scanner,
            &self.extractor,
            &self.retry,
            self.backoff.as_ref(),
        ) {
            Ok(records) => records,
            Err(err) => {
                return self.fail_closed_run(
                    message,
                    run_id,
                    now,
                    &mut cursor,
                    raw_mime_ref,
                    Some((normalized_ref, normalized)),
                    None,
                    None,
                    None,
                    err,
                );
            }
        };
        let (attachments_ref, _) = self.persist_stage(
            message,
            run_id,
            &mut cursor,
            Stage::Attachments,
            SCHEMA_ATTACHMENT,
            &[normalized_ref.clone()],
            &attachment_records,
            None,
            Vec::new(),
            now,
        )?;

        let attachment_texts = self.load_attachment_texts(&attachment_records)?;
        let context = DecisionContext {
            message_fingerprint: normalized.message_fingerprint.clone(),
            raw_mime_sha256: message.raw_mime.sha256.clone(),
            config_ref: self.config_ref.clone(),
            determinism_mode: self.snapshot.determinism_mode,
        };

        // IDENTITY.
        let claim_hint =
            classify::claim_related_hint(&normalized.subject_c14n, &normalized.body_c14n);
        let assist = match self.identity_assist_proposals(&normalized, &effective) {
            Ok(proposals) => proposals,
            Err(err) => {
                return self.fail_closed_run(
                    message,
                    run_id,
                    now,
                    &mut cursor,
                    raw_mime_ref,
                    Some((normalized_ref, normalized)),
                    Some((attachments_ref, attachment_records)),
                    None,
                    None,
                    err,
                );
            }
        };
        let identity_inputs = IdentityInputs {
            normalized: &normalized,
            attachment_texts: &attachment_texts,
            assist_proposals: &assist,
            thread_entities: &[],
            claim_related_hint: claim_hint,
        };
        let identity_result = match identity::resolve(
            &identity_inputs,
            &effective,
            &self.directory,
            &self.retry,
            self.backoff.as_ref(),
        ) {
            Ok(result) => result,
            Err(err) => {
                return self.fail_closed_run(
                    message,
                    run_id,
                    now,
                    &mut cursor,
                    raw_mime_ref,
                    Some((normalized_ref, normalized)),
                    Some((attachments_ref, attachment_records)),
                    None,
                    None,
                    err,
                );
            }
        };
        let identity_hash =
            decision_hash(&IdentityDecisionInput::from_result(context.clone(), &identity_result))?;
        let (identity_ref, _) = self.persist_stage(
            message,
            run_id,
            &mut cursor,
            Stage::Identity,
            SCHEMA_IDENTITY_RESOLUTION,
            &[normalized_ref.clone(), attachments_ref.clone()],
            &identity_result,
            Some(identity_hash.clone()),
            identity_result
                .selected()
                .map(|candidate| {
                    candidate.evidence.iter().map(crate::core::EvidenceSpan::redacted).collect()
                })
                .unwrap_or_default(),
            now,
        )?;

        // CLASSIFY.
        let classify_inputs = ClassifyInputs {
            normalized: &normalized,
            attachment_texts: &attachment_texts,
            attachments: &attachment_records,
        };
        let classification = match classify::classify(
            &classify_inputs,
            &effective,
            &self.llm,
            &self.cache,
            &self.retry,
            self.backoff.as_ref(),
        ) {
            Ok(result) => result,
            Err(err) => {
                return self.fail_closed_run(
                    message,
                    run_id,
                    now,
                    &mut cursor,
                    raw_mime_ref,
                    Some((normalized_ref, normalized)),
                    Some((attachments_ref, attachment_records)),
                    Some((identity_ref, identity_result, identity_hash)),
                    None,
                    err,
                );
            }
        };
        let llm_digest = classification.model_id.as_ref().map(|model_id| LlmDigest {
            enabled: true,
            provider: self.snapshot.llm.provider.clone(),
            model_id: model_id.clone(),
            prompt_sha256: classification.prompt_sha256.as_ref().map(|digest| digest.as_hex().to_string()),
        });
        let classify_hash = decision_hash(&ClassifyDecisionInput::from_result(
            context.clone(),
            &classification,
            llm_digest,
        ))?;
        let (classification_ref, _) = self.persist_stage(
            message,
            run_id,
            &mut cursor,
            Stage::Classify,
            SCHEMA_CLASSIFICATION,
            &[normalized_ref.clone(), attachments_ref.clone()],
            &classification,
            Some(classify_hash.clone()),
            classification
                .intents
                .iter()
                .filter(|intent| intent.label == classification.primary_intent)
                .flat_map(|intent| intent.evidence.iter().map(crate::core::EvidenceSpan::redacted))
                .collect(),
            now,
        )?;

        // EXTRACT.
        let extract_inputs = ExtractInputs {
            normalized: &normalized,
            attachment_texts: &attachment_texts,
        };
        let extraction = match extract::extract(
            &extract_inputs,
            &effective,
            &self.directory,
            &self.llm,
            &self.cache,
            &self.retry,
            self.backoff.as_ref(),
        ) {
            Ok(result) => result,
            Err(err) => {
                return self.fail_closed_run(
                    message,
                    run_id,
                    now,
                    &mut cursor,
                    raw_mime_ref,
                    Some((normalized_ref, normalized)),
                    Some((attachments_ref, attachment_records)),
                    Some((identity_ref, identity_result, identity_hash)),
                    Some((classification_ref, classification, classify_hash)),
                    err,
                );
            }
        };
        let (extraction_ref, _) = self.persist_stage(
            message,
            run_id,
            &mut cursor,
            Stage::Extract,
            SCHEMA_EXTRACTION,
            &[normalized_ref.clone(), classification_ref.clone()],
            &extraction,
            None,
            Vec::new(),
            now,
        )?;

        // ROUTE.
        let route_inputs = RouteInputs {
            message_id: &message.message_id,
            identity: &identity_result,
            classification: &classification,
            extraction: &extraction,
            snapshot: &self.snapshot,
            ruleset: &self.ruleset,
            ruleset_ref: &self.ruleset_ref,
        };
        let routing = route::evaluate(&route_inputs);
        let route_hash = decision_hash(&RouteDecisionInput::from_decision(
            context,
            identity_result.status,
            &classification,
            &routing,
        ))?;
        let (routing_ref, _) = self.persist_stage(
            message,
            run_id,
            &mut cursor,
            Stage::Route,
            SCHEMA_ROUTING_DECISION,
            &[identity_ref.clone(), classification_ref.clone(), extraction_ref.clone()],
            &routing,
            Some(route_hash.clone()),
            Vec::new(),
            now,
        )?;

        // CASE side effects (skipped in replay).
        if !replay_mode {
            self.execute_case(message, run_id, &mut cursor, &routing, &routing_ref, now)?;
        }

        Ok(RunOutcome {
            run_id: run_id.clone(),
            message_id: message.message_id.clone(),
            normalized_ref,
            normalized,
            attachments_ref,
            attachments: attachment_records,
            identity_ref: Some(identity_ref),
            identity: Some(identity_result),
            identity_decision_hash: Some(identity_hash),
            classification_ref: Some(classification_ref),
            classification: Some(classification),
            classify_decision_hash: Some(classify_hash),
            extraction_ref: Some(extraction_ref),
            extraction: Some(extraction),
            routing_ref,
            routing,
            route_decision_hash: route_hash,
            fail_closed_stage: None,
        })
    }

    // ------------------------------------------------------------------
    // Stage persistence
    // ------------------------------------------------------------------

    /// Computes the deterministic job key for a stage.
    fn job_id(
        &self,
        message_id: &MessageId,
        stage: Stage,
        input_refs: &[ArtifactRef],
    ) -> Result<JobId, OrchestratorError> {
        let ruleset_sha = (stage == Stage::Route).then(|| self.ruleset_ref.sha256.as_hex().to_string());
        let digest = HashDigest::of_canonical_json(&json!({
            "message_id": message_id,
            "stage": stage,
            "config_sha256": self.config_ref.sha256.as_hex(),
            "ruleset_sha256": ruleset_sha,
            "input_artifact_refs": input_refs,
        }))?;
        Ok(JobId::new(digest.as_hex().to_string()))
    }

    /// Persists a stage output idempotently and emits audit events.
    ///
    /// Returns the artifact reference and whether the artifact was reused
    /// from a previous attempt (in which case no events were emitted).
    #[allow(clippy::too_many_arguments, reason = "Stage persistence binds many provenance inputs.")]
    fn persist_stage<T: Serialize + for<'de> Deserialize<'de>>(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
        cursor: &mut ChainCursor,
        stage: Stage,
        schema_id: &str,
        input_refs: &[ArtifactRef],
        output: &T,
        stage_decision_hash: Option<HashDigest>,
        evidence: Vec<RedactedEvidence>,
        now: Timestamp,
    ) -> Result<(ArtifactRef, bool), OrchestratorError> {
        let job_id = self.job_id(&message.message_id, stage, input_refs)?;
        let uri = artifact_uri(&message.message_id, stage, &format!("{job_id}.json"));

        // Idempotency: a prior attempt under the same job key wins.
        let existing = self.artifacts.list(&message.message_id, stage)?;
        if let Some(found) = existing.into_iter().find(|artifact| artifact.uri == uri) {
            self.metrics.stage_outcome(stage, StageOutcome::Reused);
            return Ok((found, true));
        }

        let bytes = canonical_json_bytes(output)?;
        let artifact_ref = ArtifactRef::for_bytes(schema_id, uri, &bytes);
        self.artifacts.put_if_absent(&artifact_ref, &bytes)?;

        self.append_event(
            message,
            run_id,
            cursor,
            stage,
            AuditEventKind::StageStarted,
            input_refs.to_vec(),
            None,
            None,
            Vec::new(),
            None,
            now,
        )?;
        self.append_event(
            message,
            run_id,
            cursor,
            stage,
            AuditEventKind::StageCompleted,
            input_refs.to_vec(),
            Some(artifact_ref.clone()),
            stage_decision_hash,
            evidence,
            None,
            now,
        )?;
        self.metrics.stage_outcome(stage, StageOutcome::Done);
        Ok((artifact_ref, false))
    }

    /// Appends one audit event to the run chain.
    #[allow(clippy::too_many_arguments, reason = "Audit events carry full provenance.")]
    fn append_event(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
        cursor: &mut ChainCursor,
        stage: Stage,
        kind: AuditEventKind,
        input_refs: Vec<ArtifactRef>,
        output_ref: Option<ArtifactRef>,
        event_decision_hash: Option<HashDigest>,
        evidence: Vec<RedactedEvidence>,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<(), OrchestratorError> {
        let body = AuditEventBody {
            event_id: EventId::new(format!("evt-{}", cursor.next_ordinal)),
            message_id: message.message_id.clone(),
            run_id: run_id.clone(),
            stage,
            kind,
            input_refs,
            output_ref,
            decision_hash: event_decision_hash,
            config_ref: self.config_ref.clone(),
            rules_ref: (stage == Stage::Route).then(|| self.ruleset_ref.clone()),
            model_id: None,
            prompt_sha256: None,
            evidence,
            reason,
            occurred_at: now,
            prev_event_hash: cursor.prev_hash(),
        };
        let event = AuditEvent::seal(body)?;
        cursor.last_hash = event.event_hash.clone();
        cursor.next_ordinal += 1;
        self.audit.append(&message.message_id, run_id, event)?;
        Ok(())
    }

    /// Rebuilds a cursor from the stored chain head.
    fn load_cursor(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
    ) -> Result<ChainCursor, OrchestratorError> {
        let chain = self.audit.read_chain(&message.message_id, run_id)?;
        let mut cursor = ChainCursor::new();
        if let Some(last) = chain.last() {
            cursor.last_hash = last.event_hash.clone();
        }
        cursor.next_ordinal = chain.len() as u64 + 1;
        Ok(cursor)
    }

    // ------------------------------------------------------------------
    // Fail-closed conversion
    // ------------------------------------------------------------------

    /// Converts a stage failure into a fail-closed routing outcome.
    #[allow(
        clippy::too_many_arguments,
        clippy::type_complexity,
        reason = "The conversion needs whatever stage state existed at failure time."
    )]
    fn fail_closed_run(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
        now: Timestamp,
        cursor: &mut ChainCursor,
        raw_mime_ref: ArtifactRef,
        normalized: Option<(ArtifactRef, NormalizedMessage)>,
        attachment_records: Option<(ArtifactRef, Vec<AttachmentRecord>)>,
        identity: Option<(ArtifactRef, IdentityResolutionResult, HashDigest)>,
        classification: Option<(ArtifactRef, ClassificationResult, HashDigest)>,
        err: StageError,
    ) -> Result<RunOutcome, OrchestratorError> {
        self.append_event(
            message,
            run_id,
            cursor,
            err.stage,
            AuditEventKind::StageFailedClosed,
            Vec::new(),
            None,
            None,
            Vec::new(),
            Some(err.reason.clone()),
            now,
        )?;
        self.metrics.stage_outcome(err.stage, StageOutcome::FailedClosed);

        let queue_id = if err.kind == ErrorKind::DeterminismViolation {
            QueueId::ClassificationReview
        } else {
            err.stage.review_queue()
        };
        let routing = RoutingDecision {
            message_id: message.message_id.clone(),
            queue_id,
            sla_id: SlaId::OneBusinessDay,
            priority: 5,
            actions: vec![Action::AttachOriginalEmail],
            rule_id: RuleId::new(format!("fail-closed.{}", err.stage.label().to_lowercase())),
            ruleset_ref: self.ruleset_ref.clone(),
            fail_closed: true,
            fail_closed_reason: Some(err.reason.clone()),
        };

        // Decision hash over the degraded canonical input: absent stage
        // outputs hash as their neutral values so the fail-closed decision
        // is itself reproducible.
        let fingerprint = normalized.as_ref().map_or_else(
            || HashDigest::of_bytes(message.raw_mime.sha256.as_hex().as_bytes()),
            |(_, normalized)| normalized.message_fingerprint.clone(),
        );
        let context = DecisionContext {
            message_fingerprint: fingerprint,
            raw_mime_sha256: message.raw_mime.sha256.clone(),
            config_ref: self.config_ref.clone(),
            determinism_mode: self.snapshot.determinism_mode,
        };
        let identity_status =
            identity.as_ref().map_or(IdentityStatus::NoCandidate, |(_, result, _)| result.status);
        let neutral_classification = ClassificationResult {
            message_id: message.message_id.clone(),
            intents: Vec::new(),
            primary_intent: IntentLabel::GeneralInquiry,
            product_line: ProductLine::Unknown,
            product_confidence: 0.0,
            urgency: Urgency::Normal,
            urgency_confidence: 0.0,
            risk_flags: Vec::new(),
            rules_version: self.snapshot.classify.rules_version.clone(),
            mode: PipelineMode::Baseline,
            model_id: None,
            prompt_sha256: None,
        };
        let classification_view =
            classification.as_ref().map_or(&neutral_classification, |(_, result, _)| result);
        let route_hash = decision_hash(&RouteDecisionInput::from_decision(
            context,
            identity_status,
            classification_view,
            &routing,
        ))?;

        let route_inputs: Vec<ArtifactRef> = [
            Some(raw_mime_ref),
            normalized.as_ref().map(|(artifact, _)| artifact.clone()),
            attachment_records.as_ref().map(|(artifact, _)| artifact.clone()),
            identity.as_ref().map(|(artifact, _, _)| artifact.clone()),
            classification.as_ref().map(|(artifact, _, _)| artifact.clone()),
        ]
        .into_iter()
        .flatten()
        .collect();

        let job_id = self.job_id(&message.message_id, Stage::Route, &route_inputs)?;
        let uri = artifact_uri(&message.message_id, Stage::Route, &format!("{job_id}.json"));
        let bytes = canonical_json_bytes(&routing)?;
        let routing_ref = ArtifactRef::for_bytes(SCHEMA_ROUTING_DECISION, uri, &bytes);
        self.artifacts.put_if_absent(&routing_ref, &bytes)?;
        self.append_event(
            message,
            run_id,
            cursor,
            Stage::Route,
            AuditEventKind::StageCompleted,
            route_inputs,
            Some(routing_ref.clone()),
            Some(route_hash.clone()),
            Vec::new(),
            Some(err.reason.clone()),
            now,
        )?;

        let (normalized_ref, normalized_message) = match normalized {
            Some((artifact, value)) => (artifact, value),
            None => {
                // Normalization itself failed; keep a minimal record so the
                // outcome remains schema-valid.
                let fallback = NormalizedMessage {
                    message_id: message.message_id.clone(),
                    subject_c14n: String::new(),
                    body_c14n: String::new(),
                    thread: message.email.thread.clone(),
                    sender: message.email.from.clone(),
                    sender_display_name: message.email.from_display_name.clone(),
                    recipients: message.email.to.clone(),
                    attachment_ids: Vec::new(),
                    ingestion_source: message.ingestion_source.clone(),
                    ingested_at: message.ingested_at,
                    message_fingerprint: message.raw_mime.sha256.clone(),
                };
                let uri = artifact_uri(&message.message_id, Stage::Normalize, "fail-closed.json");
                let bytes = canonical_json_bytes(&fallback)?;
                let artifact = ArtifactRef::for_bytes(SCHEMA_NORMALIZED_MESSAGE, uri, &bytes);
                self.artifacts.put_if_absent(&artifact, &bytes)?;
                (artifact, fallback)
            }
        };
        let (attachments_ref, attachment_list) = match attachment_records {
            Some((artifact, records)) => (artifact, records),
            None => {
                let uri = artifact_uri(&message.message_id, Stage::Attachments, "fail-closed.json");
                let empty: Vec<AttachmentRecord> = Vec::new();
                let bytes = canonical_json_bytes(&empty)?;
                let artifact = ArtifactRef::for_bytes(SCHEMA_ATTACHMENT, uri, &bytes);
                self.artifacts.put_if_absent(&artifact, &bytes)?;
                (artifact, empty)
            }
        };

        Ok(RunOutcome {
            run_id: run_id.clone(),
            message_id: message.message_id.clone(),
            normalized_ref,
            normalized: normalized_message,
            attachments_ref,
            attachments: attachment_list,
            identity_ref: identity.as_ref().map(|(artifact, _, _)| artifact.clone()),
            identity: identity.as_ref().map(|(_, result, _)| result.clone()),
            identity_decision_hash: identity.map(|(_, _, digest)| digest),
            classification_ref: classification.as_ref().map(|(artifact, _, _)| artifact.clone()),
            classification: classification.as_ref().map(|(_, result, _)| result.clone()),
            classify_decision_hash: classification.map(|(_, _, digest)| digest),
            extraction_ref: None,
            extraction: None,
            routing_ref,
            routing,
            route_decision_hash: route_hash,
            fail_closed_stage: Some(err.stage),
        })
    }

    // ------------------------------------------------------------------
    // Stage helpers
    // ------------------------------------------------------------------

    /// Loads and canonicalizes extracted texts of usable attachments.
    fn load_attachment_texts(
        &self,
        records: &[AttachmentRecord],
    ) -> Result<Vec<(AttachmentId, String)>, OrchestratorError> {
        let mut texts = Vec::new();
        for record in records {
            if !record.av_status.text_usable() {
                continue;
            }
            let Some(text_ref) = &record.extracted_text_ref else {
                continue;
            };
            let bytes = self.artifacts.get(text_ref)?;
            let text = String::from_utf8_lossy(&bytes);
            texts.push((record.attachment_id.clone(), canonicalize_body(&text)));
        }
        Ok(texts)
    }

    /// Resolves LLM-assist candidate proposals for identity resolution.
    ///
    /// Under determinism or replay constraints a cache miss yields no
    /// proposals rather than a live call; assist is corroborative, not
    /// required.
    fn identity_assist_proposals(
        &self,
        normalized: &NormalizedMessage,
        effective: &ConfigSnapshot,
    ) -> Result<Vec<String>, StageError> {
        if effective.mode != PipelineMode::LlmFirst || effective.incident.disable_llm {
            return Ok(Vec::new());
        }
        let params = InferenceParams {
            temperature: effective.llm.temperature,
            top_p: effective.llm.top_p,
            max_tokens: effective.llm.max_tokens,
        };
        let prompt = format!(
            "You are an insurance intake assistant. List candidate policy, \
claim, or customer numbers referenced by this message as JSON \
{{\"candidate_keys\": [...]}}.\n\nSubject:\n{}\n\nBody:\n{}\n",
            normalized.subject_c14n, normalized.body_c14n
        );
        let prompt_sha256 = HashDigest::of_bytes(prompt.as_bytes());
        let key = llm_cache_key(
            InferencePurpose::IdentityAssist,
            &effective.llm.model_id,
            &params,
            &prompt_sha256,
            &normalized.message_fingerprint,
        )
        .map_err(|err| StageError::internal(Stage::Identity, err.to_string()))?;

        if let Ok(Some(artifact)) = self.cache.lookup(&key) {
            return Ok(parse_assist(&artifact.output_json));
        }
        if effective.determinism_mode {
            return Ok(Vec::new());
        }

        let raw = with_retry(
            &self.retry,
            self.backoff.as_ref(),
            |err: &crate::interfaces::LlmError| {
                matches!(err, crate::interfaces::LlmError::Unavailable(_))
            },
            || self.llm.infer(&prompt, &params),
        );
        let Ok(raw) = raw else {
            return Ok(Vec::new());
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            return Ok(Vec::new());
        };
        if let Ok(artifact) = LlmInferenceArtifact::new(
            InferencePurpose::IdentityAssist,
            effective.llm.model_id.clone(),
            params,
            prompt_sha256,
            normalized.message_fingerprint.clone(),
            value.clone(),
        ) {
            let _ = self.cache.record(&key, &artifact);
        }
        Ok(parse_assist(&value))
    }

    /// Executes case-layer side effects after routing.
    fn execute_case(
        &self,
        message: &IngestMessage,
        run_id: &RunId,
        cursor: &mut ChainCursor,
        routing: &RoutingDecision,
        routing_ref: &ArtifactRef,
        now: Timestamp,
    ) -> Result<(), OrchestratorError> {
        let Some(case) = &self.case else {
            return Ok(());
        };
        if routing.has_action(Action::BlockCaseCreate) || !routing.has_action(Action::CreateCase) {
            return Ok(());
        }
        let job_id = self.job_id(&message.message_id, Stage::Case, &[routing_ref.clone()])?;
        let payload = json!({
            "message_id": message.message_id,
            "queue_id": routing.queue_id,
            "sla_id": routing.sla_id,
            "priority": routing.priority,
        });
        let created = with_retry(
            &self.retry,
            self.backoff.as_ref(),
            |err: &CaseError| matches!(err, CaseError::Unavailable(_)),
            || case.create_or_update(&job_id, &payload),
        );
        match created {
            Ok(receipt) => {
                if routing.has_action(Action::AttachOriginalEmail) {
                    let _ = case.attach(&receipt.case_id, routing_ref);
                }
                self.append_event(
                    message,
                    run_id,
                    cursor,
                    Stage::Case,
                    AuditEventKind::StageCompleted,
                    vec![routing_ref.clone()],
                    None,
                    None,
                    Vec::new(),
                    None,
                    now,
                )?;
            }
            Err(err) => {
                // Transport-only work dead-letters; the decision stands.
                self.append_event(
                    message,
                    run_id,
                    cursor,
                    Stage::Case,
                    AuditEventKind::StageDeadLettered,
                    vec![routing_ref.clone()],
                    None,
                    None,
                    Vec::new(),
                    Some(err.to_string()),
                    now,
                )?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

/// Builds the artifact reference for the raw MIME record.
fn raw_mime_artifact_ref(message: &IngestMessage) -> ArtifactRef {
    ArtifactRef {
        schema_id: SCHEMA_RAW_MIME.to_string(),
        uri: message.raw_mime.uri.clone(),
        sha256: message.raw_mime.sha256.clone(),
    }
}

/// Builds one replay comparison entry.
fn compare_stage(
    stage: Stage,
    stored: &Option<HashDigest>,
    recomputed: &Option<HashDigest>,
) -> ReplayComparison {
    let matches = match (stored, recomputed) {
        (Some(stored), Some(recomputed)) => stored == recomputed,
        _ => false,
    };
    ReplayComparison {
        stage,
        stored: stored.clone(),
        recomputed: recomputed.clone(),
        matches,
    }
}

/// Parses candidate keys out of an assist artifact.
fn parse_assist(value: &serde_json::Value) -> Vec<String> {
    value
        .get("candidate_keys")
        .and_then(|keys| keys.as_array())
        .map(|keys| {
            keys.iter().filter_map(|key| key.as_str().map(ToString::to_string)).collect()
        })
        .unwrap_or_default()
}
