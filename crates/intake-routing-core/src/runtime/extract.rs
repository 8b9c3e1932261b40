// crates/intake-routing-core/src/runtime/extract.rs
// ============================================================================
// Module: Extract Stage
// Description: Validated entity extraction with redaction.
// Purpose: Produce canonical, provenance-carrying entities from message text.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{cache, retry,
// validators}
// ============================================================================

//! ## Overview
//! Extraction is pattern-first with an optional LLM pass in LLM_FIRST mode.
//! Every proposed value must survive pattern validation, verbatim offset
//! verification, and (for directory-backed types) an existence check before
//! it enters the result. Sensitive values are redacted before persistence.
//! Extraction never fails the pipeline for missing entities; it only fails
//! closed on determinism violations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::core::AttachmentId;
use crate::core::EvidenceSource;
use crate::core::ExtractedEntity;
use crate::core::ExtractedEntityType;
use crate::core::ExtractionResult;
use crate::core::NormalizedMessage;
use crate::core::PipelineMode;
use crate::core::Provenance;
use crate::core::Stage;
use crate::core::StageError;
use crate::core::error::REASON_DETERMINISM_CACHE_MISS;
use crate::core::hashing::HashDigest;
use crate::core::inference::InferenceParams;
use crate::core::inference::InferencePurpose;
use crate::core::inference::LlmInferenceArtifact;
use crate::core::inference::llm_cache_key;
use crate::core::snapshot::ConfigSnapshot;
use crate::interfaces::DirectoryAdapter;
use crate::interfaces::DirectoryError;
use crate::interfaces::LlmError;
use crate::interfaces::LlmProvider;
use crate::runtime::cache::InferenceCache;
use crate::runtime::retry::Backoff;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::with_retry;
use crate::runtime::validators;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Email address pattern.
static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").ok());

/// Phone number pattern (international and German national forms).
static PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:\+\d{1,3}[ \-]?)?(?:\(0\)|0)\d{2,4}[ \-/]?\d{4,9}\b").ok());

/// Date pattern (`dd.mm.yyyy` or `yyyy-mm-dd`).
static DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(?:\d{2}\.\d{2}\.\d{4}|\d{4}-\d{2}-\d{2})\b").ok());

/// German vehicle plate pattern.
static VEHICLE_PLATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-ZÄÖÜ]{1,3}-[A-Z]{1,2} ?\d{1,4}\b").ok());

/// Confidence for pattern-derived entities.
const PATTERN_CONFIDENCE: f64 = 0.95;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Inputs to extraction.
pub struct ExtractInputs<'a> {
    /// Normalized message.
    pub normalized: &'a NormalizedMessage,
    /// Canonical extracted texts of CLEAN attachments.
    pub attachment_texts: &'a [(AttachmentId, String)],
}

impl ExtractInputs<'_> {
    /// Iterates canonical texts with their sources.
    fn texts(&self) -> Vec<(EvidenceSource, Option<AttachmentId>, &str)> {
        let mut out = vec![
            (EvidenceSource::Subject, None, self.normalized.subject_c14n.as_str()),
            (EvidenceSource::Body, None, self.normalized.body_c14n.as_str()),
        ];
        for (attachment_id, text) in self.attachment_texts {
            out.push((EvidenceSource::AttachmentText, Some(attachment_id.clone()), text.as_str()));
        }
        out
    }

    /// Resolves the canonical text a provenance refers to.
    fn resolve_text(
        &self,
        source: EvidenceSource,
        attachment_id: Option<&AttachmentId>,
    ) -> Option<&str> {
        match source {
            EvidenceSource::Subject => Some(self.normalized.subject_c14n.as_str()),
            EvidenceSource::Body => Some(self.normalized.body_c14n.as_str()),
            EvidenceSource::AttachmentText => {
                let wanted = attachment_id?;
                self.attachment_texts
                    .iter()
                    .find(|(id, _)| id == wanted)
                    .map(|(_, text)| text.as_str())
            }
        }
    }
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Redacts a value for persistence according to the sensitivity policy.
///
/// Sensitive types keep the first four characters where the template
/// requires them; everything else is masked. Non-sensitive values pass
/// through unchanged.
#[must_use]
pub fn redact_value(entity_type: ExtractedEntityType, value: &str) -> String {
    if !entity_type.sensitive() {
        return value.to_string();
    }
    let keep: String = value.chars().take(4).collect();
    let masked = value.chars().count().saturating_sub(4);
    format!("{keep}{}", "*".repeat(masked))
}

// ============================================================================
// SECTION: Stage Execution
// ============================================================================

/// Runs the Extract stage.
///
/// # Errors
///
/// Returns [`StageError`] only for determinism violations or internal
/// failures; missing entities and rejected LLM proposals degrade silently
/// to the rule-based result.
pub fn extract(
    inputs: &ExtractInputs<'_>,
    snapshot: &ConfigSnapshot,
    directory: &dyn DirectoryAdapter,
    llm: &dyn LlmProvider,
    cache: &dyn InferenceCache,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<ExtractionResult, StageError> {
    let mut entities = rule_based_entities(inputs, snapshot, directory, retry, backoff);

    if snapshot.mode == PipelineMode::LlmFirst && !snapshot.incident.disable_llm {
        let llm_entities =
            llm_entities(inputs, snapshot, directory, llm, cache, retry, backoff)?;
        merge_entities(&mut entities, llm_entities);
    }

    Ok(ExtractionResult {
        message_id: inputs.normalized.message_id.clone(),
        entities,
        rules_version: snapshot.classify.rules_version.clone(),
    })
}

/// Merges validated LLM entities into the rule-based set without duplicates.
fn merge_entities(entities: &mut Vec<ExtractedEntity>, additions: Vec<ExtractedEntity>) {
    for addition in additions {
        let duplicate = entities.iter().any(|existing| {
            existing.entity_type == addition.entity_type
                && existing.value_sha256 == addition.value_sha256
        });
        if !duplicate {
            entities.push(addition);
        }
    }
}

// ============================================================================
// SECTION: Rule-Based Extraction
// ============================================================================

/// Extracts entities with the deterministic pattern tables.
fn rule_based_entities(
    inputs: &ExtractInputs<'_>,
    snapshot: &ConfigSnapshot,
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Vec<ExtractedEntity> {
    let mut entities: Vec<ExtractedEntity> = Vec::new();
    for (source, attachment_id, text) in inputs.texts() {
        collect_validated(
            &mut entities,
            ExtractedEntityType::PolicyNumber,
            validators::POLICY_NUMBER.as_ref(),
            Some(validators::validate_policy_number),
            source,
            attachment_id.as_ref(),
            text,
        );
        collect_validated(
            &mut entities,
            ExtractedEntityType::ClaimNumber,
            validators::CLAIM_NUMBER.as_ref(),
            Some(validators::validate_claim_number),
            source,
            attachment_id.as_ref(),
            text,
        );
        collect_validated(
            &mut entities,
            ExtractedEntityType::CustomerNumber,
            validators::CUSTOMER_NUMBER.as_ref(),
            Some(validators::validate_customer_number),
            source,
            attachment_id.as_ref(),
            text,
        );
        if snapshot.extraction.iban_enabled {
            collect_validated(
                &mut entities,
                ExtractedEntityType::Iban,
                validators::IBAN.as_ref(),
                Some(validators::validate_iban),
                source,
                attachment_id.as_ref(),
                text,
            );
        }
        collect_validated(
            &mut entities,
            ExtractedEntityType::EmailAddress,
            EMAIL.as_ref(),
            None,
            source,
            attachment_id.as_ref(),
            text,
        );
        collect_validated(
            &mut entities,
            ExtractedEntityType::PhoneNumber,
            PHONE.as_ref(),
            None,
            source,
            attachment_id.as_ref(),
            text,
        );
        collect_validated(
            &mut entities,
            ExtractedEntityType::DateOfLoss,
            DATE.as_ref(),
            None,
            source,
            attachment_id.as_ref(),
            text,
        );
        collect_validated(
            &mut entities,
            ExtractedEntityType::VehiclePlate,
            VEHICLE_PLATE.as_ref(),
            None,
            source,
            attachment_id.as_ref(),
            text,
        );
    }
    stamp_directory_misses(&mut entities, directory, retry, backoff);
    entities
}

/// Collects validated matches of one pattern into the entity list.
fn collect_validated(
    entities: &mut Vec<ExtractedEntity>,
    entity_type: ExtractedEntityType,
    pattern: Option<&Regex>,
    validate: Option<fn(&str) -> bool>,
    source: EvidenceSource,
    attachment_id: Option<&AttachmentId>,
    text: &str,
) {
    let Some(pattern) = pattern else {
        return;
    };
    for found in pattern.find_iter(text) {
        let value = found.as_str();
        if validate.is_some_and(|check| !check(value)) {
            continue;
        }
        let value_sha256 = HashDigest::of_bytes(value.as_bytes());
        if entities
            .iter()
            .any(|entity| entity.entity_type == entity_type && entity.value_sha256 == value_sha256)
        {
            continue;
        }
        entities.push(ExtractedEntity {
            entity_type,
            value_redacted: redact_value(entity_type, value),
            value_sha256,
            confidence: PATTERN_CONFIDENCE,
            provenance: Provenance {
                source,
                attachment_id: attachment_id.cloned(),
                start: found.start(),
                end: found.end(),
            },
            directory_miss: false,
        });
    }
}

/// Stamps `directory_miss` on directory-backed entities.
fn stamp_directory_misses(
    entities: &mut [ExtractedEntity],
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) {
    for entity in entities.iter_mut() {
        let lookup = match entity.entity_type {
            ExtractedEntityType::PolicyNumber => Some(lookup_existence(
                directory,
                retry,
                backoff,
                &entity.value_redacted,
                LookupKind::Policy,
            )),
            ExtractedEntityType::ClaimNumber => Some(lookup_existence(
                directory,
                retry,
                backoff,
                &entity.value_redacted,
                LookupKind::Claim,
            )),
            ExtractedEntityType::CustomerNumber => Some(lookup_existence(
                directory,
                retry,
                backoff,
                &entity.value_redacted,
                LookupKind::Customer,
            )),
            _ => None,
        };
        if let Some(exists) = lookup {
            entity.directory_miss = !exists.unwrap_or(true);
        }
    }
}

/// Directory lookup kind for existence checks.
enum LookupKind {
    /// Policy lookup.
    Policy,
    /// Claim lookup.
    Claim,
    /// Customer lookup.
    Customer,
}

/// Checks whether an identifier exists in the directory.
///
/// Returns `None` when the directory is unavailable; callers leave the
/// `directory_miss` flag clear in that case rather than asserting a miss.
fn lookup_existence(
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
    value: &str,
    kind: LookupKind,
) -> Option<bool> {
    let id = crate::core::EntityId::new(value);
    let result = with_retry(
        retry,
        backoff,
        |err: &DirectoryError| matches!(err, DirectoryError::Unavailable(_)),
        || match kind {
            LookupKind::Policy => directory.lookup_policy(&id),
            LookupKind::Claim => directory.lookup_claim(&id),
            LookupKind::Customer => directory.lookup_customer(&id),
        },
    );
    match result {
        Ok(record) => Some(record.is_some()),
        Err(_) => None,
    }
}

// ============================================================================
// SECTION: LLM Extraction
// ============================================================================

/// Strict-JSON entity proposal in model output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmEntity {
    /// Canonical entity type.
    entity_type: ExtractedEntityType,
    /// Proposed full value.
    value: String,
    /// Confidence.
    confidence: f64,
    /// Source text kind.
    source: EvidenceSource,
    /// Attachment identifier for attachment text.
    #[serde(default)]
    attachment_id: Option<String>,
    /// Value start offset.
    start: usize,
    /// Value end offset.
    end: usize,
}

/// Strict-JSON extraction output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmExtraction {
    /// Proposed entities.
    entities: Vec<LlmEntity>,
}

/// Versioned extraction prompt template.
const EXTRACT_PROMPT_V1: &str = "You are an insurance intake entity \
extractor. Return ONLY a JSON object {\"entities\": [...]} using canonical \
entity types, with byte offsets into the given canonical text.";

/// Runs the LLM extraction pass and validates every proposal.
fn llm_entities(
    inputs: &ExtractInputs<'_>,
    snapshot: &ConfigSnapshot,
    directory: &dyn DirectoryAdapter,
    llm: &dyn LlmProvider,
    cache: &dyn InferenceCache,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<Vec<ExtractedEntity>, StageError> {
    let params = InferenceParams {
        temperature: snapshot.llm.temperature,
        top_p: snapshot.llm.top_p,
        max_tokens: snapshot.llm.max_tokens,
    };
    let prompt = format!(
        "{EXTRACT_PROMPT_V1}\n\nSubject:\n{}\n\nBody:\n{}\n",
        inputs.normalized.subject_c14n, inputs.normalized.body_c14n
    );
    let prompt_sha256 = HashDigest::of_bytes(prompt.as_bytes());
    let input_digest = inputs.normalized.message_fingerprint.clone();
    let key = llm_cache_key(
        InferencePurpose::Extract,
        &snapshot.llm.model_id,
        &params,
        &prompt_sha256,
        &input_digest,
    )
    .map_err(|err| StageError::internal(Stage::Extract, err.to_string()))?;

    let output: Option<LlmExtraction> = if let Ok(Some(artifact)) = cache.lookup(&key) {
        serde_json::from_value(artifact.output_json).ok()
    } else if snapshot.determinism_mode {
        return Err(StageError::determinism(Stage::Extract, REASON_DETERMINISM_CACHE_MISS));
    } else {
        let raw = with_retry(
            retry,
            backoff,
            |err: &LlmError| matches!(err, LlmError::Unavailable(_)),
            || llm.infer(&prompt, &params),
        )
        .map_err(|err| StageError::dependency(Stage::Extract, err.to_string()))?;
        let parsed = serde_json::from_str::<LlmExtraction>(&raw).ok();
        if parsed.is_some()
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw)
            && let Ok(artifact) = LlmInferenceArtifact::new(
                InferencePurpose::Extract,
                snapshot.llm.model_id.clone(),
                params,
                prompt_sha256,
                input_digest,
                value,
            )
        {
            let _ = cache.record(&key, &artifact);
        }
        parsed
    };

    // Unparseable LLM extraction degrades to the rule-based result.
    let Some(output) = output else {
        return Ok(Vec::new());
    };

    let mut validated = Vec::new();
    for proposal in &output.entities {
        if let Some(entity) = validate_proposal(inputs, proposal, snapshot, directory, retry, backoff)
        {
            validated.push(entity);
        }
    }
    Ok(validated)
}

/// Validates one LLM entity proposal.
fn validate_proposal(
    inputs: &ExtractInputs<'_>,
    proposal: &LlmEntity,
    snapshot: &ConfigSnapshot,
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Option<ExtractedEntity> {
    if proposal.entity_type == ExtractedEntityType::Iban && !snapshot.extraction.iban_enabled {
        return None;
    }

    // Verbatim offset verification against the canonical text.
    let attachment_id = proposal.attachment_id.as_ref().map(|id| AttachmentId::new(id.as_str()));
    let text = inputs.resolve_text(proposal.source, attachment_id.as_ref())?;
    let slice = text.get(proposal.start .. proposal.end)?;
    if slice != proposal.value {
        return None;
    }

    // Pattern validation for checkable types.
    let pattern_ok = match proposal.entity_type {
        ExtractedEntityType::PolicyNumber => validators::validate_policy_number(&proposal.value),
        ExtractedEntityType::ClaimNumber => validators::validate_claim_number(&proposal.value),
        ExtractedEntityType::CustomerNumber => {
            validators::validate_customer_number(&proposal.value)
        }
        ExtractedEntityType::Iban => validators::validate_iban(&proposal.value),
        _ => true,
    };
    if !pattern_ok {
        return None;
    }

    // Directory existence check for directory-backed types.
    let directory_miss = match proposal.entity_type {
        ExtractedEntityType::PolicyNumber => {
            lookup_existence(directory, retry, backoff, &proposal.value, LookupKind::Policy)
                .map(|exists| !exists)
                .unwrap_or(false)
        }
        ExtractedEntityType::ClaimNumber => {
            lookup_existence(directory, retry, backoff, &proposal.value, LookupKind::Claim)
                .map(|exists| !exists)
                .unwrap_or(false)
        }
        ExtractedEntityType::CustomerNumber => {
            lookup_existence(directory, retry, backoff, &proposal.value, LookupKind::Customer)
                .map(|exists| !exists)
                .unwrap_or(false)
        }
        _ => false,
    };

    Some(ExtractedEntity {
        entity_type: proposal.entity_type,
        value_redacted: redact_value(proposal.entity_type, &proposal.value),
        value_sha256: HashDigest::of_bytes(proposal.value.as_bytes()),
        confidence: proposal.confidence,
        provenance: Provenance {
            source: proposal.source,
            attachment_id,
            start: proposal.start,
            end: proposal.end,
        },
        directory_miss,
    })
}
