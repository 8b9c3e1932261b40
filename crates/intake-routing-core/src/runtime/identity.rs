// crates/intake-routing-core/src/runtime/identity.rs
// ============================================================================
// Module: Identity Stage
// Description: Deterministic identity signal extraction, scoring, and ranking.
// Purpose: Resolve the message to directory entities or route to review.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{retry, validators}
// ============================================================================

//! ## Overview
//! Identity resolution extracts candidate identifiers with validated
//! patterns, corroborates them against the directory, scores candidates
//! from weighted signals, and derives a status from thresholds and margins.
//! Every step is deterministic: ranking ties break on fixed entity-type
//! preference, directory status, score, and finally lexicographic entity id.
//! A directory outage degrades the outcome to NEEDS_REVIEW; it never
//! produces CONFIRMED.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::AttachmentId;
use crate::core::EntityId;
use crate::core::EvidenceSource;
use crate::core::EvidenceSpan;
use crate::core::IdentityCandidate;
use crate::core::IdentityResolutionResult;
use crate::core::IdentitySignal;
use crate::core::NormalizedMessage;
use crate::core::SignalName;
use crate::core::SignalStrength;
use crate::core::SignalWeights;
use crate::core::StageError;
use crate::core::error::REASON_DIRECTORY_UNAVAILABLE;
use crate::core::identity::CandidateStatus;
use crate::core::registry::EntityType;
use crate::core::registry::IdentityStatus;
use crate::core::snapshot::ConfigSnapshot;
use crate::interfaces::DirectoryAdapter;
use crate::interfaces::DirectoryError;
use crate::interfaces::DirectoryRecord;
use crate::runtime::retry::Backoff;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::with_retry;
use crate::runtime::validators;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Inputs to identity resolution.
pub struct IdentityInputs<'a> {
    /// Normalized message.
    pub normalized: &'a NormalizedMessage,
    /// Canonical extracted texts of CLEAN attachments.
    pub attachment_texts: &'a [(AttachmentId, String)],
    /// Candidate keys proposed by LLM assist (LLM_FIRST mode only); each is
    /// accepted only after pattern validation and directory existence.
    pub assist_proposals: &'a [String],
    /// Entities resolved earlier on the same thread.
    pub thread_entities: &'a [(EntityType, EntityId)],
    /// True when deterministic rules indicate a claim-related message.
    pub claim_related_hint: bool,
}

// ============================================================================
// SECTION: Candidate Accumulation
// ============================================================================

/// Mutable candidate under construction.
struct CandidateDraft {
    /// Entity type.
    entity_type: EntityType,
    /// Entity identifier.
    entity_id: EntityId,
    /// Accumulated signals.
    signals: Vec<IdentitySignal>,
    /// Accumulated evidence.
    evidence: Vec<EvidenceSpan>,
    /// Directory record, once looked up.
    directory: Option<DirectoryRecord>,
    /// True when the directory lookup completed without a record.
    directory_missing: bool,
}

impl CandidateDraft {
    /// Creates an empty draft for an entity.
    fn new(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self {
            entity_type,
            entity_id,
            signals: Vec::new(),
            evidence: Vec::new(),
            directory: None,
            directory_missing: false,
        }
    }
}

// ============================================================================
// SECTION: Stage Execution
// ============================================================================

/// Runs identity resolution.
///
/// # Errors
///
/// Returns [`StageError`] only for internal failures; directory outages
/// degrade the result instead of failing the stage.
pub fn resolve(
    inputs: &IdentityInputs<'_>,
    snapshot: &ConfigSnapshot,
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<IdentityResolutionResult, StageError> {
    let weights = &snapshot.identity.signal_weights;
    let mut drafts: BTreeMap<(EntityType, String), CandidateDraft> = BTreeMap::new();
    let mut degraded = false;

    extract_identifier_signals(inputs, weights, &mut drafts);
    lookup_pattern_candidates(directory, retry, backoff, &mut drafts, &mut degraded);
    add_sender_match(inputs, weights, directory, retry, backoff, &mut drafts, &mut degraded);
    add_thread_linkage(inputs, weights, &mut drafts);
    add_signature_fuzzy(inputs, snapshot, weights, &mut drafts);
    add_assist_proposals(inputs, weights, directory, retry, backoff, &mut drafts, &mut degraded);

    downgrade_unknown_candidates(&mut drafts);

    let shared_mailbox = is_shared_mailbox(snapshot, &inputs.normalized.sender);
    let mut candidates: Vec<IdentityCandidate> = drafts
        .into_values()
        .map(|draft| finalize_candidate(draft, snapshot, shared_mailbox))
        .collect();

    rank_candidates(&mut candidates, inputs.claim_related_hint);
    candidates.truncate(snapshot.identity.top_k);

    let status = derive_status(&candidates, snapshot, degraded);
    let reason = degraded.then(|| REASON_DIRECTORY_UNAVAILABLE.to_string());

    Ok(IdentityResolutionResult {
        message_id: inputs.normalized.message_id.clone(),
        status,
        top_k: candidates,
        thresholds: snapshot.identity.thresholds,
        reason,
    })
}

// ============================================================================
// SECTION: Signal Extraction
// ============================================================================

/// Iterates canonical texts of a message.
fn texts<'a>(
    inputs: &'a IdentityInputs<'_>,
) -> Vec<(EvidenceSource, Option<AttachmentId>, &'a str)> {
    let mut out = vec![
        (EvidenceSource::Subject, None, inputs.normalized.subject_c14n.as_str()),
        (EvidenceSource::Body, None, inputs.normalized.body_c14n.as_str()),
    ];
    for (attachment_id, text) in inputs.attachment_texts {
        out.push((EvidenceSource::AttachmentText, Some(attachment_id.clone()), text.as_str()));
    }
    out
}

/// Extracts validated identifier signals from all texts.
fn extract_identifier_signals(
    inputs: &IdentityInputs<'_>,
    weights: &SignalWeights,
    drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>,
) {
    let extractors: [(&std::sync::LazyLock<Option<regex::Regex>>, fn(&str) -> bool, EntityType, SignalName);
        3] = [
        (&validators::POLICY_NUMBER, validators::validate_policy_number, EntityType::Policy,
            SignalName::PolicyNumber),
        (&validators::CLAIM_NUMBER, validators::validate_claim_number, EntityType::Claim,
            SignalName::ClaimNumber),
        (&validators::CUSTOMER_NUMBER, validators::validate_customer_number, EntityType::Customer,
            SignalName::CustomerNumber),
    ];

    for (source, attachment_id, text) in texts(inputs) {
        for (pattern, validate, entity_type, signal_name) in &extractors {
            let Some(pattern) = pattern.as_ref() else {
                continue;
            };
            for found in pattern.find_iter(text) {
                let value = found.as_str();
                if !validate(value) {
                    continue;
                }
                let draft = drafts
                    .entry((*entity_type, value.to_string()))
                    .or_insert_with(|| CandidateDraft::new(*entity_type, EntityId::new(value)));
                if draft.signals.iter().any(|signal| signal.name == *signal_name) {
                    continue;
                }
                draft.signals.push(IdentitySignal {
                    name: *signal_name,
                    value: value.to_string(),
                    strength: SignalWeights::strength_for(*signal_name),
                    weight: weights.weight_for(*signal_name),
                });
                if let Some(span) = EvidenceSpan::over(
                    source,
                    attachment_id.clone(),
                    text,
                    found.start(),
                    found.end(),
                ) {
                    draft.evidence.push(span);
                }
            }
        }
    }
}

/// Looks up directory records for pattern-derived candidates.
fn lookup_pattern_candidates(
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
    drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>,
    degraded: &mut bool,
) {
    for draft in drafts.values_mut() {
        let lookup = with_retry(
            retry,
            backoff,
            |err: &DirectoryError| matches!(err, DirectoryError::Unavailable(_)),
            || match draft.entity_type {
                EntityType::Policy => directory.lookup_policy(&draft.entity_id),
                EntityType::Claim => directory.lookup_claim(&draft.entity_id),
                EntityType::Customer | EntityType::Contact | EntityType::Broker => {
                    directory.lookup_customer(&draft.entity_id)
                }
            },
        );
        match lookup {
            Ok(Some(record)) => draft.directory = Some(record),
            Ok(None) => draft.directory_missing = true,
            Err(_) => *degraded = true,
        }
    }
}

/// Adds a sender directory match candidate when the sender is on file.
fn add_sender_match(
    inputs: &IdentityInputs<'_>,
    weights: &SignalWeights,
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
    drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>,
    degraded: &mut bool,
) {
    let lookup = with_retry(
        retry,
        backoff,
        |err: &DirectoryError| matches!(err, DirectoryError::Unavailable(_)),
        || directory.lookup_customer_by_email(&inputs.normalized.sender),
    );
    let records = match lookup {
        Ok(records) => records,
        Err(_) => {
            *degraded = true;
            return;
        }
    };
    for record in records {
        let key = (record.entity_type, record.entity_id.as_str().to_string());
        let draft = drafts
            .entry(key)
            .or_insert_with(|| CandidateDraft::new(record.entity_type, record.entity_id.clone()));
        draft.signals.push(IdentitySignal {
            name: SignalName::SenderDirectoryMatch,
            value: inputs.normalized.sender.clone(),
            strength: SignalWeights::strength_for(SignalName::SenderDirectoryMatch),
            weight: weights.weight_for(SignalName::SenderDirectoryMatch),
        });
        draft.directory = Some(record);
    }
}

/// Adds thread linkage signals for entities resolved earlier on the thread.
fn add_thread_linkage(
    inputs: &IdentityInputs<'_>,
    weights: &SignalWeights,
    drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>,
) {
    let thread = &inputs.normalized.thread;
    if thread.in_reply_to.is_none() && thread.conversation_id.is_none() {
        return;
    }
    for (entity_type, entity_id) in inputs.thread_entities {
        let key = (*entity_type, entity_id.as_str().to_string());
        let draft = drafts
            .entry(key)
            .or_insert_with(|| CandidateDraft::new(*entity_type, entity_id.clone()));
        draft.signals.push(IdentitySignal {
            name: SignalName::ThreadLinkage,
            value: thread
                .conversation_id
                .clone()
                .or_else(|| thread.in_reply_to.clone())
                .unwrap_or_default(),
            strength: SignalWeights::strength_for(SignalName::ThreadLinkage),
            weight: weights.weight_for(SignalName::ThreadLinkage),
        });
    }
}

/// Adds fuzzy signature-match signals against directory display names.
fn add_signature_fuzzy(
    inputs: &IdentityInputs<'_>,
    snapshot: &ConfigSnapshot,
    weights: &SignalWeights,
    drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>,
) {
    let Some(display_name) = &inputs.normalized.sender_display_name else {
        return;
    };
    let folded_sender = validators::fold_for_match(display_name);
    for draft in drafts.values_mut() {
        let Some(record) = &draft.directory else {
            continue;
        };
        let Some(record_name) = &record.display_name else {
            continue;
        };
        let similarity =
            validators::normalized_levenshtein(&folded_sender, &validators::fold_for_match(record_name));
        if similarity >= snapshot.identity.fuzzy_match_threshold
            && !draft.signals.iter().any(|signal| signal.name == SignalName::SignatureFuzzyMatch)
        {
            draft.signals.push(IdentitySignal {
                name: SignalName::SignatureFuzzyMatch,
                value: record_name.clone(),
                strength: SignalWeights::strength_for(SignalName::SignatureFuzzyMatch),
                weight: weights.weight_for(SignalName::SignatureFuzzyMatch),
            });
        }
    }
}

/// Validates and adds LLM-assist proposals.
fn add_assist_proposals(
    inputs: &IdentityInputs<'_>,
    weights: &SignalWeights,
    directory: &dyn DirectoryAdapter,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
    drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>,
    degraded: &mut bool,
) {
    for proposal in inputs.assist_proposals {
        let classified = classify_proposal(proposal);
        let Some(entity_type) = classified else {
            continue;
        };
        let entity_id = EntityId::new(proposal.as_str());
        let lookup = with_retry(
            retry,
            backoff,
            |err: &DirectoryError| matches!(err, DirectoryError::Unavailable(_)),
            || match entity_type {
                EntityType::Policy => directory.lookup_policy(&entity_id),
                EntityType::Claim => directory.lookup_claim(&entity_id),
                EntityType::Customer | EntityType::Contact | EntityType::Broker => {
                    directory.lookup_customer(&entity_id)
                }
            },
        );
        let record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(_) => {
                *degraded = true;
                continue;
            }
        };
        let key = (entity_type, proposal.clone());
        let draft =
            drafts.entry(key).or_insert_with(|| CandidateDraft::new(entity_type, entity_id));
        if draft.signals.iter().any(|signal| signal.name == SignalName::LlmAssistProposal) {
            continue;
        }
        draft.signals.push(IdentitySignal {
            name: SignalName::LlmAssistProposal,
            value: proposal.clone(),
            strength: SignalWeights::strength_for(SignalName::LlmAssistProposal),
            weight: weights.weight_for(SignalName::LlmAssistProposal),
        });
        draft.directory = Some(record);
    }
}

/// Classifies an assist proposal by pattern, validating structure.
fn classify_proposal(proposal: &str) -> Option<EntityType> {
    if validators::POLICY_NUMBER.as_ref().is_some_and(|re| re.is_match(proposal))
        && validators::validate_policy_number(proposal)
    {
        return Some(EntityType::Policy);
    }
    if validators::CLAIM_NUMBER.as_ref().is_some_and(|re| re.is_match(proposal))
        && validators::validate_claim_number(proposal)
    {
        return Some(EntityType::Claim);
    }
    if validators::CUSTOMER_NUMBER.as_ref().is_some_and(|re| re.is_match(proposal))
        && validators::validate_customer_number(proposal)
    {
        return Some(EntityType::Customer);
    }
    None
}

/// Downgrades hard signals of candidates unknown to the directory.
///
/// A pattern-valid identifier whose lookup completed without a record
/// corroborates at medium strength at best. Candidates whose lookup never
/// completed keep their signals; the outage already degrades the status.
fn downgrade_unknown_candidates(drafts: &mut BTreeMap<(EntityType, String), CandidateDraft>) {
    for draft in drafts.values_mut() {
        if draft.directory_missing && draft.directory.is_none() {
            for signal in &mut draft.signals {
                if signal.strength == SignalStrength::Hard {
                    signal.strength = SignalStrength::Medium;
                    signal.weight = signal.weight.min(SignalStrength::Medium.base_weight());
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Scoring and Ranking
// ============================================================================

/// Returns true when the sender is a configured shared mailbox.
fn is_shared_mailbox(snapshot: &ConfigSnapshot, sender: &str) -> bool {
    let folded = validators::fold_for_match(sender);
    snapshot
        .identity
        .shared_mailboxes
        .iter()
        .any(|mailbox| validators::fold_for_match(mailbox) == folded)
}

/// Finalizes a draft into a scored candidate.
fn finalize_candidate(
    draft: CandidateDraft,
    snapshot: &ConfigSnapshot,
    shared_mailbox: bool,
) -> IdentityCandidate {
    let score_raw: f64 = draft.signals.iter().map(|signal| signal.weight).sum();
    let penalty = if shared_mailbox {
        snapshot.identity.shared_mailbox_penalty
    } else {
        0.0
    };
    let score = (score_raw - penalty).clamp(0.0, 1.0);
    IdentityCandidate {
        entity_type: draft.entity_type,
        entity_id: draft.entity_id,
        score,
        signals: draft.signals,
        evidence: draft.evidence,
        directory_status: draft.directory.map(|record| record.status),
    }
}

/// Preference rank of an entity type; lower ranks order first.
const fn entity_type_rank(entity_type: EntityType, claim_related: bool) -> u8 {
    if claim_related {
        match entity_type {
            EntityType::Claim => 0,
            EntityType::Policy => 1,
            EntityType::Customer => 2,
            EntityType::Contact => 3,
            EntityType::Broker => 4,
        }
    } else {
        match entity_type {
            EntityType::Policy => 0,
            EntityType::Customer => 1,
            EntityType::Claim => 2,
            EntityType::Contact => 3,
            EntityType::Broker => 4,
        }
    }
}

/// Rank of a directory status; lower ranks order first.
const fn directory_status_rank(status: Option<CandidateStatus>) -> u8 {
    match status {
        Some(CandidateStatus::Active) => 0,
        Some(CandidateStatus::Closed) => 1,
        None => 2,
    }
}

/// Sorts candidates by the canonical deterministic ranking.
fn rank_candidates(candidates: &mut [IdentityCandidate], claim_related: bool) {
    candidates.sort_by(|a, b| {
        let hard = b.has_hard_signal().cmp(&a.has_hard_signal());
        if hard != std::cmp::Ordering::Equal {
            return hard;
        }
        let type_rank = entity_type_rank(a.entity_type, claim_related)
            .cmp(&entity_type_rank(b.entity_type, claim_related));
        if type_rank != std::cmp::Ordering::Equal {
            return type_rank;
        }
        let status_rank =
            directory_status_rank(a.directory_status).cmp(&directory_status_rank(b.directory_status));
        if status_rank != std::cmp::Ordering::Equal {
            return status_rank;
        }
        let score = b.score.total_cmp(&a.score);
        if score != std::cmp::Ordering::Equal {
            return score;
        }
        a.entity_id.as_str().cmp(b.entity_id.as_str())
    });
}

// ============================================================================
// SECTION: Status Derivation
// ============================================================================

/// Derives the identity status from the ranked candidates.
fn derive_status(
    candidates: &[IdentityCandidate],
    snapshot: &ConfigSnapshot,
    degraded: bool,
) -> IdentityStatus {
    if degraded {
        // A directory outage never confirms; pending lookups make even an
        // empty pool ambiguous.
        return IdentityStatus::NeedsReview;
    }
    let Some(top) = candidates.first() else {
        return IdentityStatus::NoCandidate;
    };
    let thresholds = snapshot.identity.thresholds;
    let second_score = candidates.get(1).map_or(0.0, |candidate| candidate.score);
    let margin = top.score - second_score;

    if top.score >= thresholds.theta_confirm
        && margin >= thresholds.delta_confirm
        && top.has_hard_signal()
    {
        return IdentityStatus::Confirmed;
    }
    if top.score >= thresholds.theta_probable
        && margin >= thresholds.delta_probable
        && top.has_medium_signal()
    {
        return IdentityStatus::Probable;
    }
    IdentityStatus::NeedsReview
}
