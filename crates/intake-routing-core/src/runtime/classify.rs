// crates/intake-routing-core/src/runtime/classify.rs
// ============================================================================
// Module: Classify Stage
// Description: Risk prescan, rule/model classification, and LLM-first gating.
// Purpose: Produce an accepted classification or route to review.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{cache, retry}
// ============================================================================

//! ## Overview
//! Classification runs in two modes. BASELINE combines versioned keyword
//! rules with a deterministic lexicon model. LLM_FIRST asks the model for a
//! strict-JSON result and accepts it only when every gate passes: canonical
//! labels, confidence thresholds, verified evidence spans, and no
//! disagreement with a high-confidence deterministic rule. The risk prescan
//! always runs first and its findings are never removed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::core::AttachmentId;
use crate::core::AttachmentRecord;
use crate::core::ClassificationResult;
use crate::core::EvidenceSource;
use crate::core::EvidenceSpan;
use crate::core::IntentScore;
use crate::core::LlmInferenceArtifact;
use crate::core::NormalizedMessage;
use crate::core::PipelineMode;
use crate::core::RiskFinding;
use crate::core::RiskOrigin;
use crate::core::Stage;
use crate::core::StageError;
use crate::core::error::REASON_DETERMINISM_CACHE_MISS;
use crate::core::error::REASON_LLM_REJECTED;
use crate::core::error::REASON_RULE_DISAGREEMENT;
use crate::core::inference::InferenceParams;
use crate::core::inference::InferencePurpose;
use crate::core::inference::llm_cache_key;
use crate::core::registry::IntentLabel;
use crate::core::registry::ProductLine;
use crate::core::registry::RiskFlag;
use crate::core::registry::Urgency;
use crate::core::snapshot::ConfigSnapshot;
use crate::interfaces::LlmError;
use crate::interfaces::LlmProvider;
use crate::runtime::cache::InferenceCache;
use crate::runtime::retry::Backoff;
use crate::runtime::retry::RetryPolicy;
use crate::runtime::retry::with_retry;
use crate::runtime::validators::fold_for_match;

// ============================================================================
// SECTION: Rule Tables
// ============================================================================

/// One versioned keyword rule.
struct KeywordRule<L> {
    /// Label the rule asserts.
    label: L,
    /// Rule confidence.
    confidence: f64,
    /// Compiled pattern; `None` when the literal failed to compile.
    pattern: Option<Regex>,
}

/// Compiles a case-insensitive rule pattern.
fn rule<L>(label: L, confidence: f64, pattern: &str) -> KeywordRule<L> {
    KeywordRule {
        label,
        confidence,
        pattern: Regex::new(&format!("(?i){pattern}")).ok(),
    }
}

/// Intent rules, in table order.
static INTENT_RULES: LazyLock<Vec<KeywordRule<IntentLabel>>> = LazyLock::new(|| {
    vec![
        rule(
            IntentLabel::GdprRequest,
            0.95,
            r"dsgvo|gdpr|auskunftsersuchen|datenauskunft|art\.?\s*15|datenschutzauskunft",
        ),
        rule(
            IntentLabel::Legal,
            0.85,
            r"anwalt|anwältin|rechtsanwalt|kanzlei|attorney|lawyer|vollmacht",
        ),
        rule(
            IntentLabel::Complaint,
            0.86,
            r"beschwerde|complaint|unzufrieden|ombudsmann|beschweren",
        ),
        rule(
            IntentLabel::ClaimNew,
            0.88,
            r"unfall|schaden(?:sfall|smeldung)?|kollision|accident|collision|diebstahl|einbruch|wasserschaden",
        ),
        rule(IntentLabel::ClaimUpdate, 0.84, r"\bCLM-\d{4}-\d{8}\b|schadennummer|claim number"),
        rule(
            IntentLabel::PolicyCancellation,
            0.9,
            r"kündigung|kündigen|cancel (?:my )?policy|vertrag beenden",
        ),
        rule(
            IntentLabel::PolicyChange,
            0.8,
            r"vertragsänderung|adresse ändern|änderung (?:der|meiner)|update my policy|namensänderung",
        ),
        rule(
            IntentLabel::BillingQuestion,
            0.82,
            r"rechnung|beitrag|prämie|abbuchung|lastschrift|invoice|premium payment|mahnung",
        ),
        rule(
            IntentLabel::DocumentSubmission,
            0.75,
            r"anbei|im anhang|beigefügt|attached (?:you|please) find|unterlagen",
        ),
        rule(
            IntentLabel::CoverageQuestion,
            0.78,
            r"versichert|deckung|coverage|abgedeckt|versicherungsschutz",
        ),
        rule(
            IntentLabel::BrokerIntermediary,
            0.8,
            r"makler|vermittler|broker|courtage|bestandsübertragung",
        ),
        rule(
            IntentLabel::Technical,
            0.77,
            r"passwort|login|portal|app funktioniert|technisches problem|website",
        ),
    ]
});

/// Product rules, in table order.
static PRODUCT_RULES: LazyLock<Vec<KeywordRule<ProductLine>>> = LazyLock::new(|| {
    vec![
        rule(
            ProductLine::Auto,
            0.8,
            r"kfz|pkw|auto(?:bahn)?|fahrzeug|unfall|kennzeichen|motorrad|\bA\d{1,2}\b",
        ),
        rule(ProductLine::Household, 0.75, r"hausrat|einbruch|diebstahl wohnung"),
        rule(ProductLine::Building, 0.75, r"wohngebäude|gebäude|wasserschaden|sturmschaden"),
        rule(ProductLine::Liability, 0.75, r"haftpflicht|liability"),
        rule(ProductLine::LegalExpenses, 0.75, r"rechtsschutz|legal expenses"),
        rule(ProductLine::Accident, 0.72, r"unfallversicherung|invalidität"),
        rule(ProductLine::Life, 0.75, r"lebensversicherung|life insurance|todesfall"),
        rule(ProductLine::Health, 0.75, r"krankenversicherung|health insurance|zahnzusatz"),
        rule(ProductLine::Travel, 0.75, r"reiserücktritt|reiseversicherung|travel insurance"),
        rule(ProductLine::Commercial, 0.72, r"betriebshaftpflicht|gewerbe|commercial policy"),
    ]
});

/// Urgency rules, in table order.
static URGENCY_RULES: LazyLock<Vec<KeywordRule<Urgency>>> = LazyLock::new(|| {
    vec![
        rule(
            Urgency::Critical,
            0.9,
            r"notfall|emergency|lebensgefahr|sofortige hilfe",
        ),
        rule(
            Urgency::High,
            0.8,
            r"dringend|sofort|urgent|asap|umgehend|unfall|frist läuft",
        ),
        rule(Urgency::Low, 0.7, r"keine eile|bei gelegenheit|no rush"),
    ]
});

/// Risk prescan rules, in table order.
static RISK_RULES: LazyLock<Vec<KeywordRule<RiskFlag>>> = LazyLock::new(|| {
    vec![
        rule(
            RiskFlag::LegalThreat,
            1.0,
            r"klage einreichen|rechtliche schritte|verklagen|legal action|sue you|einstweilige verfügung",
        ),
        rule(
            RiskFlag::Regulatory,
            1.0,
            r"bafin|aufsichtsbehörde|regulator|supervisory authority|versicherungsombudsmann",
        ),
        rule(
            RiskFlag::FraudSignal,
            1.0,
            r"betrugsverdacht|fingiert|gefälscht|staged accident|fraud(?:ulent)?",
        ),
        rule(
            RiskFlag::SelfHarmThreat,
            1.0,
            r"suizid|selbstmord|nicht mehr leben|kill myself|end my life|suicide",
        ),
        rule(
            RiskFlag::AutoreplyLoop,
            1.0,
            r"out of office|abwesenheitsnotiz|automatische antwort|auto-?reply|autoreply",
        ),
        rule(
            RiskFlag::PhishingSuspected,
            1.0,
            r"verify your account|confirm your password|klicken sie hier um ihr konto",
        ),
        rule(RiskFlag::MediaPress, 1.0, r"presseanfrage|journalist|press inquiry|redaktion"),
    ]
});

/// Ratio of non-Latin letters above which the language is unsupported.
const UNSUPPORTED_LANGUAGE_RATIO: f64 = 0.3;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Inputs to classification.
pub struct ClassifyInputs<'a> {
    /// Normalized message.
    pub normalized: &'a NormalizedMessage,
    /// Canonical extracted texts of CLEAN attachments.
    pub attachment_texts: &'a [(AttachmentId, String)],
    /// Stamped attachment records.
    pub attachments: &'a [AttachmentRecord],
}

impl ClassifyInputs<'_> {
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

    /// Resolves the canonical text an evidence span refers to.
    fn resolve_text(&self, source: EvidenceSource, attachment_id: Option<&AttachmentId>) -> Option<&str> {
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
// SECTION: Deterministic Hits
// ============================================================================

/// One deterministic rule hit.
pub struct RuleHit {
    /// Asserted intent.
    pub intent: IntentLabel,
    /// Rule confidence.
    pub confidence: f64,
    /// Evidence span of the first match.
    pub evidence: Option<EvidenceSpan>,
}

/// Runs the deterministic intent rules over all texts.
fn intent_rule_hits(inputs: &ClassifyInputs<'_>) -> Vec<RuleHit> {
    let mut hits: Vec<RuleHit> = Vec::new();
    for (source, attachment_id, text) in inputs.texts() {
        for keyword_rule in INTENT_RULES.iter() {
            let Some(pattern) = &keyword_rule.pattern else {
                continue;
            };
            let Some(found) = pattern.find(text) else {
                continue;
            };
            if hits.iter().any(|hit| hit.intent == keyword_rule.label) {
                continue;
            }
            hits.push(RuleHit {
                intent: keyword_rule.label,
                confidence: keyword_rule.confidence,
                evidence: EvidenceSpan::over(
                    source,
                    attachment_id.clone(),
                    text,
                    found.start(),
                    found.end(),
                ),
            });
        }
    }
    hits
}

/// Returns true when deterministic rules indicate a claim-related message.
///
/// Used by identity resolution for its entity-type preference, which must
/// not depend on the (possibly LLM-derived) final classification.
#[must_use]
pub fn claim_related_hint(subject_c14n: &str, body_c14n: &str) -> bool {
    INTENT_RULES.iter().filter(|keyword_rule| keyword_rule.label.is_claim_related()).any(
        |keyword_rule| {
            keyword_rule.pattern.as_ref().is_some_and(|pattern| {
                pattern.is_match(subject_c14n) || pattern.is_match(body_c14n)
            })
        },
    )
}

// ============================================================================
// SECTION: Risk Prescan
// ============================================================================

/// Runs the always-on deterministic risk prescan.
#[must_use]
pub fn prescan_risks(inputs: &ClassifyInputs<'_>, snapshot: &ConfigSnapshot) -> Vec<RiskFinding> {
    let mut findings: Vec<RiskFinding> = Vec::new();

    // Attachment AV verdicts dominate everything else.
    if inputs.attachments.iter().any(|record| record.av_status.blocks_case()) {
        findings.push(RiskFinding {
            flag: RiskFlag::SecurityMalware,
            confidence: 1.0,
            origin: RiskOrigin::AttachmentScan,
            evidence: Vec::new(),
        });
    }

    if is_vip_sender(snapshot, &inputs.normalized.sender) {
        findings.push(RiskFinding {
            flag: RiskFlag::VipSender,
            confidence: 1.0,
            origin: RiskOrigin::Prescan,
            evidence: Vec::new(),
        });
    }

    for (source, attachment_id, text) in inputs.texts() {
        for keyword_rule in RISK_RULES.iter() {
            let Some(pattern) = &keyword_rule.pattern else {
                continue;
            };
            let Some(found) = pattern.find(text) else {
                continue;
            };
            if findings.iter().any(|finding| finding.flag == keyword_rule.label) {
                continue;
            }
            let evidence = EvidenceSpan::over(
                source,
                attachment_id.clone(),
                text,
                found.start(),
                found.end(),
            );
            findings.push(RiskFinding {
                flag: keyword_rule.label,
                confidence: keyword_rule.confidence,
                origin: RiskOrigin::Prescan,
                evidence: evidence.into_iter().collect(),
            });
        }
    }

    if language_unsupported(&inputs.normalized.body_c14n)
        && !findings.iter().any(|finding| finding.flag == RiskFlag::LanguageUnsupported)
    {
        findings.push(RiskFinding {
            flag: RiskFlag::LanguageUnsupported,
            confidence: 1.0,
            origin: RiskOrigin::Prescan,
            evidence: Vec::new(),
        });
    }

    findings
}

/// Returns true when the sender is on the configured VIP list.
fn is_vip_sender(snapshot: &ConfigSnapshot, sender: &str) -> bool {
    let folded = fold_for_match(sender);
    snapshot.classify.vip_senders.iter().any(|vip| fold_for_match(vip) == folded)
}

/// Deterministic unsupported-language heuristic over letter scripts.
fn language_unsupported(body: &str) -> bool {
    let mut letters = 0usize;
    let mut foreign = 0usize;
    for ch in body.chars() {
        if ch.is_alphabetic() {
            letters += 1;
            if !ch.is_ascii_alphabetic() && !"äöüÄÖÜßéèêàáçñ".contains(ch) {
                foreign += 1;
            }
        }
    }
    if letters < 20 {
        return false;
    }
    #[allow(clippy::cast_precision_loss, reason = "Letter counts are far below 2^52.")]
    let ratio = foreign as f64 / letters as f64;
    ratio > UNSUPPORTED_LANGUAGE_RATIO
}

// ============================================================================
// SECTION: Lexicon Model
// ============================================================================

/// Deterministic lexicon model refining rule confidences.
///
/// The model counts rule-pattern matches per label across all texts and
/// produces a density-based confidence. It is the "small model" sanity
/// check: fully deterministic, no learned state at runtime.
fn lexicon_scores(inputs: &ClassifyInputs<'_>) -> Vec<(IntentLabel, f64)> {
    let mut scores: Vec<(IntentLabel, f64)> = Vec::new();
    for keyword_rule in INTENT_RULES.iter() {
        let Some(pattern) = &keyword_rule.pattern else {
            continue;
        };
        let mut count = 0usize;
        for (_, _, text) in inputs.texts() {
            count += pattern.find_iter(text).count();
        }
        if count > 0 {
            #[allow(clippy::cast_precision_loss, reason = "Match counts are tiny.")]
            let confidence = (0.5 + 0.1 * count as f64).min(0.9);
            scores.push((keyword_rule.label, confidence));
        }
    }
    scores
}

// ============================================================================
// SECTION: Baseline Classification
// ============================================================================

/// Produces the baseline (rules + model) classification.
fn baseline_classification(
    inputs: &ClassifyInputs<'_>,
    snapshot: &ConfigSnapshot,
    risk_flags: Vec<RiskFinding>,
) -> ClassificationResult {
    let hits = intent_rule_hits(inputs);
    let model = lexicon_scores(inputs);

    let mut intents: Vec<IntentScore> = Vec::new();
    for hit in &hits {
        let model_confidence = model
            .iter()
            .find(|(label, _)| *label == hit.intent)
            .map_or(0.0, |(_, confidence)| *confidence);
        intents.push(IntentScore {
            label: hit.intent,
            confidence: hit.confidence.max(model_confidence),
            evidence: hit.evidence.clone().into_iter().collect(),
        });
    }
    if intents.is_empty() {
        intents.push(IntentScore {
            label: IntentLabel::GeneralInquiry,
            confidence: 0.5,
            evidence: Vec::new(),
        });
    }

    let primary_intent = primary_by_priority(&intents).unwrap_or(IntentLabel::GeneralInquiry);
    let (product_line, product_confidence) = product_from_rules(inputs);
    let (urgency, urgency_confidence) = urgency_from_rules(inputs, primary_intent);

    ClassificationResult {
        message_id: inputs.normalized.message_id.clone(),
        intents,
        primary_intent,
        product_line,
        product_confidence,
        urgency,
        urgency_confidence,
        risk_flags,
        rules_version: snapshot.classify.rules_version.clone(),
        mode: snapshot.mode,
        model_id: None,
        prompt_sha256: None,
    }
}

/// Selects the primary intent by canonical priority order.
fn primary_by_priority(intents: &[IntentScore]) -> Option<IntentLabel> {
    IntentLabel::PRIORITY_ORDER
        .iter()
        .copied()
        .find(|label| intents.iter().any(|intent| intent.label == *label))
}

/// Derives the product line from the deterministic product rules.
fn product_from_rules(inputs: &ClassifyInputs<'_>) -> (ProductLine, f64) {
    for (_, _, text) in inputs.texts() {
        for keyword_rule in PRODUCT_RULES.iter() {
            if keyword_rule.pattern.as_ref().is_some_and(|pattern| pattern.is_match(text)) {
                return (keyword_rule.label, keyword_rule.confidence);
            }
        }
    }
    (ProductLine::Unknown, 0.4)
}

/// Derives the urgency from the deterministic urgency rules.
fn urgency_from_rules(inputs: &ClassifyInputs<'_>, primary: IntentLabel) -> (Urgency, f64) {
    for (_, _, text) in inputs.texts() {
        for keyword_rule in URGENCY_RULES.iter() {
            if keyword_rule.pattern.as_ref().is_some_and(|pattern| pattern.is_match(text)) {
                return (keyword_rule.label, keyword_rule.confidence);
            }
        }
    }
    if primary.is_claim_related() {
        (Urgency::High, 0.7)
    } else {
        (Urgency::Normal, 0.6)
    }
}

// ============================================================================
// SECTION: LLM Output Schema
// ============================================================================

/// Strict-JSON evidence span in model output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmEvidence {
    /// Source text kind.
    source: EvidenceSource,
    /// Attachment identifier for attachment text.
    #[serde(default)]
    attachment_id: Option<String>,
    /// Span start offset.
    start: usize,
    /// Span end offset.
    end: usize,
    /// Verbatim snippet.
    snippet: String,
    /// Optional snippet digest asserted by the model.
    #[serde(default)]
    snippet_sha256: Option<String>,
}

/// Strict-JSON scored intent in model output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmIntent {
    /// Canonical intent label.
    label: IntentLabel,
    /// Confidence.
    confidence: f64,
    /// Evidence spans.
    #[serde(default)]
    evidence: Vec<LlmEvidence>,
}

/// Strict-JSON scored value in model output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmScored<L> {
    /// Canonical label.
    label: L,
    /// Confidence.
    confidence: f64,
    /// Evidence spans.
    #[serde(default)]
    evidence: Vec<LlmEvidence>,
}

/// Strict-JSON risk flag in model output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmRisk {
    /// Canonical risk flag.
    label: RiskFlag,
    /// Confidence.
    confidence: f64,
    /// Evidence spans.
    #[serde(default)]
    evidence: Vec<LlmEvidence>,
}

/// Strict-JSON classification output.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmClassification {
    /// Scored intents.
    intents: Vec<LlmIntent>,
    /// Model-declared primary intent (advisory; priority order decides).
    primary_intent: IntentLabel,
    /// Product line.
    product_line: LlmScored<ProductLine>,
    /// Urgency.
    urgency: LlmScored<Urgency>,
    /// Additional risk flags.
    #[serde(default)]
    risk_flags: Vec<LlmRisk>,
}

// ============================================================================
// SECTION: Prompts
// ============================================================================

/// Versioned classification prompt template.
const CLASSIFY_PROMPT_V1: &str = "You are an insurance intake classifier. \
Return ONLY a JSON object with fields intents, primary_intent, product_line, \
urgency, risk_flags using the canonical label vocabulary. Every asserted \
label needs evidence spans with byte offsets into the given canonical text.";

/// Repair suffix appended on the second attempt.
const REPAIR_SUFFIX: &str = "Your previous answer was not valid JSON for the \
required schema. Return ONLY the corrected JSON object, nothing else.";

/// Builds the deterministic classification prompt.
fn build_prompt(normalized: &NormalizedMessage, repair: bool) -> String {
    let mut prompt = format!(
        "{CLASSIFY_PROMPT_V1}\n\nSubject:\n{}\n\nBody:\n{}\n",
        normalized.subject_c14n, normalized.body_c14n
    );
    if repair {
        prompt.push('\n');
        prompt.push_str(REPAIR_SUFFIX);
    }
    prompt
}

// ============================================================================
// SECTION: LLM-First Classification
// ============================================================================

/// Runs the Classify stage.
///
/// # Errors
///
/// Returns [`StageError`] when the LLM-first flow must fail closed:
/// determinism cache miss, unparseable output after the repair attempt,
/// rejected acceptance gates, or rule disagreement.
pub fn classify(
    inputs: &ClassifyInputs<'_>,
    snapshot: &ConfigSnapshot,
    llm: &dyn LlmProvider,
    cache: &dyn InferenceCache,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<ClassificationResult, StageError> {
    let risk_flags = prescan_risks(inputs, snapshot);

    let llm_enabled = snapshot.mode == PipelineMode::LlmFirst && !snapshot.incident.disable_llm;
    if !llm_enabled {
        return Ok(baseline_classification(inputs, snapshot, risk_flags));
    }

    let output = run_llm_inference(inputs, snapshot, llm, cache, retry, backoff)?;
    accept_llm_classification(inputs, snapshot, risk_flags, &output)
}

/// Resolves the LLM classification output through the cache or provider.
fn run_llm_inference(
    inputs: &ClassifyInputs<'_>,
    snapshot: &ConfigSnapshot,
    llm: &dyn LlmProvider,
    cache: &dyn InferenceCache,
    retry: &RetryPolicy,
    backoff: &dyn Backoff,
) -> Result<LlmClassification, StageError> {
    let params = InferenceParams {
        temperature: snapshot.llm.temperature,
        top_p: snapshot.llm.top_p,
        max_tokens: snapshot.llm.max_tokens,
    };
    let prompt = build_prompt(inputs.normalized, false);
    let prompt_sha256 = crate::core::HashDigest::of_bytes(prompt.as_bytes());
    let input_digest = inputs.normalized.message_fingerprint.clone();
    let key = llm_cache_key(
        InferencePurpose::Classify,
        &snapshot.llm.model_id,
        &params,
        &prompt_sha256,
        &input_digest,
    )
    .map_err(|err| StageError::internal(Stage::Classify, err.to_string()))?;

    if let Ok(Some(artifact)) = cache.lookup(&key) {
        return serde_json::from_value(artifact.output_json)
            .map_err(|err| StageError::validation(Stage::Classify, err.to_string()));
    }

    if snapshot.determinism_mode {
        return Err(StageError::determinism(Stage::Classify, REASON_DETERMINISM_CACHE_MISS));
    }

    let mut last_error = String::new();
    for attempt in 0 .. snapshot.classify.max_llm_attempts {
        let attempt_prompt = build_prompt(inputs.normalized, attempt > 0);
        let raw = with_retry(
            retry,
            backoff,
            |err: &LlmError| matches!(err, LlmError::Unavailable(_)),
            || llm.infer(&attempt_prompt, &params),
        )
        .map_err(|err| StageError::dependency(Stage::Classify, err.to_string()))?;

        match serde_json::from_str::<LlmClassification>(&raw) {
            Ok(parsed) => {
                if let Ok(artifact) = LlmInferenceArtifact::new(
                    InferencePurpose::Classify,
                    snapshot.llm.model_id.clone(),
                    params.clone(),
                    prompt_sha256.clone(),
                    input_digest.clone(),
                    raw_to_value(&raw),
                ) {
                    let _ = cache.record(&key, &artifact);
                }
                return Ok(parsed);
            }
            Err(err) => last_error = err.to_string(),
        }
    }
    Err(StageError::validation(
        Stage::Classify,
        format!("{REASON_LLM_REJECTED}: {last_error}"),
    ))
}

/// Parses raw completion text into a JSON value for artifact storage.
fn raw_to_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Applies the acceptance and disagreement gates to an LLM classification.
#[allow(
    clippy::too_many_lines,
    reason = "Keep the gate sequence linear and auditable in one place."
)]
fn accept_llm_classification(
    inputs: &ClassifyInputs<'_>,
    snapshot: &ConfigSnapshot,
    mut risk_flags: Vec<RiskFinding>,
    output: &LlmClassification,
) -> Result<ClassificationResult, StageError> {
    let gates = &snapshot.classify;

    // Confidence gates for the accepted result.
    let accepted_intents: Vec<&LlmIntent> = output
        .intents
        .iter()
        .filter(|intent| intent.confidence >= gates.min_primary_intent)
        .collect();
    if accepted_intents.is_empty() {
        return Err(StageError::validation(
            Stage::Classify,
            format!("{REASON_LLM_REJECTED}: no intent above threshold"),
        ));
    }
    if output.product_line.confidence < gates.min_product_line {
        return Err(StageError::validation(
            Stage::Classify,
            format!("{REASON_LLM_REJECTED}: product confidence below threshold"),
        ));
    }
    if output.urgency.confidence < gates.min_urgency {
        return Err(StageError::validation(
            Stage::Classify,
            format!("{REASON_LLM_REJECTED}: urgency confidence below threshold"),
        ));
    }
    for risk in &output.risk_flags {
        if risk.confidence < gates.min_risk_flag {
            return Err(StageError::validation(
                Stage::Classify,
                format!("{REASON_LLM_REJECTED}: risk flag confidence below threshold"),
            ));
        }
    }

    // Evidence gates: primary intent, product, and urgency each need at
    // least one verified span.
    let primary_intent = IntentLabel::PRIORITY_ORDER
        .iter()
        .copied()
        .find(|label| accepted_intents.iter().any(|intent| intent.label == *label))
        .unwrap_or(output.primary_intent);
    let primary_evidence: Vec<EvidenceSpan> = accepted_intents
        .iter()
        .filter(|intent| intent.label == primary_intent)
        .flat_map(|intent| verify_evidence(inputs, &intent.evidence))
        .collect();
    let product_evidence = verify_evidence(inputs, &output.product_line.evidence);
    let urgency_evidence = verify_evidence(inputs, &output.urgency.evidence);
    if primary_evidence.is_empty() || product_evidence.is_empty() || urgency_evidence.is_empty() {
        return Err(StageError::validation(
            Stage::Classify,
            format!("{REASON_LLM_REJECTED}: missing verified evidence"),
        ));
    }

    // Disagreement gate: high-confidence deterministic rules win.
    let hits = intent_rule_hits(inputs);
    if hits.iter().any(|hit| {
        hit.confidence >= gates.disagreement_rule_confidence && hit.intent != primary_intent
    }) {
        return Err(StageError::validation(Stage::Classify, REASON_RULE_DISAGREEMENT));
    }
    let model = lexicon_scores(inputs);
    if let Some((model_top, _)) = model
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .copied()
        .filter(|(_, confidence)| *confidence >= gates.disagreement_rule_confidence)
        && model_top != primary_intent
    {
        return Err(StageError::validation(Stage::Classify, REASON_RULE_DISAGREEMENT));
    }

    // Accepted: merge LLM risk flags into the prescan set (add-only).
    for risk in &output.risk_flags {
        let evidence = verify_evidence(inputs, &risk.evidence);
        if evidence.is_empty() {
            return Err(StageError::validation(
                Stage::Classify,
                format!("{REASON_LLM_REJECTED}: risk flag without verified evidence"),
            ));
        }
        if !risk_flags.iter().any(|finding| finding.flag == risk.label) {
            risk_flags.push(RiskFinding {
                flag: risk.label,
                confidence: risk.confidence,
                origin: RiskOrigin::Llm,
                evidence,
            });
        }
    }

    let prompt = build_prompt(inputs.normalized, false);
    let intents = accepted_intents
        .iter()
        .map(|intent| IntentScore {
            label: intent.label,
            confidence: intent.confidence,
            evidence: verify_evidence(inputs, &intent.evidence),
        })
        .collect();

    Ok(ClassificationResult {
        message_id: inputs.normalized.message_id.clone(),
        intents,
        primary_intent,
        product_line: output.product_line.label,
        product_confidence: output.product_line.confidence,
        urgency: output.urgency.label,
        urgency_confidence: output.urgency.confidence,
        risk_flags,
        rules_version: snapshot.classify.rules_version.clone(),
        mode: snapshot.mode,
        model_id: Some(snapshot.llm.model_id.clone()),
        prompt_sha256: Some(crate::core::HashDigest::of_bytes(prompt.as_bytes())),
    })
}

/// Verifies model-provided evidence spans against canonical texts.
///
/// A span survives only when its snippet is the verbatim substring at the
/// stated offsets and any asserted digest matches the recomputed one.
fn verify_evidence(inputs: &ClassifyInputs<'_>, spans: &[LlmEvidence]) -> Vec<EvidenceSpan> {
    let mut verified = Vec::new();
    for span in spans {
        let attachment_id = span.attachment_id.as_ref().map(|id| AttachmentId::new(id.as_str()));
        let Some(text) = inputs.resolve_text(span.source, attachment_id.as_ref()) else {
            continue;
        };
        let Some(candidate) =
            EvidenceSpan::over(span.source, attachment_id, text, span.start, span.end)
        else {
            continue;
        };
        if candidate.snippet != span.snippet {
            continue;
        }
        if let Some(asserted) = &span.snippet_sha256
            && asserted != candidate.snippet_sha256.as_hex()
        {
            continue;
        }
        verified.push(candidate);
    }
    verified
}
