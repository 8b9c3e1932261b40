// crates/intake-routing-core/src/core/registry.rs
// ============================================================================
// Module: Canonical Label Registry
// Description: Closed vocabularies for stages, labels, queues, and actions.
// Purpose: Provide the single authoritative registry all stage outputs validate against.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every label that appears in a stage output comes from this registry. The
//! vocabularies are closed sum types with stable wire forms; any artifact
//! carrying a label outside these sets fails schema validation and the stage
//! fails closed. Priority and override orders are defined here once so rule
//! tables and evaluators can never drift from the registry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Pipeline Stages
// ============================================================================

/// Pipeline stages in canonical execution order.
///
/// # Invariants
/// - Variants are stable for serialization and job-key computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Raw MIME accepted from a mail source.
    #[serde(rename = "INGEST")]
    Ingest,
    /// Canonical message normalization.
    #[serde(rename = "NORMALIZE")]
    Normalize,
    /// Attachment AV stamping and text extraction.
    #[serde(rename = "ATTACHMENTS")]
    Attachments,
    /// Identity resolution against the directory.
    #[serde(rename = "IDENTITY")]
    Identity,
    /// Intent, product, urgency, and risk classification.
    #[serde(rename = "CLASSIFY")]
    Classify,
    /// Entity extraction with validation.
    #[serde(rename = "EXTRACT")]
    Extract,
    /// Routing decision evaluation.
    #[serde(rename = "ROUTE")]
    Route,
    /// Case system side effects.
    #[serde(rename = "CASE")]
    Case,
    /// Human-in-the-loop review.
    #[serde(rename = "HITL")]
    Hitl,
    /// Offline reprocessing run.
    #[serde(rename = "REPROCESS")]
    Reprocess,
}

impl Stage {
    /// All stages in canonical order.
    pub const ALL: &'static [Self] = &[
        Self::Ingest,
        Self::Normalize,
        Self::Attachments,
        Self::Identity,
        Self::Classify,
        Self::Extract,
        Self::Route,
        Self::Case,
        Self::Hitl,
        Self::Reprocess,
    ];

    /// Returns the canonical wire label for the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ingest => "INGEST",
            Self::Normalize => "NORMALIZE",
            Self::Attachments => "ATTACHMENTS",
            Self::Identity => "IDENTITY",
            Self::Classify => "CLASSIFY",
            Self::Extract => "EXTRACT",
            Self::Route => "ROUTE",
            Self::Case => "CASE",
            Self::Hitl => "HITL",
            Self::Reprocess => "REPROCESS",
        }
    }

    /// Returns the review queue handling fail-closed outcomes for this stage.
    #[must_use]
    pub const fn review_queue(self) -> QueueId {
        match self {
            Self::Identity => QueueId::IdentityReview,
            Self::Classify | Self::Extract => QueueId::ClassificationReview,
            Self::Ingest
            | Self::Normalize
            | Self::Attachments
            | Self::Route
            | Self::Case
            | Self::Hitl
            | Self::Reprocess => QueueId::IntakeReviewGeneral,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Identity Statuses
// ============================================================================

/// Identity resolution statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityStatus {
    /// Identity resolved with a hard signal above the confirm thresholds.
    #[serde(rename = "IDENTITY_CONFIRMED")]
    Confirmed,
    /// Identity probable but below the confirm thresholds.
    #[serde(rename = "IDENTITY_PROBABLE")]
    Probable,
    /// Identity ambiguous or soft-only; requires human review.
    #[serde(rename = "IDENTITY_NEEDS_REVIEW")]
    NeedsReview,
    /// No candidate found in the directory.
    #[serde(rename = "IDENTITY_NO_CANDIDATE")]
    NoCandidate,
}

impl IdentityStatus {
    /// All identity statuses.
    pub const ALL: &'static [Self] =
        &[Self::Confirmed, Self::Probable, Self::NeedsReview, Self::NoCandidate];

    /// Returns the canonical wire label for the status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "IDENTITY_CONFIRMED",
            Self::Probable => "IDENTITY_PROBABLE",
            Self::NeedsReview => "IDENTITY_NEEDS_REVIEW",
            Self::NoCandidate => "IDENTITY_NO_CANDIDATE",
        }
    }

    /// Returns true when the status requires human identity review.
    #[must_use]
    pub const fn needs_review(self) -> bool {
        matches!(self, Self::NeedsReview | Self::NoCandidate)
    }
}

// ============================================================================
// SECTION: Intent Labels
// ============================================================================

/// Canonical intent labels, declared in primary-intent priority order.
///
/// # Invariants
/// - Variant order is the canonical primary-intent priority (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntentLabel {
    /// Data-subject request under GDPR.
    #[serde(rename = "INTENT_GDPR_REQUEST")]
    GdprRequest,
    /// Legal correspondence or representation.
    #[serde(rename = "INTENT_LEGAL")]
    Legal,
    /// Formal complaint.
    #[serde(rename = "INTENT_COMPLAINT")]
    Complaint,
    /// First notice of loss.
    #[serde(rename = "INTENT_CLAIM_NEW")]
    ClaimNew,
    /// Update to an existing claim.
    #[serde(rename = "INTENT_CLAIM_UPDATE")]
    ClaimUpdate,
    /// Policy cancellation request.
    #[serde(rename = "INTENT_POLICY_CANCELLATION")]
    PolicyCancellation,
    /// Policy change request.
    #[serde(rename = "INTENT_POLICY_CHANGE")]
    PolicyChange,
    /// Billing or payment question.
    #[serde(rename = "INTENT_BILLING_QUESTION")]
    BillingQuestion,
    /// Document submission without further request.
    #[serde(rename = "INTENT_DOCUMENT_SUBMISSION")]
    DocumentSubmission,
    /// Coverage question.
    #[serde(rename = "INTENT_COVERAGE_QUESTION")]
    CoverageQuestion,
    /// Broker or intermediary correspondence.
    #[serde(rename = "INTENT_BROKER_INTERMEDIARY")]
    BrokerIntermediary,
    /// Technical issue with a portal or app.
    #[serde(rename = "INTENT_TECHNICAL")]
    Technical,
    /// General inquiry.
    #[serde(rename = "INTENT_GENERAL_INQUIRY")]
    GeneralInquiry,
}

impl IntentLabel {
    /// All intent labels in canonical priority order (highest first).
    pub const PRIORITY_ORDER: &'static [Self] = &[
        Self::GdprRequest,
        Self::Legal,
        Self::Complaint,
        Self::ClaimNew,
        Self::ClaimUpdate,
        Self::PolicyCancellation,
        Self::PolicyChange,
        Self::BillingQuestion,
        Self::DocumentSubmission,
        Self::CoverageQuestion,
        Self::BrokerIntermediary,
        Self::Technical,
        Self::GeneralInquiry,
    ];

    /// Returns the canonical wire label for the intent.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::GdprRequest => "INTENT_GDPR_REQUEST",
            Self::Legal => "INTENT_LEGAL",
            Self::Complaint => "INTENT_COMPLAINT",
            Self::ClaimNew => "INTENT_CLAIM_NEW",
            Self::ClaimUpdate => "INTENT_CLAIM_UPDATE",
            Self::PolicyCancellation => "INTENT_POLICY_CANCELLATION",
            Self::PolicyChange => "INTENT_POLICY_CHANGE",
            Self::BillingQuestion => "INTENT_BILLING_QUESTION",
            Self::DocumentSubmission => "INTENT_DOCUMENT_SUBMISSION",
            Self::CoverageQuestion => "INTENT_COVERAGE_QUESTION",
            Self::BrokerIntermediary => "INTENT_BROKER_INTERMEDIARY",
            Self::Technical => "INTENT_TECHNICAL",
            Self::GeneralInquiry => "INTENT_GENERAL_INQUIRY",
        }
    }

    /// Returns true when the intent relates to claims handling.
    #[must_use]
    pub const fn is_claim_related(self) -> bool {
        matches!(self, Self::ClaimNew | Self::ClaimUpdate)
    }
}

// ============================================================================
// SECTION: Product Lines
// ============================================================================

/// Canonical product lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductLine {
    /// Motor insurance.
    #[serde(rename = "PROD_AUTO")]
    Auto,
    /// Household contents insurance.
    #[serde(rename = "PROD_HOUSEHOLD")]
    Household,
    /// Residential building insurance.
    #[serde(rename = "PROD_BUILDING")]
    Building,
    /// Private liability insurance.
    #[serde(rename = "PROD_LIABILITY")]
    Liability,
    /// Legal expenses insurance.
    #[serde(rename = "PROD_LEGAL_EXPENSES")]
    LegalExpenses,
    /// Personal accident insurance.
    #[serde(rename = "PROD_ACCIDENT")]
    Accident,
    /// Life insurance.
    #[serde(rename = "PROD_LIFE")]
    Life,
    /// Health insurance.
    #[serde(rename = "PROD_HEALTH")]
    Health,
    /// Travel insurance.
    #[serde(rename = "PROD_TRAVEL")]
    Travel,
    /// Commercial lines.
    #[serde(rename = "PROD_COMMERCIAL")]
    Commercial,
    /// Product could not be determined.
    #[serde(rename = "PROD_UNKNOWN")]
    Unknown,
}

impl ProductLine {
    /// All product lines.
    pub const ALL: &'static [Self] = &[
        Self::Auto,
        Self::Household,
        Self::Building,
        Self::Liability,
        Self::LegalExpenses,
        Self::Accident,
        Self::Life,
        Self::Health,
        Self::Travel,
        Self::Commercial,
        Self::Unknown,
    ];

    /// Returns the canonical wire label for the product line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Auto => "PROD_AUTO",
            Self::Household => "PROD_HOUSEHOLD",
            Self::Building => "PROD_BUILDING",
            Self::Liability => "PROD_LIABILITY",
            Self::LegalExpenses => "PROD_LEGAL_EXPENSES",
            Self::Accident => "PROD_ACCIDENT",
            Self::Life => "PROD_LIFE",
            Self::Health => "PROD_HEALTH",
            Self::Travel => "PROD_TRAVEL",
            Self::Commercial => "PROD_COMMERCIAL",
            Self::Unknown => "PROD_UNKNOWN",
        }
    }
}

// ============================================================================
// SECTION: Urgency
// ============================================================================

/// Canonical urgency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Urgency {
    /// No time pressure.
    #[serde(rename = "URG_LOW")]
    Low,
    /// Normal handling.
    #[serde(rename = "URG_NORMAL")]
    Normal,
    /// Elevated urgency.
    #[serde(rename = "URG_HIGH")]
    High,
    /// Immediate attention required.
    #[serde(rename = "URG_CRITICAL")]
    Critical,
}

impl Urgency {
    /// All urgency levels.
    pub const ALL: &'static [Self] = &[Self::Low, Self::Normal, Self::High, Self::Critical];

    /// Returns the canonical wire label for the urgency.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "URG_LOW",
            Self::Normal => "URG_NORMAL",
            Self::High => "URG_HIGH",
            Self::Critical => "URG_CRITICAL",
        }
    }
}

// ============================================================================
// SECTION: SLAs
// ============================================================================

/// Canonical service-level agreements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlaId {
    /// One hour.
    #[serde(rename = "SLA_1H")]
    OneHour,
    /// Four hours.
    #[serde(rename = "SLA_4H")]
    FourHours,
    /// One business day.
    #[serde(rename = "SLA_1BD")]
    OneBusinessDay,
    /// Three business days.
    #[serde(rename = "SLA_3BD")]
    ThreeBusinessDays,
}

impl SlaId {
    /// All SLA identifiers.
    pub const ALL: &'static [Self] =
        &[Self::OneHour, Self::FourHours, Self::OneBusinessDay, Self::ThreeBusinessDays];

    /// Returns the canonical wire label for the SLA.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneHour => "SLA_1H",
            Self::FourHours => "SLA_4H",
            Self::OneBusinessDay => "SLA_1BD",
            Self::ThreeBusinessDays => "SLA_3BD",
        }
    }
}

// ============================================================================
// SECTION: Risk Flags
// ============================================================================

/// Canonical risk flags.
///
/// # Invariants
/// - Prescan flags are never removed by any later component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskFlag {
    /// Attachment flagged by the AV scanner.
    #[serde(rename = "RISK_SECURITY_MALWARE")]
    SecurityMalware,
    /// Regulatory or supervisory-authority involvement.
    #[serde(rename = "RISK_REGULATORY")]
    Regulatory,
    /// Explicit legal threat or lawyer involvement.
    #[serde(rename = "RISK_LEGAL_THREAT")]
    LegalThreat,
    /// Indicators of potential fraud.
    #[serde(rename = "RISK_FRAUD_SIGNAL")]
    FraudSignal,
    /// Indications of self-harm in the message.
    #[serde(rename = "RISK_SELF_HARM_THREAT")]
    SelfHarmThreat,
    /// Message language not supported by the pipeline.
    #[serde(rename = "RISK_LANGUAGE_UNSUPPORTED")]
    LanguageUnsupported,
    /// Auto-reply loop detected on the thread.
    #[serde(rename = "RISK_AUTOREPLY_LOOP")]
    AutoreplyLoop,
    /// Suspected phishing or spoofed sender.
    #[serde(rename = "RISK_PHISHING_SUSPECTED")]
    PhishingSuspected,
    /// Press or media inquiry.
    #[serde(rename = "RISK_MEDIA_PRESS")]
    MediaPress,
    /// Sender matched the configured VIP list.
    #[serde(rename = "RISK_VIP_SENDER")]
    VipSender,
}

impl RiskFlag {
    /// All risk flags.
    pub const ALL: &'static [Self] = &[
        Self::SecurityMalware,
        Self::Regulatory,
        Self::LegalThreat,
        Self::FraudSignal,
        Self::SelfHarmThreat,
        Self::LanguageUnsupported,
        Self::AutoreplyLoop,
        Self::PhishingSuspected,
        Self::MediaPress,
        Self::VipSender,
    ];

    /// Hard-override flags in canonical evaluation order (highest first).
    pub const OVERRIDE_ORDER: &'static [Self] = &[
        Self::SecurityMalware,
        Self::Regulatory,
        Self::LegalThreat,
        Self::FraudSignal,
        Self::SelfHarmThreat,
        Self::LanguageUnsupported,
    ];

    /// Returns the canonical wire label for the risk flag.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SecurityMalware => "RISK_SECURITY_MALWARE",
            Self::Regulatory => "RISK_REGULATORY",
            Self::LegalThreat => "RISK_LEGAL_THREAT",
            Self::FraudSignal => "RISK_FRAUD_SIGNAL",
            Self::SelfHarmThreat => "RISK_SELF_HARM_THREAT",
            Self::LanguageUnsupported => "RISK_LANGUAGE_UNSUPPORTED",
            Self::AutoreplyLoop => "RISK_AUTOREPLY_LOOP",
            Self::PhishingSuspected => "RISK_PHISHING_SUSPECTED",
            Self::MediaPress => "RISK_MEDIA_PRESS",
            Self::VipSender => "RISK_VIP_SENDER",
        }
    }
}

// ============================================================================
// SECTION: Queues
// ============================================================================

/// Canonical routing queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueId {
    /// Security review for malware or phishing.
    #[serde(rename = "QUEUE_SECURITY_REVIEW")]
    SecurityReview,
    /// Complaints and regulatory handling.
    #[serde(rename = "QUEUE_COMPLAINTS")]
    Complaints,
    /// Legal department.
    #[serde(rename = "QUEUE_LEGAL")]
    Legal,
    /// Fraud investigation.
    #[serde(rename = "QUEUE_FRAUD")]
    Fraud,
    /// Privacy / data-subject requests.
    #[serde(rename = "QUEUE_PRIVACY_DSR")]
    PrivacyDsr,
    /// General intake review (fallback).
    #[serde(rename = "QUEUE_INTAKE_REVIEW_GENERAL")]
    IntakeReviewGeneral,
    /// Identity resolution review.
    #[serde(rename = "QUEUE_IDENTITY_REVIEW")]
    IdentityReview,
    /// Classification review.
    #[serde(rename = "QUEUE_CLASSIFICATION_REVIEW")]
    ClassificationReview,
    /// Product could not be resolved.
    #[serde(rename = "QUEUE_UNKNOWN_PRODUCT_REVIEW")]
    UnknownProductReview,
    /// Motor claims.
    #[serde(rename = "QUEUE_CLAIMS_AUTO")]
    ClaimsAuto,
    /// Property claims (household and building).
    #[serde(rename = "QUEUE_CLAIMS_PROPERTY")]
    ClaimsProperty,
    /// Liability claims.
    #[serde(rename = "QUEUE_CLAIMS_LIABILITY")]
    ClaimsLiability,
    /// Claims desk for other product lines.
    #[serde(rename = "QUEUE_CLAIMS_GENERAL")]
    ClaimsGeneral,
    /// Policy administration.
    #[serde(rename = "QUEUE_POLICY_SERVICE")]
    PolicyService,
    /// Billing and collections.
    #[serde(rename = "QUEUE_BILLING")]
    Billing,
    /// Inbound document filing.
    #[serde(rename = "QUEUE_DOCUMENT_INTAKE")]
    DocumentIntake,
    /// Broker and intermediary desk.
    #[serde(rename = "QUEUE_BROKER_DESK")]
    BrokerDesk,
    /// Coverage advice.
    #[serde(rename = "QUEUE_COVERAGE_ADVICE")]
    CoverageAdvice,
}

impl QueueId {
    /// All queues.
    pub const ALL: &'static [Self] = &[
        Self::SecurityReview,
        Self::Complaints,
        Self::Legal,
        Self::Fraud,
        Self::PrivacyDsr,
        Self::IntakeReviewGeneral,
        Self::IdentityReview,
        Self::ClassificationReview,
        Self::UnknownProductReview,
        Self::ClaimsAuto,
        Self::ClaimsProperty,
        Self::ClaimsLiability,
        Self::ClaimsGeneral,
        Self::PolicyService,
        Self::Billing,
        Self::DocumentIntake,
        Self::BrokerDesk,
        Self::CoverageAdvice,
    ];

    /// Returns the canonical wire label for the queue.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SecurityReview => "QUEUE_SECURITY_REVIEW",
            Self::Complaints => "QUEUE_COMPLAINTS",
            Self::Legal => "QUEUE_LEGAL",
            Self::Fraud => "QUEUE_FRAUD",
            Self::PrivacyDsr => "QUEUE_PRIVACY_DSR",
            Self::IntakeReviewGeneral => "QUEUE_INTAKE_REVIEW_GENERAL",
            Self::IdentityReview => "QUEUE_IDENTITY_REVIEW",
            Self::ClassificationReview => "QUEUE_CLASSIFICATION_REVIEW",
            Self::UnknownProductReview => "QUEUE_UNKNOWN_PRODUCT_REVIEW",
            Self::ClaimsAuto => "QUEUE_CLAIMS_AUTO",
            Self::ClaimsProperty => "QUEUE_CLAIMS_PROPERTY",
            Self::ClaimsLiability => "QUEUE_CLAIMS_LIABILITY",
            Self::ClaimsGeneral => "QUEUE_CLAIMS_GENERAL",
            Self::PolicyService => "QUEUE_POLICY_SERVICE",
            Self::Billing => "QUEUE_BILLING",
            Self::DocumentIntake => "QUEUE_DOCUMENT_INTAKE",
            Self::BrokerDesk => "QUEUE_BROKER_DESK",
            Self::CoverageAdvice => "QUEUE_COVERAGE_ADVICE",
        }
    }
}

// ============================================================================
// SECTION: Actions
// ============================================================================

/// Canonical routing actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Create a case in the case system.
    #[serde(rename = "CREATE_CASE")]
    CreateCase,
    /// Attach the original email artifact to the case.
    #[serde(rename = "ATTACH_ORIGINAL_EMAIL")]
    AttachOriginalEmail,
    /// Attach all clean attachment artifacts to the case.
    #[serde(rename = "ATTACH_ALL_FILES")]
    AttachAllFiles,
    /// Attach a request-for-information draft.
    #[serde(rename = "ADD_REQUEST_INFO_DRAFT")]
    AddRequestInfoDraft,
    /// Block case creation for this message.
    #[serde(rename = "BLOCK_CASE_CREATE")]
    BlockCaseCreate,
    /// Flag the routing decision for human escalation.
    #[serde(rename = "HUMAN_ESCALATION")]
    HumanEscalation,
}

impl Action {
    /// All actions.
    pub const ALL: &'static [Self] = &[
        Self::CreateCase,
        Self::AttachOriginalEmail,
        Self::AttachAllFiles,
        Self::AddRequestInfoDraft,
        Self::BlockCaseCreate,
        Self::HumanEscalation,
    ];

    /// Returns the canonical wire label for the action.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreateCase => "CREATE_CASE",
            Self::AttachOriginalEmail => "ATTACH_ORIGINAL_EMAIL",
            Self::AttachAllFiles => "ATTACH_ALL_FILES",
            Self::AddRequestInfoDraft => "ADD_REQUEST_INFO_DRAFT",
            Self::BlockCaseCreate => "BLOCK_CASE_CREATE",
            Self::HumanEscalation => "HUMAN_ESCALATION",
        }
    }
}

// ============================================================================
// SECTION: Directory Entity Types
// ============================================================================

/// Directory entity types resolvable by identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    /// Customer master record.
    #[serde(rename = "CUSTOMER")]
    Customer,
    /// Policy contract.
    #[serde(rename = "POLICY")]
    Policy,
    /// Claim file.
    #[serde(rename = "CLAIM")]
    Claim,
    /// Contact person.
    #[serde(rename = "CONTACT")]
    Contact,
    /// Broker or intermediary.
    #[serde(rename = "BROKER")]
    Broker,
}

impl EntityType {
    /// All entity types.
    pub const ALL: &'static [Self] =
        &[Self::Customer, Self::Policy, Self::Claim, Self::Contact, Self::Broker];

    /// Returns the canonical wire label for the entity type.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Policy => "POLICY",
            Self::Claim => "CLAIM",
            Self::Contact => "CONTACT",
            Self::Broker => "BROKER",
        }
    }
}

// ============================================================================
// SECTION: Schema URNs
// ============================================================================

/// Canonical schema URN for raw MIME artifacts.
pub const SCHEMA_RAW_MIME: &str = "urn:ieim:schema:raw-mime:1.0.0";
/// Canonical schema URN for attachment artifacts.
pub const SCHEMA_ATTACHMENT: &str = "urn:ieim:schema:attachment:1.0.0";
/// Canonical schema URN for normalized messages.
pub const SCHEMA_NORMALIZED_MESSAGE: &str = "urn:ieim:schema:normalized-message:1.0.0";
/// Canonical schema URN for identity resolution results.
pub const SCHEMA_IDENTITY_RESOLUTION: &str = "urn:ieim:schema:identity-resolution-result:1.0.0";
/// Canonical schema URN for classification results.
pub const SCHEMA_CLASSIFICATION: &str = "urn:ieim:schema:classification-result:1.0.0";
/// Canonical schema URN for extraction results.
pub const SCHEMA_EXTRACTION: &str = "urn:ieim:schema:extraction-result:1.0.0";
/// Canonical schema URN for routing decisions.
pub const SCHEMA_ROUTING_DECISION: &str = "urn:ieim:schema:routing-decision:1.0.0";
/// Canonical schema URN for audit events.
pub const SCHEMA_AUDIT_EVENT: &str = "urn:ieim:schema:audit-event:1.0.0";
/// Canonical schema URN for correction records.
pub const SCHEMA_CORRECTION_RECORD: &str = "urn:ieim:schema:correction-record:1.0.0";
/// Canonical schema URN for LLM inference artifacts.
pub const SCHEMA_LLM_INFERENCE: &str = "urn:ieim:schema:llm-inference:1.0.0";

/// All canonical schema URNs.
pub const ALL_SCHEMA_URNS: &[&str] = &[
    SCHEMA_RAW_MIME,
    SCHEMA_ATTACHMENT,
    SCHEMA_NORMALIZED_MESSAGE,
    SCHEMA_IDENTITY_RESOLUTION,
    SCHEMA_CLASSIFICATION,
    SCHEMA_EXTRACTION,
    SCHEMA_ROUTING_DECISION,
    SCHEMA_AUDIT_EVENT,
    SCHEMA_CORRECTION_RECORD,
    SCHEMA_LLM_INFERENCE,
];

// ============================================================================
// SECTION: Registry Integrity
// ============================================================================

/// Registry integrity errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A vocabulary has an unexpected cardinality.
    #[error("registry vocabulary {vocabulary} has {actual} labels, expected {expected}")]
    Cardinality {
        /// Vocabulary name.
        vocabulary: &'static str,
        /// Expected label count.
        expected: usize,
        /// Actual label count.
        actual: usize,
    },
    /// A vocabulary contains duplicate labels.
    #[error("registry vocabulary {vocabulary} contains duplicate label {label}")]
    DuplicateLabel {
        /// Vocabulary name.
        vocabulary: &'static str,
        /// Offending label.
        label: String,
    },
}

/// Verifies the canonical registry cardinalities and label uniqueness.
///
/// The expected counts are fixed by the system contract; any drift between an
/// enum and its declared set fails this check, and the check is run by the
/// build's test suite so drift fails the build rather than being reconciled
/// at runtime.
///
/// # Errors
///
/// Returns [`RegistryError`] when a vocabulary is malformed.
pub fn verify_registry() -> Result<(), RegistryError> {
    check_labels("stages", 10, &Stage::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels(
        "identity_statuses",
        4,
        &IdentityStatus::ALL.iter().map(|v| v.label()).collect::<Vec<_>>(),
    )?;
    check_labels(
        "intents",
        13,
        &IntentLabel::PRIORITY_ORDER.iter().map(|v| v.label()).collect::<Vec<_>>(),
    )?;
    check_labels("products", 11, &ProductLine::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels("urgencies", 4, &Urgency::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels("slas", 4, &SlaId::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels("risk_flags", 10, &RiskFlag::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels("queues", 18, &QueueId::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels("actions", 6, &Action::ALL.iter().map(|v| v.label()).collect::<Vec<_>>())?;
    check_labels(
        "entity_types",
        5,
        &EntityType::ALL.iter().map(|v| v.label()).collect::<Vec<_>>(),
    )?;
    check_labels("schemas", 10, ALL_SCHEMA_URNS)?;
    Ok(())
}

/// Checks one vocabulary for cardinality and duplicates.
fn check_labels(
    vocabulary: &'static str,
    expected: usize,
    labels: &[&str],
) -> Result<(), RegistryError> {
    if labels.len() != expected {
        return Err(RegistryError::Cardinality {
            vocabulary,
            expected,
            actual: labels.len(),
        });
    }
    for (index, label) in labels.iter().enumerate() {
        if labels.iter().skip(index + 1).any(|other| other == label) {
            return Err(RegistryError::DuplicateLabel {
                vocabulary,
                label: (*label).to_string(),
            });
        }
    }
    Ok(())
}
