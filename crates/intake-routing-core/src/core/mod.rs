// crates/intake-routing-core/src/core/mod.rs
// ============================================================================
// Module: Intake Routing Core Types
// Description: Canonical data model for the deterministic decision core.
// Purpose: Provide stable, serializable types for artifacts, decisions, and audit.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define the canonical registry, message and attachment model,
//! stage artifacts, audit chain, decision hashing, and the configuration
//! snapshot. These types are the source of truth for every derived surface.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod artifact;
pub mod audit;
pub mod canonical;
pub mod classify;
pub mod correction;
pub mod decision;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod hashing;
pub mod identifiers;
pub mod identity;
pub mod inference;
pub mod message;
pub mod registry;
pub mod routing;
pub mod ruleset;
pub mod snapshot;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifact::ArtifactRef;
pub use artifact::ArtifactRefError;
pub use audit::AuditEvent;
pub use audit::AuditEventBody;
pub use audit::AuditEventKind;
pub use audit::ChainVerifyError;
pub use audit::GENESIS_HASH;
pub use audit::event_hash;
pub use audit::verify_chain;
pub use canonical::MAX_SNIPPET_BYTES;
pub use canonical::canonicalize_body;
pub use canonical::canonicalize_subject;
pub use canonical::fingerprint_form;
pub use canonical::message_fingerprint;
pub use canonical::order_attachments;
pub use canonical::snippet_sha256;
pub use canonical::truncate_snippet;
pub use classify::ClassificationResult;
pub use classify::IntentScore;
pub use classify::PipelineMode;
pub use classify::RiskFinding;
pub use classify::RiskOrigin;
pub use correction::CorrectionRecord;
pub use decision::ClassifyDecisionInput;
pub use decision::DecisionContext;
pub use decision::DecisionHashError;
pub use decision::EXCLUDED_MEMBERS;
pub use decision::EXCLUDED_SUFFIX;
pub use decision::IdentityDecisionInput;
pub use decision::LlmDigest;
pub use decision::RouteDecisionInput;
pub use decision::SPEC_SEMVER;
pub use decision::SYSTEM_ID;
pub use decision::decision_hash;
pub use error::ErrorKind;
pub use error::StageError;
pub use evidence::EvidenceSource;
pub use evidence::EvidenceSpan;
pub use evidence::RedactedEvidence;
pub use extract::ExtractedEntity;
pub use extract::ExtractedEntityType;
pub use extract::ExtractionResult;
pub use extract::Provenance;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use identifiers::ActorId;
pub use identifiers::AttachmentId;
pub use identifiers::CorrectionId;
pub use identifiers::EntityId;
pub use identifiers::EventId;
pub use identifiers::JobId;
pub use identifiers::MessageId;
pub use identifiers::ModelId;
pub use identifiers::ReviewItemId;
pub use identifiers::RuleId;
pub use identifiers::RunId;
pub use identity::CandidateStatus;
pub use identity::IdentityCandidate;
pub use identity::IdentityResolutionResult;
pub use identity::IdentitySignal;
pub use identity::IdentityThresholds;
pub use identity::SignalName;
pub use identity::SignalStrength;
pub use identity::SignalWeights;
pub use inference::InferenceParams;
pub use inference::InferencePurpose;
pub use inference::LlmInferenceArtifact;
pub use inference::llm_cache_key;
pub use message::AttachmentRecord;
pub use message::AvStatus;
pub use message::IncomingAttachment;
pub use message::IngestMessage;
pub use message::NormalizedMessage;
pub use message::ParsedEmail;
pub use message::RawMimeRef;
pub use message::ThreadKeys;
pub use registry::Action;
pub use registry::EntityType;
pub use registry::IdentityStatus;
pub use registry::IntentLabel;
pub use registry::ProductLine;
pub use registry::QueueId;
pub use registry::RegistryError;
pub use registry::RiskFlag;
pub use registry::SlaId;
pub use registry::Stage;
pub use registry::Urgency;
pub use registry::verify_registry;
pub use routing::RoutingDecision;
pub use ruleset::RoutingRule;
pub use ruleset::RoutingRuleset;
pub use ruleset::RuleMatch;
pub use ruleset::RulesetError;
pub use ruleset::RulesetRef;
pub use snapshot::ConfigRef;
pub use snapshot::ConfigSnapshot;
pub use snapshot::IncidentGates;
pub use snapshot::SnapshotError;
pub use time::Timestamp;
