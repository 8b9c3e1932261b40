// crates/intake-routing-core/src/core/extract.rs
// ============================================================================
// Module: Extraction Model
// Description: Validated, redacted entity extraction results.
// Purpose: Capture extracted entities with provenance and redaction applied.
// Dependencies: crate::core::{evidence, hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! Extraction yields canonical entity types only. Sensitive values (bank
//! details, identity documents) are stored redacted with a full-value hash
//! so equality remains checkable without retaining the value. Entities that
//! validate by pattern but are unknown to the directory keep the
//! `directory_miss` flag; identity resolution treats them as medium signals
//! at best.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::evidence::EvidenceSource;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::AttachmentId;
use crate::core::identifiers::MessageId;

// ============================================================================
// SECTION: Entity Types
// ============================================================================

/// Canonical extractable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractedEntityType {
    /// Policy number.
    #[serde(rename = "POLICY_NUMBER")]
    PolicyNumber,
    /// Claim number.
    #[serde(rename = "CLAIM_NUMBER")]
    ClaimNumber,
    /// Customer number.
    #[serde(rename = "CUSTOMER_NUMBER")]
    CustomerNumber,
    /// International bank account number.
    #[serde(rename = "IBAN")]
    Iban,
    /// Email address.
    #[serde(rename = "EMAIL_ADDRESS")]
    EmailAddress,
    /// Phone number.
    #[serde(rename = "PHONE_NUMBER")]
    PhoneNumber,
    /// Person name.
    #[serde(rename = "PERSON_NAME")]
    PersonName,
    /// Date of loss.
    #[serde(rename = "DATE_OF_LOSS")]
    DateOfLoss,
    /// Vehicle license plate.
    #[serde(rename = "VEHICLE_PLATE")]
    VehiclePlate,
    /// Identity document number.
    #[serde(rename = "ID_DOCUMENT_NUMBER")]
    IdDocumentNumber,
}

impl ExtractedEntityType {
    /// All extractable entity types.
    pub const ALL: &'static [Self] = &[
        Self::PolicyNumber,
        Self::ClaimNumber,
        Self::CustomerNumber,
        Self::Iban,
        Self::EmailAddress,
        Self::PhoneNumber,
        Self::PersonName,
        Self::DateOfLoss,
        Self::VehiclePlate,
        Self::IdDocumentNumber,
    ];

    /// Returns true when values of this type are stored redacted.
    #[must_use]
    pub const fn sensitive(self) -> bool {
        matches!(self, Self::Iban | Self::IdDocumentNumber)
    }
}

// ============================================================================
// SECTION: Provenance
// ============================================================================

/// Where an entity value was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source text kind.
    pub source: EvidenceSource,
    /// Attachment identifier when the source is attachment text.
    pub attachment_id: Option<AttachmentId>,
    /// Byte offset of the value start in the canonical text.
    pub start: usize,
    /// Byte offset one past the value end.
    pub end: usize,
}

// ============================================================================
// SECTION: Extracted Entities
// ============================================================================

/// One validated extracted entity.
///
/// # Invariants
/// - For sensitive types `value_redacted` never contains the full value;
///   `value_sha256` is the digest of the full value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    /// Entity type.
    pub entity_type: ExtractedEntityType,
    /// Redacted display value.
    pub value_redacted: String,
    /// Digest of the full value.
    pub value_sha256: HashDigest,
    /// Extraction confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Provenance of the value.
    pub provenance: Provenance,
    /// True when the value validated by pattern but the directory has no
    /// matching record.
    pub directory_miss: bool,
}

// ============================================================================
// SECTION: Extraction Result
// ============================================================================

/// Immutable extraction artifact, one per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionResult {
    /// Message identifier.
    pub message_id: MessageId,
    /// Validated entities.
    pub entities: Vec<ExtractedEntity>,
    /// Version of the extraction rule tables used.
    pub rules_version: String,
}

impl ExtractionResult {
    /// Returns entities of the given type.
    #[must_use]
    pub fn of_type(&self, entity_type: ExtractedEntityType) -> Vec<&ExtractedEntity> {
        self.entities.iter().filter(|entity| entity.entity_type == entity_type).collect()
    }
}
