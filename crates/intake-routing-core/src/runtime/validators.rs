// crates/intake-routing-core/src/runtime/validators.rs
// ============================================================================
// Module: Identifier Validators
// Description: Pattern and checksum validation for domain identifiers.
// Purpose: Accept only structurally valid identifiers as identity signals.
// Dependencies: regex, unicode-normalization
// ============================================================================

//! ## Overview
//! Identifier extraction is regex-first with structural validation on every
//! match: policy, claim, and customer numbers validate their year and serial
//! segments, IBANs validate the ISO 7064 mod-97 checksum. Fuzzy name and
//! address matching uses a normalized Levenshtein distance over folded text
//! with fixed locale rules, so the same inputs always produce the same
//! similarity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Policy number pattern (`POL-<year>-<serial>`).
pub static POLICY_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bPOL-(\d{4})-(\d{8})\b").ok());

/// Claim number pattern (`CLM-<year>-<serial>`).
pub static CLAIM_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bCLM-(\d{4})-(\d{8})\b").ok());

/// Customer number pattern (`CUS-<serial>`).
pub static CUSTOMER_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bCUS-(\d{8})\b").ok());

/// IBAN candidate pattern; checksum-validated afterwards.
pub static IBAN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").ok());

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

/// Year range accepted by policy and claim number validation.
const YEAR_RANGE: std::ops::RangeInclusive<u32> = 1990 ..= 2099;

/// Validates a policy number already matched by [`POLICY_NUMBER`].
#[must_use]
pub fn validate_policy_number(value: &str) -> bool {
    validate_year_serial(value, "POL-")
}

/// Validates a claim number already matched by [`CLAIM_NUMBER`].
#[must_use]
pub fn validate_claim_number(value: &str) -> bool {
    validate_year_serial(value, "CLM-")
}

/// Validates a customer number already matched by [`CUSTOMER_NUMBER`].
#[must_use]
pub fn validate_customer_number(value: &str) -> bool {
    value
        .strip_prefix("CUS-")
        .and_then(|serial| serial.parse::<u64>().ok())
        .is_some_and(|serial| serial > 0)
}

/// Validates the `<year>-<serial>` tail shared by policy and claim numbers.
fn validate_year_serial(value: &str, prefix: &str) -> bool {
    let Some(rest) = value.strip_prefix(prefix) else {
        return false;
    };
    let Some((year, serial)) = rest.split_once('-') else {
        return false;
    };
    let Ok(year) = year.parse::<u32>() else {
        return false;
    };
    let Ok(serial) = serial.parse::<u64>() else {
        return false;
    };
    YEAR_RANGE.contains(&year) && serial > 0
}

// ============================================================================
// SECTION: IBAN Checksum
// ============================================================================

/// Validates an IBAN candidate with the ISO 7064 mod-97 checksum.
#[must_use]
pub fn validate_iban(value: &str) -> bool {
    if value.len() < 15 || value.len() > 34 {
        return false;
    }
    let rearranged: String = value.chars().skip(4).chain(value.chars().take(4)).collect();
    let mut remainder: u64 = 0;
    for ch in rearranged.chars() {
        let digit = match ch {
            '0' ..= '9' => u64::from(ch as u8 - b'0'),
            'A' ..= 'Z' => u64::from(ch as u8 - b'A') + 10,
            _ => return false,
        };
        remainder = if digit < 10 {
            (remainder * 10 + digit) % 97
        } else {
            (remainder * 100 + digit) % 97
        };
    }
    remainder == 1
}

// ============================================================================
// SECTION: Fuzzy Matching
// ============================================================================

/// Folds text for fuzzy comparison: NFC, lowercase, whitespace collapsed.
#[must_use]
pub fn fold_for_match(input: &str) -> String {
    let normalized: String = input.nfc().collect();
    let mut out = String::with_capacity(normalized.len());
    let mut in_gap = false;
    for ch in normalized.to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_gap && !out.is_empty() {
                out.push(' ');
            }
            in_gap = true;
        } else {
            in_gap = false;
            out.push(ch);
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Computes the normalized Levenshtein similarity of two folded strings.
///
/// Returns `1.0` for identical inputs and `0.0` for completely different
/// ones. Comparison is over folded text; callers fold with
/// [`fold_for_match`] first.
#[must_use]
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() || b_chars.is_empty() {
        return 0.0;
    }
    let distance = levenshtein(&a_chars, &b_chars);
    let max_len = a_chars.len().max(b_chars.len());
    #[allow(clippy::cast_precision_loss, reason = "Name lengths are far below 2^52.")]
    let similarity = 1.0 - (distance as f64 / max_len as f64);
    similarity
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0 ..= b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];
    for (i, a_ch) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_ch) in b.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
