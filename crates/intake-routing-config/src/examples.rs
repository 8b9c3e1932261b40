// crates/intake-routing-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Deterministic example TOML generators.
// Purpose: Document the config and ruleset formats with loadable examples.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The generated examples are the documented reference format; they load
//! through the same strict parsers as operator files, and the config test
//! suite keeps them loadable.

// ============================================================================
// SECTION: Config Example
// ============================================================================

/// Returns a complete, loadable example configuration.
#[must_use]
pub fn config_toml_example() -> String {
    r#"# Intake Routing Engine configuration
# All sections are optional; absent sections take built-in defaults.

[pipeline]
mode = "LLM_FIRST"
determinism_mode = false

[identity]
shared_mailbox_penalty = 0.2
fuzzy_match_threshold = 0.85
top_k = 5
shared_mailboxes = ["info@example-broker.de"]

[identity.thresholds]
theta_confirm = 0.85
delta_confirm = 0.15
theta_probable = 0.6
delta_probable = 0.05

[identity.signal_weights]
policy_number = 1.0
claim_number = 1.0
customer_number = 1.0
sender_directory_match = 0.7
thread_linkage = 0.3
signature_fuzzy_match = 0.7
address_fuzzy_match = 0.3
llm_assist_proposal = 0.7

[classify]
min_primary_intent = 0.72
min_product_line = 0.65
min_urgency = 0.60
min_risk_flag = 0.80
disagreement_rule_confidence = 0.85
max_llm_attempts = 2
rules_version = "rules-v1"
vip_senders = ["vorstand@example-insurer.de"]

[llm]
provider = "local"
model_id = "intake-classifier-12b"
temperature = 0.0
top_p = 1.0
max_tokens = 1024

[incident]
force_review = false
force_review_queue_id = "QUEUE_INTAKE_REVIEW_GENERAL"
force_review_sla_id = "SLA_1BD"
disable_llm = false
block_case_create_risk_flags_any = ["RISK_SECURITY_MALWARE"]

[extraction]
iban_enabled = true

[io]
directory_timeout_ms = 2000
llm_timeout_ms = 20000
case_timeout_ms = 10000
retry_attempts = 3
retry_backoff_ms = [100, 500]
"#
    .to_string()
}

// ============================================================================
// SECTION: Ruleset Example
// ============================================================================

/// Returns a small, loadable example ruleset.
#[must_use]
pub fn ruleset_toml_example() -> String {
    r#"# Intake Routing Engine ruleset
ruleset_version = "routing-example"

[[rules]]
rule_id = "claims-auto"
priority = 100
queue_id = "QUEUE_CLAIMS_AUTO"
sla_id = "SLA_4H"
actions = ["CREATE_CASE", "ATTACH_ORIGINAL_EMAIL", "ATTACH_ALL_FILES"]

[rules.match]
intents = ["INTENT_CLAIM_NEW", "INTENT_CLAIM_UPDATE"]
product_lines = ["PROD_AUTO"]

[[rules]]
rule_id = "general-inquiry"
priority = 200
queue_id = "QUEUE_INTAKE_REVIEW_GENERAL"
sla_id = "SLA_3BD"
actions = ["ATTACH_ORIGINAL_EMAIL"]

[rules.match]
intents = ["INTENT_GENERAL_INQUIRY"]
"#
    .to_string()
}
