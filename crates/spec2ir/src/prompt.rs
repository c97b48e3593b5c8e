//! Prompt construction for spec→IR conversion.
//!
//! Pure functions: the same spec and context always produce the same prompts.

use crate::spec::SpecCase;
use std::fmt::Write as _;

/// Fixed policy given to the model as the system message
pub const SYSTEM_PROMPT: &str = "\
You are a senior QA automation engineer. Translate the human test spec you are given \
into one JSON object that follows the output schema exactly.

Rules:
- Reply with the JSON object only. No prose, no explanations, no markdown code fences.
- Never write real credentials. Use placeholders such as ${ADMIN_USER} and ${ADMIN_PASS} instead.
- Choose locators in this order of preference:
  1) testid (when the spec names one) 2) role + accessible name 3) label 4) visible text 5) css or xpath, only as a last resort.
- When an accessibility tree is provided, treat it as the primary evidence for roles, names and labels.
- URLs: put scheme, host and port into env_base_url. Use full URLs only in goto. \
In waits and expectations prefer paths or glob patterns (for example **/statistics*) \
so query strings and fragments do not break matching.
- When the spec says to wait for the page to load, use wait_until=domcontentloaded and/or add a wait_for step.";

/// Shape of the IR document, shown to the model
pub const IR_SCHEMA_DESCRIPTION: &str = r#"{
  "id": "string",
  "desc": "string",
  "env_base_url": "string, scheme://host:port",
  "ignore_https_errors": "boolean",
  "actions": [
    {"op": "goto", "url": "string", "wait_until": "domcontentloaded|load|networkidle"},
    {"op": "fill", "locator": {"kind": "testid|role|label|text|css|xpath", "value": "string", "name": "string, optional, role only"}, "value": "string, ${VAR} for secrets"},
    {"op": "click", "locator": {"kind": "testid|role|label|text|css|xpath", "value": "string", "name": "string, optional, role only"}},
    {"op": "wait_for", "target": "url|selector|text", "value": "string", "timeout_ms": "integer"}
  ],
  "expects": [
    {"kind": "url_is", "value": "string, path such as /statistics"},
    {"kind": "visible_text", "value": "string"}
  ],
  "tags": ["string"]
}"#;

/// System and user prompt for one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    /// Policy message
    pub system: String,
    /// Spec, context and schema
    pub user: String,
}

/// Render the prompts for `spec`.
///
/// `a11y_json` is the compact accessibility tree of the page under test, if
/// one was captured.
#[must_use]
pub fn build_prompts(spec: &SpecCase, schema: &str, a11y_json: Option<&str>) -> Prompts {
    Prompts {
        system: SYSTEM_PROMPT.to_string(),
        user: build_user_prompt(spec, schema, a11y_json),
    }
}

fn build_user_prompt(spec: &SpecCase, schema: &str, a11y_json: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "SPEC:");
    let _ = writeln!(out, "id: {}", spec.id);
    let _ = writeln!(out, "desc: {}", spec.desc);
    let _ = writeln!(out, "prepare:");
    for line in &spec.prepare {
        let _ = writeln!(out, "- {line}");
    }
    let _ = writeln!(out, "steps:");
    for step in &spec.steps {
        let _ = writeln!(out, "- {}", step.action);
    }
    let _ = writeln!(out, "expect: {}", spec.expect);

    if let Some(tree) = a11y_json.filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "ACCESSIBILITY TREE (JSON, captured from the live page):");
        let _ = writeln!(out, "{tree}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "OUTPUT SCHEMA (JSON):");
    let _ = writeln!(out, "{schema}");
    let _ = writeln!(out);
    out.push_str("Now emit ONLY the JSON object that conforms to the schema.");
    out
}
