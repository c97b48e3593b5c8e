//! Security and normalization policy applied to parsed model output.
//!
//! Runs on the untyped JSON before validation, so locator aliases the model
//! invents (`name`, `id`, `automation_id`) can be mapped onto real kinds
//! instead of failing the closed-set check.

use serde_json::{Map, Value};

/// Placeholder substituted for a literal user name
pub const USER_PLACEHOLDER: &str = "${ADMIN_USER}";

/// Placeholder substituted for a password-like literal
pub const PASS_PLACEHOLDER: &str = "${ADMIN_PASS}";

/// Heuristic for spotting literal credentials in `fill` values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPolicy {
    /// Literal values treated as user names
    pub usernames: Vec<String>,
    /// Minimum length (in characters) of a password-like value
    pub min_secret_len: usize,
    /// Password-like values must mix ASCII letters and digits
    pub require_letter_and_digit: bool,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            usernames: vec!["admin".to_string()],
            min_secret_len: 8,
            require_letter_and_digit: true,
        }
    }
}

impl CredentialPolicy {
    /// Create the default policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `name` as a literal user name too
    #[must_use]
    pub fn with_username(mut self, name: impl Into<String>) -> Self {
        self.usernames.push(name.into());
        self
    }

    /// Set the minimum password-like length
    #[must_use]
    pub const fn with_min_secret_len(mut self, len: usize) -> Self {
        self.min_secret_len = len;
        self
    }

    /// Replacement for a `fill` value, or `None` to keep it
    #[must_use]
    pub fn scrub(&self, value: &str) -> Option<&'static str> {
        if is_placeholder(value) {
            return None;
        }
        if self.usernames.iter().any(|u| u == value) {
            return Some(USER_PLACEHOLDER);
        }
        if self.looks_like_secret(value) {
            return Some(PASS_PLACEHOLDER);
        }
        None
    }

    fn looks_like_secret(&self, value: &str) -> bool {
        if value.chars().count() < self.min_secret_len {
            return false;
        }
        !self.require_letter_and_digit
            || (value.chars().any(|c| c.is_ascii_alphabetic())
                && value.chars().any(|c| c.is_ascii_digit()))
    }
}

/// `${NAME}`
fn is_placeholder(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}

/// Apply locator aliasing and credential scrubbing in place.
///
/// Only `fill` and `click` actions are touched. Anything malformed is left
/// alone for the validator to report.
pub fn apply_policy(ir: &mut Value, policy: &CredentialPolicy) {
    let Some(actions) = ir.get_mut("actions").and_then(Value::as_array_mut) else {
        return;
    };
    for action in actions.iter_mut().filter_map(Value::as_object_mut) {
        let op = action
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if op == "fill" {
            scrub_fill_value(action, policy);
        }
        if op == "fill" || op == "click" {
            if let Some(locator) = action.get_mut("locator").and_then(Value::as_object_mut) {
                alias_locator(locator);
            }
        }
    }
}

fn scrub_fill_value(action: &mut Map<String, Value>, policy: &CredentialPolicy) {
    let Some(Value::String(value)) = action.get_mut("value") else {
        return;
    };
    if let Some(placeholder) = policy.scrub(value) {
        tracing::debug!(placeholder, "replaced literal credential in fill value");
        *value = placeholder.to_string();
    }
}

/// Map alias kinds onto real ones: `name` and `id` become CSS, `automation_id`
/// becomes a test id.
pub fn alias_locator(locator: &mut Map<String, Value>) {
    let Some(Value::String(kind)) = locator.get("kind") else {
        return;
    };
    let Some(Value::String(value)) = locator.get("value") else {
        return;
    };
    let aliased = match kind.as_str() {
        "name" => ("css", format!("[name=\"{value}\"]")),
        "id" => ("css", format!("#{value}")),
        "automation_id" => ("testid", value.clone()),
        _ => return,
    };
    locator.insert("kind".to_string(), Value::from(aliased.0));
    locator.insert("value".to_string(), Value::from(aliased.1));
}
