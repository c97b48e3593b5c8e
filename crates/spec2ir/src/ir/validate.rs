//! Structural validation of untyped JSON into a [`TestIr`].
//!
//! Walks the whole document and collects every violation with its field
//! path before giving up, so one failed conversion reports everything the
//! model got wrong.

use super::{Action, Expectation, LocatorKind, TestIr, WaitTarget, WaitUntil};
use crate::result::{FieldError, Spec2IrError, Spec2IrResult};
use serde_json::{Map, Value};

/// Validate a parsed JSON document against the IR model.
///
/// All-or-nothing: either the full IR or `SchemaValidation` with every
/// offending path.
///
/// # Errors
/// Returns `SchemaValidation` if any field is missing, mistyped, outside its
/// closed set, or carries an unknown union tag.
pub fn validate_ir_value(mut value: Value) -> Spec2IrResult<TestIr> {
    coerce_scalars(&mut value);
    let mut checker = Checker::default();
    checker.root(&value);
    if !checker.errors.is_empty() {
        return Err(Spec2IrError::SchemaValidation {
            errors: checker.errors,
        });
    }
    serde_json::from_value(value).map_err(|e| Spec2IrError::SchemaValidation {
        errors: vec![FieldError::new("$", e.to_string())],
    })
}

/// Lax scalar coercion applied before checking: models often quote numbers
/// and booleans. Closed-set string fields are left strict.
fn coerce_scalars(value: &mut Value) {
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    if let Some(flag) = obj.get_mut("ignore_https_errors") {
        coerce_bool(flag);
    }
    if let Some(Value::Array(actions)) = obj.get_mut("actions") {
        for action in actions {
            if let Some(timeout) = action.get_mut("timeout_ms") {
                coerce_u64(timeout);
            }
        }
    }
}

fn coerce_bool(value: &mut Value) {
    let parsed = match value {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_u64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        _ => None,
    };
    if let Some(flag) = parsed {
        *value = Value::Bool(flag);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn coerce_u64(value: &mut Value) {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) if n.as_u64().is_none() => n
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64),
        _ => None,
    };
    if let Some(n) = parsed {
        *value = Value::from(n);
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(path, message));
    }

    fn root(&mut self, value: &Value) {
        let Some(obj) = value.as_object() else {
            self.fail("$", format!("expected object, got {}", type_name(value)));
            return;
        };
        self.required_str(obj, "", "id");
        self.required_str(obj, "", "desc");
        self.required_str(obj, "", "env_base_url");
        self.optional_bool(obj, "", "ignore_https_errors");

        if let Some(actions) = self.optional_array(obj, "", "actions") {
            for (i, action) in actions.iter().enumerate() {
                self.action(action, &format!("actions[{i}]"));
            }
        }
        if let Some(expects) = self.optional_array(obj, "", "expects") {
            for (i, expect) in expects.iter().enumerate() {
                self.expectation(expect, &format!("expects[{i}]"));
            }
        }
        if let Some(tags) = self.optional_array(obj, "", "tags") {
            for (i, tag) in tags.iter().enumerate() {
                if !tag.is_string() {
                    self.fail(
                        format!("tags[{i}]"),
                        format!("expected string, got {}", type_name(tag)),
                    );
                }
            }
        }
    }

    fn action(&mut self, value: &Value, path: &str) {
        let Some(obj) = value.as_object() else {
            self.fail(path, format!("expected object, got {}", type_name(value)));
            return;
        };
        let Some(op) = self.required_str(obj, path, "op") else {
            return;
        };
        match op {
            "goto" => {
                self.required_str(obj, path, "url");
                self.optional_enum(obj, path, "wait_until", &WaitUntil::ALL.map(WaitUntil::as_str));
            }
            "fill" => {
                self.locator(obj, path);
                self.required_str(obj, path, "value");
            }
            "click" => self.locator(obj, path),
            "wait_for" => {
                self.optional_enum(obj, path, "target", &WaitTarget::ALL.map(WaitTarget::as_str));
                self.required_str(obj, path, "value");
                self.optional_u64(obj, path, "timeout_ms");
            }
            other => self.fail(
                join(path, "op"),
                format!("unknown action '{other}', expected one of {:?}", Action::OPS),
            ),
        }
    }

    fn locator(&mut self, parent: &Map<String, Value>, path: &str) {
        let path = join(path, "locator");
        let Some(value) = parent.get("locator") else {
            self.fail(path, "missing required field");
            return;
        };
        let Some(obj) = value.as_object() else {
            self.fail(path, format!("expected object, got {}", type_name(value)));
            return;
        };
        if let Some(kind) = self.required_str(obj, &path, "kind") {
            if LocatorKind::parse(kind).is_none() {
                self.fail(
                    join(&path, "kind"),
                    format!(
                        "unknown locator kind '{kind}', expected one of {:?}",
                        LocatorKind::ALL.map(LocatorKind::as_str)
                    ),
                );
            }
        }
        if let Some(v) = self.required_str(obj, &path, "value") {
            if v.is_empty() {
                self.fail(join(&path, "value"), "must not be empty");
            }
        }
        match obj.get("name") {
            None | Some(Value::Null | Value::String(_)) => {}
            Some(other) => self.fail(
                join(&path, "name"),
                format!("expected string, got {}", type_name(other)),
            ),
        }
    }

    fn expectation(&mut self, value: &Value, path: &str) {
        let Some(obj) = value.as_object() else {
            self.fail(path, format!("expected object, got {}", type_name(value)));
            return;
        };
        let Some(kind) = self.required_str(obj, path, "kind") else {
            return;
        };
        if Expectation::KINDS.contains(&kind) {
            self.required_str(obj, path, "value");
        } else {
            self.fail(
                join(path, "kind"),
                format!(
                    "unknown expectation '{kind}', expected one of {:?}",
                    Expectation::KINDS
                ),
            );
        }
    }

    fn required_str<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'a str> {
        match obj.get(key) {
            None => {
                self.fail(join(path, key), "missing required field");
                None
            }
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                self.fail(
                    join(path, key),
                    format!("expected string, got {}", type_name(other)),
                );
                None
            }
        }
    }

    fn optional_bool(&mut self, obj: &Map<String, Value>, path: &str, key: &str) {
        if let Some(value) = obj.get(key) {
            if !value.is_boolean() {
                self.fail(
                    join(path, key),
                    format!("expected boolean, got {}", type_name(value)),
                );
            }
        }
    }

    fn optional_u64(&mut self, obj: &Map<String, Value>, path: &str, key: &str) {
        if let Some(value) = obj.get(key) {
            if value.as_u64().is_none() {
                self.fail(
                    join(path, key),
                    format!("expected non-negative integer, got {value}"),
                );
            }
        }
    }

    fn optional_enum(&mut self, obj: &Map<String, Value>, path: &str, key: &str, allowed: &[&str]) {
        match obj.get(key) {
            None => {}
            Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
            Some(Value::String(s)) => self.fail(
                join(path, key),
                format!("'{s}' is not one of {allowed:?}"),
            ),
            Some(other) => self.fail(
                join(path, key),
                format!("expected string, got {}", type_name(other)),
            ),
        }
    }

    fn optional_array<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'a Vec<Value>> {
        match obj.get(key) {
            None => None,
            Some(Value::Array(items)) => Some(items),
            Some(other) => {
                self.fail(
                    join(path, key),
                    format!("expected array, got {}", type_name(other)),
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(err: Spec2IrError) -> Vec<String> {
        match err {
            Spec2IrError::SchemaValidation { errors } => {
                errors.into_iter().map(|e| e.path).collect()
            }
            other => panic!("expected SchemaValidation, got {other}"),
        }
    }

    fn valid() -> Value {
        json!({
            "id": "t1",
            "desc": "login",
            "env_base_url": "https://host:9443",
            "actions": [
                {"op": "goto", "url": "/", "wait_until": "load"},
                {"op": "fill", "locator": {"kind": "label", "value": "密码"}, "value": "${ADMIN_PASS}"},
                {"op": "click", "locator": {"kind": "role", "value": "button", "name": null}},
                {"op": "wait_for", "target": "text", "value": "Welcome", "timeout_ms": 500}
            ],
            "expects": [{"kind": "visible_text", "value": "Welcome"}],
            "tags": ["smoke"]
        })
    }

    #[test]
    fn test_valid_document_passes() {
        let ir = validate_ir_value(valid()).unwrap();
        assert_eq!(ir.actions.len(), 4);
        assert_eq!(ir.expects.len(), 1);
        assert_eq!(ir.tags, vec!["smoke".to_string()]);
    }

    #[test]
    fn test_missing_root_fields_reported_together() {
        let err = validate_ir_value(json!({"desc": 3})).unwrap_err();
        let p = paths(err);
        assert_eq!(p, vec!["id", "desc", "env_base_url"]);
    }

    #[test]
    fn test_non_object_root() {
        let err = validate_ir_value(json!([1, 2])).unwrap_err();
        assert_eq!(paths(err), vec!["$"]);
    }

    #[test]
    fn test_unknown_action_tag() {
        let mut doc = valid();
        doc["actions"][2]["op"] = json!("hover");
        let err = validate_ir_value(doc).unwrap_err();
        assert!(err.to_string().contains("actions[2].op"));
        assert!(err.to_string().contains("hover"));
    }

    #[test]
    fn test_enum_outside_closed_set() {
        let mut doc = valid();
        doc["actions"][0]["wait_until"] = json!("commit");
        doc["actions"][3]["target"] = json!("title");
        doc["actions"][1]["locator"]["kind"] = json!("name");
        let p = paths(validate_ir_value(doc).unwrap_err());
        assert_eq!(
            p,
            vec![
                "actions[0].wait_until",
                "actions[1].locator.kind",
                "actions[3].target"
            ]
        );
    }

    #[test]
    fn test_missing_locator_and_empty_value() {
        let mut doc = valid();
        doc["actions"][1].as_object_mut().unwrap().remove("locator");
        doc["actions"][2]["locator"]["value"] = json!("");
        let p = paths(validate_ir_value(doc).unwrap_err());
        assert_eq!(p, vec!["actions[1].locator", "actions[2].locator.value"]);
    }

    #[test]
    fn test_bad_expectation_and_tags() {
        let mut doc = valid();
        doc["expects"] = json!([{"kind": "title_is", "value": "x"}, {"kind": "url_is"}]);
        doc["tags"] = json!(["ok", 7]);
        let p = paths(validate_ir_value(doc).unwrap_err());
        assert_eq!(p, vec!["expects[0].kind", "expects[1].value", "tags[1]"]);
    }

    #[test]
    fn test_timeout_must_be_non_negative_integer() {
        let mut doc = valid();
        doc["actions"][3]["timeout_ms"] = json!(-5);
        let p = paths(validate_ir_value(doc).unwrap_err());
        assert_eq!(p, vec!["actions[3].timeout_ms"]);
    }

    #[test]
    fn test_quoted_scalars_are_coerced() {
        let mut doc = valid();
        doc["ignore_https_errors"] = json!("false");
        doc["actions"][3]["timeout_ms"] = json!("15000");
        let ir = validate_ir_value(doc).unwrap();
        assert!(!ir.ignore_https_errors);
        assert!(matches!(ir.actions[3], Action::WaitFor { timeout_ms: 15_000, .. }));

        let mut doc = valid();
        doc["ignore_https_errors"] = json!("1");
        doc["actions"][3]["timeout_ms"] = json!(2500.0);
        let ir = validate_ir_value(doc).unwrap();
        assert!(ir.ignore_https_errors);
        assert!(matches!(ir.actions[3], Action::WaitFor { timeout_ms: 2_500, .. }));
    }

    #[test]
    fn test_uncoercible_scalars_still_fail() {
        let mut doc = valid();
        doc["ignore_https_errors"] = json!("maybe");
        doc["actions"][3]["timeout_ms"] = json!(1.5);
        doc["actions"][0]["wait_until"] = json!("LOAD");
        let p = paths(validate_ir_value(doc).unwrap_err());
        assert_eq!(
            p,
            vec![
                "ignore_https_errors",
                "actions[0].wait_until",
                "actions[3].timeout_ms"
            ]
        );
    }

    #[test]
    fn test_wrong_types() {
        let mut doc = valid();
        doc["ignore_https_errors"] = json!("yes");
        doc["actions"][0]["url"] = json!(42);
        doc["actions"][2]["locator"]["name"] = json!(["a"]);
        let p = paths(validate_ir_value(doc).unwrap_err());
        assert_eq!(
            p,
            vec![
                "ignore_https_errors",
                "actions[0].url",
                "actions[2].locator.name"
            ]
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let mut doc = valid();
        doc["actions"][2]["value"] = json!("leftover");
        doc["comment"] = json!("model chatter");
        let ir = validate_ir_value(doc).unwrap();
        assert_eq!(ir.actions[2].op(), "click");
    }
}
