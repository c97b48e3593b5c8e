//! Parser for the textual aria snapshot.
//!
//! The snapshot is a YAML list where each entry is `role "name" [attr]...`,
//! or a mapping from such an entry to its children or text value:
//!
//! ```text
//! - heading "Sign in" [level=1]
//! - textbox "用户名"
//! - checkbox "Remember me" [checked]
//! - navigation:
//!   - link "Home"
//! - paragraph: Forgot your password?
//! ```

use super::{A11yNode, ToggleState};
use regex::Regex;
use serde_yaml_ng::Value;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<role>[^\s"]+)(?:\s+"(?P<name>.*)")?(?P<attrs>(?:\s*\[[^\]]*\])*)$"#)
        .unwrap()
});

#[allow(clippy::unwrap_used)]
static ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<key>[a-z_-]+)(?:=(?P<value>[^\]]*))?\]").unwrap()
});

/// Result of normalizing one YAML value
enum Normalized {
    Node(A11yNode),
    Many(Vec<A11yNode>),
    Scalar(String),
    Empty,
}

/// Parse an aria snapshot into a single-rooted tree.
///
/// Several top-level entries are wrapped in a synthetic `document` root. A
/// document that is not valid YAML becomes one `text` node carrying the raw
/// text, so a capture never fails on snapshot syntax.
#[must_use]
pub fn parse_aria_snapshot(text: &str) -> A11yNode {
    let mut roots = parse_aria_roots(text);
    if roots.len() == 1 {
        return roots.remove(0);
    }
    A11yNode {
        role: "document".to_string(),
        children: roots,
        ..A11yNode::default()
    }
}

/// Top-level entries of an aria snapshot, before any synthetic root is added.
///
/// Empty for a blank snapshot.
pub(crate) fn parse_aria_roots(text: &str) -> Vec<A11yNode> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let parsed: Value = match serde_yaml_ng::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "aria snapshot is not valid YAML");
            return vec![A11yNode::new("text").with_name(text)];
        }
    };
    match normalize(&parsed) {
        Normalized::Node(node) => vec![node],
        Normalized::Many(nodes) => nodes,
        Normalized::Scalar(s) => vec![A11yNode::new("text").with_name(s)],
        Normalized::Empty => Vec::new(),
    }
}

fn normalize(value: &Value) -> Normalized {
    match value {
        Value::Null => Normalized::Empty,
        Value::String(s) => Normalized::Node(entry(s)),
        Value::Bool(_) | Value::Number(_) => Normalized::Scalar(scalar_text(value)),
        Value::Sequence(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match normalize(item) {
                    Normalized::Node(node) => out.push(node),
                    Normalized::Many(nodes) => out.extend(nodes),
                    Normalized::Scalar(s) if !s.is_empty() => {
                        out.push(A11yNode::new("text").with_name(s));
                    }
                    Normalized::Scalar(_) | Normalized::Empty => {}
                }
            }
            if out.is_empty() {
                Normalized::Empty
            } else {
                Normalized::Many(out)
            }
        }
        Value::Mapping(map) => {
            let mut items: Vec<A11yNode> = map
                .iter()
                .map(|(key, child)| {
                    let mut node = entry(&scalar_text(key));
                    match normalize(child) {
                        Normalized::Node(c) => node.children.push(c),
                        Normalized::Many(cs) => node.children.extend(cs),
                        Normalized::Scalar(s) if !s.is_empty() => node.value = Some(s),
                        Normalized::Scalar(_) | Normalized::Empty => {}
                    }
                    node
                })
                .collect();
            match items.len() {
                0 => Normalized::Empty,
                1 => Normalized::Node(items.remove(0)),
                _ => Normalized::Many(items),
            }
        }
        Value::Tagged(tagged) => normalize(&tagged.value),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            serde_yaml_ng::to_string(value).unwrap_or_default().trim().to_string()
        }
    }
}

/// Parse one `role "name" [attr]...` entry
fn entry(raw: &str) -> A11yNode {
    let raw = raw.trim();
    if raw.is_empty() {
        return A11yNode::new("text");
    }
    let Some(caps) = ENTRY_PATTERN.captures(raw) else {
        return A11yNode::new("text").with_name(raw);
    };
    let mut node = A11yNode::new(&caps["role"]);
    node.name = caps
        .name("name")
        .map(|m| m.as_str().trim_end_matches('"').to_string())
        .filter(|s| !s.is_empty());
    if let Some(attrs) = caps.name("attrs") {
        apply_attrs(&mut node, attrs.as_str());
    }
    node
}

fn apply_attrs(node: &mut A11yNode, attrs: &str) {
    for caps in ATTR_PATTERN.captures_iter(attrs) {
        let value = caps.name("value").map_or("", |m| m.as_str());
        match &caps["key"] {
            "level" => node.level = value.parse().ok(),
            "checked" => node.checked = ToggleState::parse(value),
            "pressed" => node.pressed = ToggleState::parse(value),
            "expanded" => node.expanded = Some(value != "false"),
            _ => {}
        }
    }
}
