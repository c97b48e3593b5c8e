//! Rebuild a tree from the flat `Accessibility.getFullAXTree` node list.
//!
//! Works on the protocol's JSON form (camelCase keys) so it does not need a
//! browser connection and can be exercised directly.

use super::{A11yNode, ToggleState};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Build a tree from CDP `AXNode` objects.
///
/// The root is the first node without a `parentId` (or the first node).
/// Ignored nodes and unnamed `generic`/`none` wrappers are skipped and their
/// children hoisted into the nearest kept ancestor. Returns `None` for an
/// empty list.
#[must_use]
pub fn from_cdp_nodes(nodes: &Value) -> Option<A11yNode> {
    let list = nodes.as_array()?;
    let by_id: HashMap<&str, &Value> = list
        .iter()
        .filter_map(|n| Some((n.get("nodeId")?.as_str()?, n)))
        .collect();
    let root = list
        .iter()
        .find(|n| n.get("parentId").is_none())
        .or_else(|| list.first())?;

    let mut visited = HashSet::new();
    let mut built = build(root, &by_id, &mut visited);
    match built.len() {
        0 => None,
        1 => built.pop(),
        _ => Some(A11yNode {
            role: "document".to_string(),
            children: built,
            ..A11yNode::default()
        }),
    }
}

fn build<'a>(
    node: &'a Value,
    by_id: &HashMap<&'a str, &'a Value>,
    visited: &mut HashSet<&'a str>,
) -> Vec<A11yNode> {
    if let Some(id) = node.get("nodeId").and_then(Value::as_str) {
        if !visited.insert(id) {
            return Vec::new();
        }
    }

    let children: Vec<A11yNode> = node
        .get("childIds")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|id| by_id.get(id.as_str()?).copied())
        .flat_map(|child| build(child, by_id, visited))
        .collect();

    if node.get("ignored").and_then(Value::as_bool).unwrap_or(false) {
        return children;
    }

    let role = ax_text(node.get("role")).unwrap_or_else(|| "generic".to_string());
    let name = ax_text(node.get("name"));
    if is_wrapper(&role) && name.is_none() {
        return children;
    }

    let mut out = A11yNode {
        role,
        name,
        value: ax_text(node.get("value")),
        description: ax_text(node.get("description")),
        children,
        ..A11yNode::default()
    };
    for prop in node
        .get("properties")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(key) = prop.get("name").and_then(Value::as_str) else {
            continue;
        };
        let value = prop.get("value");
        match key {
            "checked" => out.checked = ax_text(value).and_then(|s| ToggleState::parse(&s)),
            "pressed" => out.pressed = ax_text(value).and_then(|s| ToggleState::parse(&s)),
            "expanded" => {
                out.expanded = value.and_then(|v| v.get("value")).and_then(Value::as_bool);
            }
            "level" => {
                out.level = value
                    .and_then(|v| v.get("value"))
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok());
            }
            "keyshortcuts" => out.keyshortcuts = ax_text(value),
            _ => {}
        }
    }
    vec![out]
}

/// Layout-only roles that carry nothing for a locator unless named
fn is_wrapper(role: &str) -> bool {
    matches!(role, "generic" | "none")
}

/// Text of an `AXValue` (`{"type": ..., "value": ...}`), empty strings dropped
fn ax_text(ax: Option<&Value>) -> Option<String> {
    match ax?.get("value")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
