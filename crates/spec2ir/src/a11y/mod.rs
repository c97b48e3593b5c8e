//! Accessibility-tree capture and normalization.
//!
//! The tree is grounding evidence for the model: role/name pairs it can turn
//! into robust locators. Capture prefers the driver's structured snapshot and
//! falls back to the textual aria snapshot, then prunes to a bounded size so
//! prompts stay small and stable.

mod aria;
mod cdp;

use aria::parse_aria_roots;
pub use aria::parse_aria_snapshot;
pub use cdp::from_cdp_nodes;

use crate::driver::{BrowserLauncher, BrowserSession, SessionConfig};
use crate::ir::WaitUntil;
use crate::result::Spec2IrResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

/// Tri-state value of `checked` / `pressed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToggleRepr", into = "ToggleRepr")]
pub enum ToggleState {
    /// `true`
    On,
    /// `false`
    Off,
    /// `"mixed"`
    Mixed,
}

impl ToggleState {
    /// Parse the textual forms used by snapshots (`true`, `false`, `mixed`)
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "" | "true" => Some(Self::On),
            "false" => Some(Self::Off),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ToggleRepr {
    Bool(bool),
    Text(String),
}

impl TryFrom<ToggleRepr> for ToggleState {
    type Error = String;

    fn try_from(repr: ToggleRepr) -> Result<Self, Self::Error> {
        match repr {
            ToggleRepr::Bool(true) => Ok(Self::On),
            ToggleRepr::Bool(false) => Ok(Self::Off),
            ToggleRepr::Text(s) if s == "mixed" => Ok(Self::Mixed),
            ToggleRepr::Text(s) => Err(format!("invalid toggle state '{s}'")),
        }
    }
}

impl From<ToggleState> for ToggleRepr {
    fn from(state: ToggleState) -> Self {
        match state {
            ToggleState::On => Self::Bool(true),
            ToggleState::Off => Self::Bool(false),
            ToggleState::Mixed => Self::Text("mixed".to_string()),
        }
    }
}

/// One node of an accessibility tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct A11yNode {
    /// ARIA role
    pub role: String,
    /// Accessible name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Current value (inputs, sliders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Accessible description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Keyboard shortcuts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyshortcuts: Option<String>,
    /// Checkbox / radio state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<ToggleState>,
    /// Toggle button state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressed: Option<ToggleState>,
    /// Disclosure state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
    /// Heading / tree level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Child nodes, in document order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<A11yNode>,
}

impl A11yNode {
    /// Create a node with only a role
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Self::default()
        }
    }

    /// Set the accessible name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append a child
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Number of levels in this subtree (a leaf has depth 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }
}

/// Options for [`capture_a11y_tree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A11yCaptureOptions {
    /// Accept self-signed certificates
    pub ignore_https_errors: bool,
    /// Load state to wait for before snapshotting
    pub wait_until: WaitUntil,
    /// Navigation budget in milliseconds
    pub timeout_ms: u64,
    /// Maximum levels kept (root is level 1)
    pub max_depth: usize,
    /// Maximum children kept per node
    pub max_children: usize,
    /// Run the browser without a window
    pub headless: bool,
}

impl Default for A11yCaptureOptions {
    fn default() -> Self {
        Self {
            ignore_https_errors: true,
            wait_until: WaitUntil::DomContentLoaded,
            timeout_ms: 20_000,
            max_depth: 10,
            max_children: 40,
            headless: true,
        }
    }
}

impl A11yCaptureOptions {
    /// Create options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the load state
    #[must_use]
    pub const fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// Set the navigation budget
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the pruning bounds
    #[must_use]
    pub const fn with_limits(mut self, max_depth: usize, max_children: usize) -> Self {
        self.max_depth = max_depth;
        self.max_children = max_children;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_headless(self.headless)
            .with_ignore_https_errors(self.ignore_https_errors)
            .with_navigation_timeout(Duration::from_millis(self.timeout_ms))
    }
}

/// Load `url` in a fresh session and return its pruned accessibility tree.
///
/// The session is closed whether capture succeeds or not.
///
/// # Errors
/// `NavigationTimeout` if the page does not settle in time, or any launch,
/// navigation or snapshot failure from the driver.
pub async fn capture_a11y_tree(
    launcher: &dyn BrowserLauncher,
    url: &str,
    options: &A11yCaptureOptions,
) -> Spec2IrResult<A11yNode> {
    let config = options.session_config();
    let mut session = BrowserSession::open(launcher, &config).await?;
    let outcome = snapshot_page(&mut session, url, options).await;
    session.finish(outcome).await
}

async fn snapshot_page(
    session: &mut BrowserSession,
    url: &str,
    options: &A11yCaptureOptions,
) -> Spec2IrResult<A11yNode> {
    let driver = session.driver();
    driver
        .navigate(url, options.wait_until, Duration::from_millis(options.timeout_ms))
        .await?;

    let (captured, pruned) = if let Some(tree) = driver.accessibility_snapshot().await? {
        let pruned = prune(&tree, options.max_depth, options.max_children)
            .unwrap_or_else(|| A11yNode::new("document"));
        (tree.node_count(), pruned)
    } else {
        warn!(url, "structured accessibility snapshot unavailable, using aria snapshot");
        let text = driver.aria_snapshot().await?;
        let roots = parse_aria_roots(&text);
        let captured = roots.iter().map(A11yNode::node_count).sum();
        (captured, prune_roots(&roots, options.max_depth, options.max_children))
    };

    debug!(
        url,
        captured,
        kept = pruned.node_count(),
        "captured accessibility tree"
    );
    Ok(pruned)
}

/// Prune each top-level entry on its own and gather them under a `document` root.
///
/// A single entry is its own root. With several, the added root does not
/// consume a depth level, so every entry keeps `max_depth` levels.
#[must_use]
pub fn prune_roots(roots: &[A11yNode], max_depth: usize, max_children: usize) -> A11yNode {
    if let [root] = roots {
        return prune(root, max_depth, max_children).unwrap_or_else(|| A11yNode::new("document"));
    }
    A11yNode {
        role: "document".to_string(),
        children: roots
            .iter()
            .take(max_children)
            .filter_map(|root| prune(root, max_depth, max_children))
            .collect(),
        ..A11yNode::default()
    }
}

/// Bound a tree to `max_depth` levels and `max_children` children per node.
///
/// Children beyond the limit are dropped in original order. Empty descriptive
/// fields are removed. Returns `None` when `max_depth` is zero.
#[must_use]
pub fn prune(node: &A11yNode, max_depth: usize, max_children: usize) -> Option<A11yNode> {
    prune_at(node, max_depth, max_children, 0)
}

fn prune_at(node: &A11yNode, max_depth: usize, max_children: usize, depth: usize) -> Option<A11yNode> {
    if depth >= max_depth {
        return None;
    }
    let non_empty = |field: &Option<String>| field.clone().filter(|s| !s.is_empty());
    Some(A11yNode {
        role: node.role.clone(),
        name: non_empty(&node.name),
        value: non_empty(&node.value),
        description: non_empty(&node.description),
        keyshortcuts: non_empty(&node.keyshortcuts),
        checked: node.checked,
        pressed: node.pressed,
        expanded: node.expanded,
        level: node.level,
        children: node
            .children
            .iter()
            .take(max_children)
            .filter_map(|child| prune_at(child, max_depth, max_children, depth + 1))
            .collect(),
    })
}

/// Compact, deterministic JSON with non-ASCII text kept verbatim.
///
/// # Errors
/// Returns error if serialization fails.
pub fn to_compact_json(tree: &A11yNode) -> Spec2IrResult<String> {
    Ok(serde_json::to_string(tree)?)
}

#[allow(clippy::unwrap_used)]
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(https?://[^\s，,]+)").unwrap());

/// Find the first `http(s)://` URL in a list of free-text lines.
///
/// The URL stops at whitespace or a comma (ASCII or full-width); trailing
/// sentence punctuation is trimmed.
#[must_use]
pub fn extract_first_url<S: AsRef<str>>(lines: &[S]) -> Option<String> {
    lines.iter().find_map(|line| {
        URL_PATTERN.find(line.as_ref()).map(|m| {
            m.as_str()
                .trim_end_matches(['，', ',', '。', '.'])
                .to_string()
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockLauncher};
    use crate::result::Spec2IrError;
    use proptest::prelude::*;

    fn wide_tree() -> A11yNode {
        let mut root = A11yNode::new("WebArea").with_name("Login");
        for i in 0..5 {
            root = root.with_child(
                A11yNode::new("button")
                    .with_name(format!("b{i}"))
                    .with_child(A11yNode::new("text").with_name(format!("t{i}"))),
            );
        }
        root
    }

    mod node_tests {
        use super::*;

        #[test]
        fn test_empty_fields_are_omitted() {
            let node = A11yNode::new("button").with_name("OK");
            let json = to_compact_json(&node).unwrap();
            assert_eq!(json, r#"{"role":"button","name":"OK"}"#);
        }

        #[test]
        fn test_toggle_state_wire_forms() {
            let mut node = A11yNode::new("checkbox");
            node.checked = Some(ToggleState::Mixed);
            node.pressed = Some(ToggleState::Off);
            let json = to_compact_json(&node).unwrap();
            assert!(json.contains(r#""checked":"mixed""#));
            assert!(json.contains(r#""pressed":false"#));
            let back: A11yNode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, node);
        }

        #[test]
        fn test_compact_json_keeps_non_ascii() {
            let node = A11yNode::new("textbox").with_name("用户名");
            let json = to_compact_json(&node).unwrap();
            assert!(json.contains("用户名"));
            assert!(!json.contains(' '));
        }
    }

    mod prune_tests {
        use super::*;

        #[test]
        fn test_max_children_keeps_first_in_order() {
            let pruned = prune(&wide_tree(), 10, 2).unwrap();
            let names: Vec<_> = pruned
                .children
                .iter()
                .map(|c| c.name.clone().unwrap())
                .collect();
            assert_eq!(names, vec!["b0", "b1"]);
        }

        #[test]
        fn test_max_depth_counts_root_as_level_one() {
            let pruned = prune(&wide_tree(), 2, 40).unwrap();
            assert_eq!(pruned.depth(), 2);
            assert!(pruned.children.iter().all(|c| c.children.is_empty()));
            assert!(prune(&wide_tree(), 0, 40).is_none());
            assert_eq!(prune(&wide_tree(), 1, 40).unwrap().node_count(), 1);
        }

        #[test]
        fn test_document_root_of_several_entries_takes_no_depth() {
            let roots = vec![
                A11yNode::new("navigation").with_child(A11yNode::new("link").with_name("Home")),
                A11yNode::new("main").with_child(
                    A11yNode::new("form").with_child(A11yNode::new("button").with_name("登录")),
                ),
            ];
            let tree = prune_roots(&roots, 2, 40);
            assert_eq!(tree.role, "document");
            assert_eq!(tree.depth(), 3);
            assert_eq!(tree.children[0].children[0].name.as_deref(), Some("Home"));
            assert_eq!(tree.children[1].children[0].role, "form");
            assert!(tree.children[1].children[0].children.is_empty());

            let single = prune_roots(&roots[..1], 1, 40);
            assert_eq!(single.role, "navigation");
            assert!(single.children.is_empty());
            assert_eq!(prune_roots(&[], 3, 3), A11yNode::new("document"));
        }

        #[test]
        fn test_empty_strings_dropped() {
            let mut node = A11yNode::new("textbox");
            node.name = Some(String::new());
            node.value = Some("x".to_string());
            let pruned = prune(&node, 3, 3).unwrap();
            assert_eq!(pruned.name, None);
            assert_eq!(pruned.value.as_deref(), Some("x"));
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_extract_first_url_trims_punctuation() {
            let lines = ["打开浏览器", "访问 https://10.2.97.255:9443/login。然后登录"];
            assert_eq!(
                extract_first_url(&lines).as_deref(),
                Some("https://10.2.97.255:9443/login")
            );
        }

        #[test]
        fn test_extract_first_url_stops_at_fullwidth_comma() {
            let lines = ["Open HTTP://example.com/a，then log in."];
            assert_eq!(
                extract_first_url(&lines).as_deref(),
                Some("HTTP://example.com/a")
            );
        }

        #[test]
        fn test_extract_first_url_none() {
            let lines: [&str; 1] = ["no address here"];
            assert_eq!(extract_first_url(&lines), None);
        }
    }

    mod capture_tests {
        use super::*;

        #[tokio::test]
        async fn test_capture_prefers_structured_snapshot() {
            let launcher = MockLauncher::new(MockDriver::new().with_a11y_snapshot(wide_tree()));
            let options = A11yCaptureOptions::new().with_limits(10, 3);
            let tree = capture_a11y_tree(&launcher, "https://h/login", &options)
                .await
                .unwrap();
            assert_eq!(tree.children.len(), 3);
            assert!(launcher.was_called("navigate:https://h/login"));
            assert!(launcher.was_called("close"));
        }

        #[tokio::test]
        async fn test_capture_falls_back_to_aria_snapshot() {
            let launcher = MockLauncher::new(
                MockDriver::new().with_aria_snapshot("- textbox \"用户名\"\n- button \"登录\"\n"),
            );
            let tree = capture_a11y_tree(&launcher, "https://h/", &A11yCaptureOptions::new())
                .await
                .unwrap();
            assert_eq!(tree.role, "document");
            assert_eq!(tree.children[1].name.as_deref(), Some("登录"));
        }

        #[tokio::test]
        async fn test_aria_entries_keep_full_depth() {
            let launcher = MockLauncher::new(
                MockDriver::new().with_aria_snapshot("- banner:\n  - link \"Home\"\n- main:\n  - button \"登录\"\n"),
            );
            let options = A11yCaptureOptions::new().with_limits(2, 40);
            let tree = capture_a11y_tree(&launcher, "https://h/", &options)
                .await
                .unwrap();
            assert_eq!(tree.role, "document");
            assert_eq!(tree.children[0].children[0].name.as_deref(), Some("Home"));
            assert_eq!(tree.children[1].children[0].name.as_deref(), Some("登录"));
        }

        #[tokio::test]
        async fn test_capture_closes_session_on_navigation_failure() {
            let launcher = MockLauncher::new(MockDriver::new().with_navigation_timeout("https://slow/"));
            let options = A11yCaptureOptions::new().with_timeout_ms(50);
            let err = capture_a11y_tree(&launcher, "https://slow/", &options)
                .await
                .unwrap_err();
            assert!(matches!(err, Spec2IrError::NavigationTimeout { ms: 50, .. }));
            assert!(launcher.was_called("close"));
        }

        #[tokio::test]
        async fn test_capture_passes_session_options() {
            let launcher = MockLauncher::new(MockDriver::new().with_a11y_snapshot(wide_tree()));
            let options = A11yCaptureOptions {
                ignore_https_errors: false,
                headless: false,
                ..A11yCaptureOptions::default()
            };
            capture_a11y_tree(&launcher, "https://h/", &options).await.unwrap();
            let configs = launcher.launches();
            assert_eq!(configs.len(), 1);
            assert!(!configs[0].ignore_https_errors);
            assert!(!configs[0].headless);
        }
    }

    fn arb_tree() -> impl Strategy<Value = A11yNode> {
        let leaf = "[a-z]{1,6}".prop_map(A11yNode::new);
        leaf.prop_recursive(5, 64, 8, |inner| {
            ("[a-z]{1,6}", prop::collection::vec(inner, 0..8)).prop_map(|(role, children)| {
                A11yNode {
                    role,
                    children,
                    ..A11yNode::default()
                }
            })
        })
    }

    fn bounded(node: &A11yNode, max_children: usize) -> bool {
        node.children.len() <= max_children
            && node.children.iter().all(|c| bounded(c, max_children))
    }

    fn is_prefix(small: &A11yNode, big: &A11yNode) -> bool {
        small.role == big.role
            && small.children.len() <= big.children.len()
            && small
                .children
                .iter()
                .zip(&big.children)
                .all(|(s, b)| is_prefix(s, b))
    }

    proptest! {
        #[test]
        fn prop_prune_respects_bounds(tree in arb_tree(), depth in 1usize..6, width in 1usize..6) {
            let pruned = prune(&tree, depth, width).unwrap();
            prop_assert!(pruned.depth() <= depth);
            prop_assert!(bounded(&pruned, width));
        }

        #[test]
        fn prop_prune_is_prefix_of_original(tree in arb_tree(), depth in 1usize..6, width in 1usize..6) {
            let pruned = prune(&tree, depth, width).unwrap();
            prop_assert!(is_prefix(&pruned, &tree));
            prop_assert_eq!(prune(&pruned, depth, width).unwrap(), pruned);
        }
    }
}
