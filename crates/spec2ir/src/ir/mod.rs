//! Test IR: the validated, replayable test-case document.
//!
//! The IR is the contract between conversion and execution. Actions and
//! expectations are closed tagged unions (`op` / `kind`), so a new variant
//! cannot be added without every `match` over them being updated.

mod validate;

pub use validate::validate_ir_value;

use crate::result::Spec2IrResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default bound for `wait_for` actions
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 15_000;

/// Strategy used to find one UI element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorKind {
    /// Stable test-id attribute (`data-testid`)
    TestId,
    /// Accessible role, optionally narrowed by accessible name
    Role,
    /// Associated label text
    Label,
    /// Visible text content
    Text,
    /// Raw CSS selector
    Css,
    /// Raw XPath selector
    XPath,
}

impl LocatorKind {
    /// Every kind, in prompt priority order
    pub const ALL: [Self; 6] = [
        Self::TestId,
        Self::Role,
        Self::Label,
        Self::Text,
        Self::Css,
        Self::XPath,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TestId => "testid",
            Self::Role => "role",
            Self::Label => "label",
            Self::Text => "text",
            Self::Css => "css",
            Self::XPath => "xpath",
        }
    }

    /// Parse a wire name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy + value for finding one UI element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// Lookup strategy
    pub kind: LocatorKind,
    /// Role name, selector, or visible text depending on `kind`
    pub value: String,
    /// Accessible name (only used with `kind = role`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            name: None,
        }
    }

    /// Role locator with an accessible name
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: LocatorKind::Role,
            value: role.into(),
            name: Some(name.into()),
        }
    }
}

/// Load state a navigation waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    /// `DOMContentLoaded` fired
    #[default]
    DomContentLoaded,
    /// `load` fired
    Load,
    /// No network activity for a short while
    NetworkIdle,
}

impl WaitUntil {
    /// Every load state
    pub const ALL: [Self; 3] = [Self::DomContentLoaded, Self::Load, Self::NetworkIdle];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DomContentLoaded => "domcontentloaded",
            Self::Load => "load",
            Self::NetworkIdle => "networkidle",
        }
    }
}

/// What a `wait_for` action waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitTarget {
    /// Page URL matches a pattern
    #[default]
    Url,
    /// A raw selector appears
    Selector,
    /// Visible text appears
    Text,
}

impl WaitTarget {
    /// Every target
    pub const ALL: [Self; 3] = [Self::Url, Self::Selector, Self::Text];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Selector => "selector",
            Self::Text => "text",
        }
    }
}

const fn default_wait_timeout_ms() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

/// One step of a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Navigate to a URL
    Goto {
        /// Absolute URL, or a path resolved against `env_base_url`
        url: String,
        /// Load state to wait for
        #[serde(default)]
        wait_until: WaitUntil,
    },
    /// Set an input's content
    Fill {
        /// Target element
        locator: Locator,
        /// Literal value or `${NAME}` placeholder
        value: String,
    },
    /// Click an element
    Click {
        /// Target element
        locator: Locator,
    },
    /// Wait for a URL, selector or text
    WaitFor {
        /// What to wait on
        #[serde(default)]
        target: WaitTarget,
        /// URL pattern, selector, or text
        value: String,
        /// Upper bound in milliseconds
        #[serde(default = "default_wait_timeout_ms")]
        timeout_ms: u64,
    },
}

impl Action {
    /// Every action tag
    pub const OPS: [&'static str; 4] = ["goto", "fill", "click", "wait_for"];

    /// Tag of this action
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Goto { .. } => "goto",
            Self::Fill { .. } => "fill",
            Self::Click { .. } => "click",
            Self::WaitFor { .. } => "wait_for",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Goto { url, wait_until } => {
                write!(f, "goto {url} (until {})", wait_until.as_str())
            }
            Self::Fill { locator, .. } => write!(f, "fill {}", crate::query::Query::from(locator)),
            Self::Click { locator } => write!(f, "click {}", crate::query::Query::from(locator)),
            Self::WaitFor {
                target,
                value,
                timeout_ms,
            } => write!(f, "wait_for {} {value:?} ({timeout_ms}ms)", target.as_str()),
        }
    }
}

/// A post-condition checked after all actions ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// Current URL ends with the pattern (after glob markers are trimmed)
    UrlIs {
        /// URL/path pattern, may carry `**` / `*` at the ends
        value: String,
    },
    /// Text is visible on the page
    VisibleText {
        /// Text to find
        value: String,
    },
}

impl Expectation {
    /// Every expectation tag
    pub const KINDS: [&'static str; 2] = ["url_is", "visible_text"];

    /// Tag of this expectation
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UrlIs { .. } => "url_is",
            Self::VisibleText { .. } => "visible_text",
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Root IR document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIr {
    /// Producer-chosen identifier
    pub id: String,
    /// Human description
    pub desc: String,
    /// Scheme + host + port of the system under test
    pub env_base_url: String,
    /// Accept self-signed certificates
    #[serde(default = "default_true")]
    pub ignore_https_errors: bool,
    /// Steps, in execution order
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Post-conditions, in verification order
    #[serde(default)]
    pub expects: Vec<Expectation>,
    /// Labels
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TestIr {
    /// Validate an already-parsed JSON structure into an IR.
    ///
    /// # Errors
    /// Returns `SchemaValidation` listing every offending field path.
    pub fn from_value(value: serde_json::Value) -> Spec2IrResult<Self> {
        validate_ir_value(value)
    }

    /// Load an IR document from YAML, with the same validation as conversion.
    ///
    /// # Errors
    /// Returns error if YAML is invalid or the document does not validate.
    pub fn from_yaml(yaml: &str) -> Spec2IrResult<Self> {
        let value: serde_json::Value = serde_yaml_ng::from_str(yaml)?;
        validate_ir_value(value)
    }

    /// Serialize to YAML, keeping declared key order and non-ASCII text as-is.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> Spec2IrResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Spec2IrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
