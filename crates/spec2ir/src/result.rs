//! Result and error types for spec2ir.

use std::fmt;
use thiserror::Error;

/// Result type for spec2ir operations
pub type Spec2IrResult<T> = Result<T, Spec2IrError>;

/// Longest slice of model output quoted back in an error message
const EXCERPT_CHARS: usize = 400;

/// A single schema violation, located by its field path (e.g. `actions[1].locator.kind`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted/indexed path to the offending field
    pub path: String,
    /// What is wrong with it
    pub message: String,
}

impl FieldError {
    /// Create a new field error
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors that can occur in spec2ir
#[derive(Debug, Error)]
pub enum Spec2IrError {
    /// Page did not reach the required load state in time
    #[error("Navigation to {url} timed out after {ms}ms")]
    NavigationTimeout {
        /// URL being loaded
        url: String,
        /// Budget in milliseconds
        ms: u64,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Model output does not contain a JSON object
    #[error("Malformed model output: {message}; output was: {}", excerpt(.raw))]
    MalformedModelOutput {
        /// What was missing
        message: String,
        /// The raw completion text
        raw: String,
    },

    /// The extracted JSON span could not be parsed
    #[error("Invalid JSON in model output: {source}; candidate was: {}", excerpt(.text))]
    InvalidJson {
        /// Parser error
        #[source]
        source: serde_json::Error,
        /// The candidate JSON text
        text: String,
    },

    /// Parsed JSON does not conform to the IR model
    #[error("IR schema validation failed: {}", join_errors(.errors))]
    SchemaValidation {
        /// Every violation found, in document order
        errors: Vec<FieldError>,
    },

    /// An IR action failed during execution
    #[error("Action #{index} ({op}) failed: {source}")]
    ActionFailed {
        /// Zero-based index into `actions`
        index: usize,
        /// Action tag (`goto`, `fill`, ...)
        op: &'static str,
        /// Underlying failure
        #[source]
        source: Box<Spec2IrError>,
    },

    /// A bounded browser wait expired
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout {
        /// What was being waited for
        what: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// No element matched the query
    #[error("Element not found: {query}")]
    ElementNotFound {
        /// Rendered query
        query: String,
    },

    /// An expectation did not hold
    #[error("Assertion failed: {message}")]
    AssertionFailure {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// LLM endpoint error
    #[cfg(feature = "llm")]
    #[error("LLM request failed: {0}")]
    Llm(#[from] crate::llm::LlmClientError),

    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Spec2IrError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailure {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error (or the action failure it wraps) is a test-scenario
    /// failure rather than a tooling failure
    #[must_use]
    pub fn is_assertion(&self) -> bool {
        match self {
            Self::AssertionFailure { .. } => true,
            Self::ActionFailed { source, .. } => source.is_assertion(),
            _ => false,
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn excerpt(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head:?}...")
    } else {
        format!("{head:?}")
    }
}
