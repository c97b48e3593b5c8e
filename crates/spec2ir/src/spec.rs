//! Human-written test specification.

use crate::result::Spec2IrResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One natural-language step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecStep {
    /// What the tester does, in free text
    pub action: String,
}

/// A test case as a person writes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecCase {
    /// Case identifier
    pub id: String,
    /// Human description
    pub desc: String,
    /// Preconditions, e.g. "open https://host:9443/"
    #[serde(default)]
    pub prepare: Vec<String>,
    /// Steps, in order
    #[serde(default)]
    pub steps: Vec<SpecStep>,
    /// Expected outcome, in free text
    pub expect: String,
}

impl SpecCase {
    /// Parse a spec from YAML
    ///
    /// # Errors
    /// Returns error if the YAML is invalid or a required field is missing.
    pub fn from_yaml(yaml: &str) -> Spec2IrResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a spec from a YAML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Spec2IrResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}
