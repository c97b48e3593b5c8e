//! Spec→IR conversion.
//!
//! Pipeline, strictly in order:
//! prompts → completion → JSON extraction → parse → policy → validation.
//! Any stage failing aborts the conversion; a partial IR is never returned.

pub mod extract;
pub mod policy;

pub use extract::extract_json_object;
pub use policy::{apply_policy, CredentialPolicy, PASS_PLACEHOLDER, USER_PLACEHOLDER};

use crate::ir::{validate_ir_value, TestIr};
use crate::llm::CompletionProvider;
use crate::prompt::{build_prompts, IR_SCHEMA_DESCRIPTION};
use crate::result::{Spec2IrError, Spec2IrResult};
use crate::spec::SpecCase;
use tracing::debug;

/// Converts human specs into validated IR documents
#[derive(Debug, Clone, Default)]
pub struct Converter {
    policy: CredentialPolicy,
}

impl Converter {
    /// Create a converter with the default credential policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different credential policy
    #[must_use]
    pub fn with_policy(mut self, policy: CredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active credential policy
    #[must_use]
    pub const fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Convert `spec` using `provider`, grounding the prompt in `a11y_json`
    /// when given.
    ///
    /// # Errors
    /// The provider's error, `MalformedModelOutput`, `InvalidJson` or
    /// `SchemaValidation`.
    pub async fn convert(
        &self,
        spec: &SpecCase,
        provider: &dyn CompletionProvider,
        a11y_json: Option<&str>,
    ) -> Spec2IrResult<TestIr> {
        let prompts = build_prompts(spec, IR_SCHEMA_DESCRIPTION, a11y_json);
        debug!(
            spec = %spec.id,
            provider = provider.name(),
            grounded = a11y_json.is_some(),
            prompt_chars = prompts.user.chars().count(),
            "prompts built"
        );

        let raw = provider.complete(&prompts.system, &prompts.user).await?;
        debug!(spec = %spec.id, chars = raw.chars().count(), "completion received");

        let candidate = extract_json_object(&raw)?;
        let mut value: serde_json::Value =
            serde_json::from_str(candidate).map_err(|source| Spec2IrError::InvalidJson {
                source,
                text: candidate.to_string(),
            })?;
        debug!(spec = %spec.id, "model output parsed");

        apply_policy(&mut value, &self.policy);
        let ir = validate_ir_value(value)?;
        debug!(
            spec = %spec.id,
            ir = %ir.id,
            actions = ir.actions.len(),
            expects = ir.expects.len(),
            "IR validated"
        );
        Ok(ir)
    }
}

/// Convert `spec` with the default policy.
///
/// # Errors
/// See [`Converter::convert`].
pub async fn spec_to_ir(
    spec: &SpecCase,
    provider: &dyn CompletionProvider,
    a11y_json: Option<&str>,
) -> Spec2IrResult<TestIr> {
    Converter::new().convert(spec, provider, a11y_json).await
}
