//! spec2ir: natural-language UI test specs in, replayable browser tests out.
//!
//! A person writes a test case as a short YAML spec (preconditions, steps,
//! expected outcome). spec2ir asks a language model to translate it into a
//! strictly typed test IR, grounding the prompt in the live page's
//! accessibility tree when asked, then scrubs literal credentials and
//! validates the result. The IR can be replayed against Chromium.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌─────────┐   ┌──────────┐
//! │ SpecCase │──►│ prompt   │──►│ Completion   │──►│ convert │──►│ TestIr   │
//! │ (YAML)   │   │          │   │ Provider     │   │ extract │   │ (YAML)   │
//! └──────────┘   └────▲─────┘   └──────────────┘   │ policy  │   └────┬─────┘
//!                     │                            │ validate│        │
//!              ┌──────┴──────┐                     └─────────┘   ┌────▼─────┐
//!              │ a11y capture│◄──────── BrowserDriver ──────────►│ IrRunner │
//!              └─────────────┘                                   └──────────┘
//! ```
//!
//! # Features
//!
//! - `llm` (default): OpenAI-compatible HTTP client
//! - `browser`: Chromium over CDP via chromiumoxide

#![warn(missing_docs)]

pub mod a11y;
#[cfg(feature = "browser")]
pub mod browser;
pub mod convert;
pub mod driver;
pub mod ir;
pub mod llm;
pub mod prompt;
pub mod query;
mod result;
pub mod runner;
pub mod spec;
pub mod url_match;

pub use a11y::{capture_a11y_tree, extract_first_url, to_compact_json, A11yCaptureOptions, A11yNode};
#[cfg(feature = "browser")]
pub use browser::{CdpDriver, CdpLauncher};
pub use convert::{spec_to_ir, Converter, CredentialPolicy};
pub use driver::{BrowserDriver, BrowserLauncher, BrowserSession, MockDriver, MockLauncher, SessionConfig};
pub use ir::{Action, Expectation, Locator, LocatorKind, TestIr, WaitTarget, WaitUntil};
#[cfg(feature = "llm")]
pub use llm::LlmClient;
pub use llm::{CompletionProvider, LlmConfig, MockProvider};
pub use query::Query;
pub use result::{FieldError, Spec2IrError, Spec2IrResult};
pub use runner::{IrRunner, ProcessEnv, RunReport, StepOutcome, VariableSource};
pub use spec::{SpecCase, SpecStep};

/// Everything needed to convert and run, in one import
pub mod prelude {
    pub use super::a11y::*;
    pub use super::convert::*;
    pub use super::driver::*;
    pub use super::ir::*;
    pub use super::llm::*;
    pub use super::result::*;
    pub use super::runner::*;
    pub use super::spec::*;
}
