//! spec2ir CLI Library
//!
//! Command-line interface for converting natural-language UI test specs to
//! IR and replaying the IR in Chromium.
//!
//! ```bash
//! spec2ir convert --spec case.yaml --provider openai-compat --capture-a11y --out case.ir.yaml
//! spec2ir run --ir case.ir.yaml
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{Cli, ColorArg, Commands, ConvertArgs, ProviderArg, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_duration, format_run_summary, format_step, ProgressReporter};
