//! CLI command definitions using clap

use crate::config::ColorChoice;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// spec2ir: turn natural-language UI test specs into replayable browser tests
#[derive(Parser, Debug)]
#[command(name = "spec2ir")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a spec YAML into IR YAML with a language model
    Convert(ConvertArgs),

    /// Execute an IR YAML in Chromium
    Run(RunArgs),
}

/// Arguments for the convert command
#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Spec file (YAML)
    #[arg(long)]
    pub spec: PathBuf,

    /// Completion provider
    #[arg(long, value_enum, default_value = "mock")]
    pub provider: ProviderArg,

    /// Write the IR here instead of printing it
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Capture the page's accessibility tree and include it in the prompt
    #[arg(long)]
    pub capture_a11y: bool,

    /// Page to capture (defaults to the first URL in the spec's prepare lines)
    #[arg(long)]
    pub a11y_url: Option<String>,

    /// Maximum depth of the captured tree
    #[arg(long, default_value = "10")]
    pub a11y_max_depth: usize,

    /// Maximum children kept per node of the captured tree
    #[arg(long, default_value = "40")]
    pub a11y_max_children: usize,

    /// Navigation budget for the capture, in milliseconds
    #[arg(long, default_value = "20000")]
    pub a11y_timeout_ms: u64,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// IR file (YAML)
    #[arg(long)]
    pub ir: PathBuf,

    /// Validate and print the plan without launching a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Show the browser window (overrides SPEC2IR_HEADLESS)
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium binary to launch
    #[arg(long)]
    pub chromium: Option<PathBuf>,
}

/// Completion provider choice
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderArg {
    /// Deterministic demo output, no network
    Mock,
    /// OpenAI-compatible chat completions, configured by LLM_* variables
    #[value(name = "openai-compat", alias = "openai_compat")]
    OpenAiCompat,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_convert_defaults() {
        let cli = Cli::try_parse_from(["spec2ir", "convert", "--spec", "case.yaml"]).unwrap();
        let Commands::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.provider, ProviderArg::Mock);
        assert!(args.out.is_none());
        assert!(!args.capture_a11y);
        assert_eq!(args.a11y_max_depth, 10);
        assert_eq!(args.a11y_max_children, 40);
    }

    #[test]
    fn test_provider_names() {
        for name in ["openai-compat", "openai_compat"] {
            let cli = Cli::try_parse_from(["spec2ir", "convert", "--spec", "s.yaml", "--provider", name])
                .unwrap();
            let Commands::Convert(args) = cli.command else {
                panic!("expected convert");
            };
            assert_eq!(args.provider, ProviderArg::OpenAiCompat);
        }
        assert!(
            Cli::try_parse_from(["spec2ir", "convert", "--spec", "s.yaml", "--provider", "gpt"]).is_err()
        );
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["spec2ir", "run", "--ir", "x.yaml", "-vv", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert!(!args.headed);
    }
}
