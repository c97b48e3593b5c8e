//! spec2ir CLI: convert UI test specs to IR and run them
//!
//! ## Usage
//!
//! ```bash
//! spec2ir convert --spec case.yaml                 # Mock provider, IR to stdout
//! spec2ir convert --spec case.yaml --provider openai-compat --capture-a11y --out ir.yaml
//! spec2ir run --ir ir.yaml                         # Replay in headless Chromium
//! spec2ir run --ir ir.yaml --dry-run               # Validate and print the plan
//! ```

use clap::Parser;
use spec2ir_cli::{
    handlers, logging, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    // Process environment wins over .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Build configuration from CLI args
    let config = build_config(&cli);
    logging::init_logging(config.verbosity, config.color.should_color());

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime(format!("failed to start async runtime: {e}")))?;

    match &cli.command {
        Commands::Convert(args) => rt.block_on(handlers::convert::execute_convert(&config, args)),
        Commands::Run(args) => rt.block_on(handlers::run::execute_run(&config, args)),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color))
}
