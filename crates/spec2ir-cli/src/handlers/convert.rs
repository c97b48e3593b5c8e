//! `spec2ir convert`: spec YAML to IR YAML

use crate::commands::{ConvertArgs, ProviderArg};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use spec2ir::{
    capture_a11y_tree, extract_first_url, to_compact_json, A11yCaptureOptions, CdpLauncher,
    CompletionProvider, Converter, LlmClient, LlmConfig, MockProvider, SessionConfig, SpecCase,
    Spec2IrError,
};
use tracing::info;

/// Pick the page to ground the conversion on.
///
/// An explicit `--a11y-url` wins over the first URL in the prepare lines.
///
/// # Errors
/// `InvalidArgument` when neither source yields a URL.
pub fn resolve_a11y_url(explicit: Option<&str>, spec: &SpecCase) -> CliResult<String> {
    explicit
        .map(str::to_string)
        .or_else(|| extract_first_url(&spec.prepare))
        .ok_or_else(|| CliError::invalid_argument("no URL found in prepare; pass --a11y-url"))
}

/// A completion provider plus whether it streams its output to stderr
pub struct SelectedProvider {
    /// The provider
    pub provider: Box<dyn CompletionProvider>,
    /// Output is echoed while it arrives
    pub streams: bool,
}

impl std::fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("provider", &self.provider.name())
            .field("streams", &self.streams)
            .finish()
    }
}

/// Build the completion provider chosen on the command line.
///
/// # Errors
/// `Config` when the OpenAI-compatible provider has no API key, or its HTTP
/// client cannot be built.
pub fn build_provider(kind: ProviderArg, config: &CliConfig) -> CliResult<SelectedProvider> {
    match kind {
        ProviderArg::Mock => Ok(SelectedProvider {
            provider: Box::new(MockProvider::new()),
            streams: false,
        }),
        ProviderArg::OpenAiCompat => {
            let llm = LlmConfig::from_env()?;
            let echo = !config.verbosity.is_quiet();
            let client = LlmClient::from_config(&llm)
                .map_err(Spec2IrError::from)?
                .with_stream_echo(echo);
            let streams = echo && client.is_streaming();
            Ok(SelectedProvider {
                provider: Box::new(client),
                streams,
            })
        }
    }
}

async fn capture(
    args: &ConvertArgs,
    spec: &SpecCase,
    reporter: &mut ProgressReporter,
) -> CliResult<String> {
    let url = resolve_a11y_url(args.a11y_url.as_deref(), spec)?;
    info!(url = %url, "capturing accessibility tree");

    let headless = SessionConfig::from_env().headless;
    let options = A11yCaptureOptions::new()
        .with_headless(headless)
        .with_timeout_ms(args.a11y_timeout_ms)
        .with_limits(args.a11y_max_depth, args.a11y_max_children);
    let launcher = CdpLauncher::new().with_sandbox(!args.no_sandbox);

    reporter.start_spinner(&format!("Capturing accessibility tree of {url}"));
    let tree = capture_a11y_tree(&launcher, &url, &options).await;
    reporter.finish();
    let tree = tree?;

    reporter.info(&format!(
        "Captured {} accessibility nodes from {url}",
        tree.node_count()
    ));
    Ok(to_compact_json(&tree)?)
}

/// Execute the convert command
///
/// # Errors
/// Any spec load, capture, provider, conversion or write failure.
pub async fn execute_convert(config: &CliConfig, args: &ConvertArgs) -> CliResult<()> {
    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let spec = SpecCase::load(&args.spec)?;

    let a11y = if args.capture_a11y {
        Some(capture(args, &spec, &mut reporter).await?)
    } else {
        None
    };

    let selected = build_provider(args.provider, config)?;
    let name = selected.provider.name().to_string();
    info!(id = %spec.id, provider = %name, "converting spec");

    // Streamed output goes to the same terminal; no spinner over it
    if !selected.streams {
        reporter.start_spinner(&format!("Converting {} with {name}", spec.id));
    }
    let ir = Converter::new()
        .convert(&spec, selected.provider.as_ref(), a11y.as_deref())
        .await;
    reporter.finish();
    let ir = ir?;
    let yaml = ir.to_yaml()?;

    match &args.out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &yaml)?;
            reporter.success(&format!("IR written to {}", path.display()));
        }
        None => print!("{yaml}"),
    }
    Ok(())
}
