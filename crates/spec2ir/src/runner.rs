//! IR execution against a browser session.
//!
//! One fresh session per run. Actions execute strictly in order; expectations
//! are checked only after every action succeeded. The session is closed on
//! every exit path.

use crate::driver::{millis, BrowserDriver, BrowserLauncher, BrowserSession, SessionConfig};
use crate::ir::{Action, Expectation, TestIr, WaitTarget};
use crate::query::Query;
use crate::result::{Spec2IrError, Spec2IrResult};
use crate::url_match::{expected_suffix, url_suffix_matches};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where `${NAME}` placeholders are looked up
pub trait VariableSource: Send + Sync + fmt::Debug {
    /// Value of `name`, if defined
    fn lookup(&self, name: &str) -> Option<String>;
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VariableSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl VariableSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Resolve a value that is exactly `${NAME}`; anything else, or an undefined
/// name, comes back unchanged.
#[must_use]
pub fn resolve_value(value: &str, variables: &dyn VariableSource) -> String {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .and_then(|name| variables.lookup(name))
        .unwrap_or_else(|| value.to_string())
}

/// Whether `url` starts with a URI scheme
fn has_scheme(url: &str) -> bool {
    if let Some((scheme, _)) = url.split_once("://") {
        let mut chars = scheme.chars();
        return chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    }
    ["about:", "data:", "javascript:", "file:"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

/// Resolve every scheme-less `goto` URL against `env_base_url`
pub fn normalize_goto_urls(ir: &mut TestIr) {
    let base = ir.env_base_url.trim_end_matches('/').to_string();
    for action in &mut ir.actions {
        if let Action::Goto { url, .. } = action {
            if !has_scheme(url) {
                *url = format!("{base}/{}", url.trim_start_matches('/'));
            }
        }
    }
}

/// Outcome of one executed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Zero-based action index
    pub index: usize,
    /// Human-readable action
    pub description: String,
    /// Time spent
    pub duration: Duration,
}

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// IR identifier
    pub id: String,
    /// Every action, in execution order
    pub steps: Vec<StepOutcome>,
    /// Number of expectations verified
    pub expectations: usize,
    /// Wall time from launch to close
    pub total: Duration,
}

/// Executes IR documents
#[derive(Debug)]
pub struct IrRunner<'a> {
    launcher: &'a dyn BrowserLauncher,
    variables: Box<dyn VariableSource>,
    config: SessionConfig,
}

impl<'a> IrRunner<'a> {
    /// Runner resolving placeholders from the process environment
    #[must_use]
    pub fn new(launcher: &'a dyn BrowserLauncher) -> Self {
        Self {
            launcher,
            variables: Box::new(ProcessEnv),
            config: SessionConfig::default(),
        }
    }

    /// Resolve placeholders through `variables`
    #[must_use]
    pub fn with_variables(mut self, variables: impl VariableSource + 'static) -> Self {
        self.variables = Box::new(variables);
        self
    }

    /// Base session settings; `ignore_https_errors` is taken from each IR
    #[must_use]
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute `ir`.
    ///
    /// # Errors
    /// `BrowserLaunch` if no session can be opened, `ActionFailed` for the
    /// first failing action, `AssertionFailure` for the first failing
    /// expectation, or a close error after an otherwise clean run.
    pub async fn run(&self, mut ir: TestIr) -> Spec2IrResult<RunReport> {
        let start = Instant::now();
        normalize_goto_urls(&mut ir);
        let config = self
            .config
            .clone()
            .with_ignore_https_errors(ir.ignore_https_errors);

        let mut session = BrowserSession::open(self.launcher, &config).await?;
        let outcome = self.execute(session.driver(), &ir, &config).await;
        let steps = session.finish(outcome).await?;

        let report = RunReport {
            id: ir.id,
            steps,
            expectations: ir.expects.len(),
            total: start.elapsed(),
        };
        info!(
            id = %report.id,
            actions = report.steps.len(),
            expectations = report.expectations,
            total_ms = millis(report.total),
            "IR run passed"
        );
        Ok(report)
    }

    async fn execute(
        &self,
        driver: &mut dyn BrowserDriver,
        ir: &TestIr,
        config: &SessionConfig,
    ) -> Spec2IrResult<Vec<StepOutcome>> {
        let mut steps = Vec::with_capacity(ir.actions.len());
        for (index, action) in ir.actions.iter().enumerate() {
            let started = Instant::now();
            debug!(index, action = %action, "executing action");
            self.perform(driver, action, config)
                .await
                .map_err(|source| Spec2IrError::ActionFailed {
                    index,
                    op: action.op(),
                    source: Box::new(source),
                })?;
            steps.push(StepOutcome {
                index,
                description: action.to_string(),
                duration: started.elapsed(),
            });
        }
        for expectation in &ir.expects {
            debug!(kind = expectation.kind(), "checking expectation");
            check(driver, expectation, config).await?;
        }
        Ok(steps)
    }

    async fn perform(
        &self,
        driver: &mut dyn BrowserDriver,
        action: &Action,
        config: &SessionConfig,
    ) -> Spec2IrResult<()> {
        match action {
            Action::Goto { url, wait_until } => {
                driver
                    .navigate(url, *wait_until, config.navigation_timeout)
                    .await
            }
            Action::Fill { locator, value } => {
                let value = resolve_value(value, self.variables.as_ref());
                driver
                    .fill(&Query::from(locator), &value, config.action_timeout)
                    .await
            }
            Action::Click { locator } => {
                driver
                    .click(&Query::from(locator), config.action_timeout)
                    .await
            }
            Action::WaitFor {
                target,
                value,
                timeout_ms,
            } => {
                let timeout = Duration::from_millis(*timeout_ms);
                match target {
                    WaitTarget::Url => driver.wait_for_url(value, timeout).await,
                    WaitTarget::Text => driver.wait_for(&Query::Text(value.clone()), timeout).await,
                    WaitTarget::Selector => {
                        driver.wait_for(&Query::Css(value.clone()), timeout).await
                    }
                }
            }
        }
    }
}

async fn check(
    driver: &mut dyn BrowserDriver,
    expectation: &Expectation,
    config: &SessionConfig,
) -> Spec2IrResult<()> {
    match expectation {
        Expectation::UrlIs { value } => {
            let current = driver.current_url().await?;
            if url_suffix_matches(&current, value) {
                Ok(())
            } else {
                Err(Spec2IrError::assertion(format!(
                    "URL mismatch: expected suffix {:?}, got {current:?}",
                    expected_suffix(value)
                )))
            }
        }
        Expectation::VisibleText { value } => {
            match driver
                .wait_for(&Query::Text(value.clone()), config.expect_timeout)
                .await
            {
                Err(Spec2IrError::Timeout { .. }) => Err(Spec2IrError::assertion(format!(
                    "text {value:?} not visible within {}ms",
                    millis(config.expect_timeout)
                ))),
                other => other,
            }
        }
    }
}
