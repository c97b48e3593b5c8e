//! Output formatting and progress reporting
//!
//! Everything here writes to stderr so stdout stays clean for IR YAML.

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use spec2ir::{RunReport, StepOutcome};
use std::time::Duration;

/// Progress reporter for conversions and runs
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Start a spinner for a task of unknown length
    pub fn start_spinner(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    /// Clear the spinner
    pub fn finish(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print one executed step
    pub fn step(&self, step: &StepOutcome) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(&format_step(step, self.use_color));
    }

    /// Print the summary line of a run
    pub fn run_summary(&self, report: &RunReport) {
        self.success(&format_run_summary(report));
    }
}

/// One line per step: index, description, elapsed time
#[must_use]
pub fn format_step(step: &StepOutcome, use_color: bool) -> String {
    let took = format_duration(step.duration);
    if use_color {
        format!(
            "  {} {} {}",
            style(format!("{:>2}.", step.index + 1)).dim(),
            step.description,
            style(took).dim()
        )
    } else {
        format!("  {:>2}. {} {took}", step.index + 1, step.description)
    }
}

/// Summary of a passing run
#[must_use]
pub fn format_run_summary(report: &RunReport) -> String {
    format!(
        "{}: {} actions, {} expectations passed in {}",
        report.id,
        report.steps.len(),
        report.expectations,
        format_duration(report.total)
    )
}

/// Format a duration for humans
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: usize, ms: u64) -> StepOutcome {
        StepOutcome {
            index,
            description: "click role=button[name=\"登录\"]".to_string(),
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_format_step_is_one_based() {
        let line = format_step(&step(0, 12), false);
        assert_eq!(line, "   1. click role=button[name=\"登录\"] 12ms");
    }

    #[test]
    fn test_format_run_summary() {
        let report = RunReport {
            id: "waf_login_1".to_string(),
            steps: vec![step(0, 5), step(1, 7)],
            expectations: 1,
            total: Duration::from_millis(2300),
        };
        assert_eq!(
            format_run_summary(&report),
            "waf_login_1: 2 actions, 1 expectations passed in 2.30s"
        );
    }

    #[test]
    fn test_quiet_reporter_skips_spinner() {
        let mut reporter = ProgressReporter::new(false, true);
        reporter.start_spinner("converting");
        assert!(reporter.spinner.is_none());
        reporter.finish();
    }
}
