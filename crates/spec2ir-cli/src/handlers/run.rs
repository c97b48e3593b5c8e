//! `spec2ir run`: execute an IR YAML in Chromium

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use spec2ir::runner::normalize_goto_urls;
use spec2ir::{Action, CdpLauncher, IrRunner, ProcessEnv, SessionConfig, TestIr, VariableSource};
use std::path::Path;
use tracing::info;

/// Read and validate an IR file
///
/// # Errors
/// `Io` when the file is unreadable, `SchemaValidation` when it is not valid IR.
pub fn load_ir(path: &Path) -> CliResult<TestIr> {
    let text = std::fs::read_to_string(path)?;
    Ok(TestIr::from_yaml(&text)?)
}

/// Render the plan an IR would execute, one line per action and expectation
#[must_use]
pub fn describe_plan(ir: &TestIr) -> Vec<String> {
    let mut ir = ir.clone();
    normalize_goto_urls(&mut ir);

    let mut lines = vec![format!("{} ({})", ir.id, ir.desc)];
    lines.extend(
        ir.actions
            .iter()
            .enumerate()
            .map(|(i, action)| format!("  {:>2}. {action}", i + 1)),
    );
    lines.extend(ir.expects.iter().map(|expect| match expect {
        spec2ir::Expectation::UrlIs { value } => format!("  expect url_is {value:?}"),
        spec2ir::Expectation::VisibleText { value } => format!("  expect visible_text {value:?}"),
    }));
    lines
}

/// Names of `${NAME}` fill values that `variables` cannot resolve, in order, without repeats
#[must_use]
pub fn unresolved_placeholders(ir: &TestIr, variables: &dyn VariableSource) -> Vec<String> {
    let mut missing = Vec::new();
    for action in &ir.actions {
        let Action::Fill { value, .. } = action else {
            continue;
        };
        let Some(name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) else {
            continue;
        };
        if variables.lookup(name).is_none() && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

fn session_config(args: &RunArgs) -> SessionConfig {
    let config = SessionConfig::from_env();
    if args.headed {
        config.with_headless(false)
    } else {
        config
    }
}

/// Execute the run command
///
/// # Errors
/// Load and validation failures, or the first failing action or expectation.
pub async fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    let ir = load_ir(&args.ir)?;

    if args.dry_run {
        for line in describe_plan(&ir) {
            println!("{line}");
        }
        return Ok(());
    }

    for name in unresolved_placeholders(&ir, &ProcessEnv) {
        reporter.warning(&format!("{name} is not set; ${{{name}}} will be typed literally"));
    }

    let mut launcher = CdpLauncher::new().with_sandbox(!args.no_sandbox);
    if let Some(path) = &args.chromium {
        launcher = launcher.with_chromium_path(path);
    }

    info!(id = %ir.id, actions = ir.actions.len(), "running IR");
    let id = ir.id.clone();
    let report = match IrRunner::new(&launcher)
        .with_session_config(session_config(args))
        .run(ir)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            reporter.failure(&id);
            return Err(e.into());
        }
    };

    if config.verbosity.is_verbose() {
        for step in &report.steps {
            reporter.step(step);
        }
    }
    reporter.run_summary(&report);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const IR: &str = r#"
id: waf_login_1
desc: login
env_base_url: https://10.2.97.255:9443
actions:
  - op: goto
    url: /
  - op: click
    locator: { kind: role, value: button, name: 登录 }
expects:
  - kind: url_is
    value: /statistics
"#;

    #[test]
    fn test_plan_resolves_relative_goto() {
        let ir = TestIr::from_yaml(IR).unwrap();
        let plan = describe_plan(&ir);
        assert_eq!(plan[0], "waf_login_1 (login)");
        assert!(plan[1].contains("goto https://10.2.97.255:9443/"));
        assert!(plan[2].contains("click role=button[name=\"登录\"]"));
        assert_eq!(plan[3], "  expect url_is \"/statistics\"");
    }

    #[test]
    fn test_unresolved_placeholders() {
        let ir = TestIr::from_yaml(
            r#"
id: p
desc: d
env_base_url: https://h
actions:
  - op: fill
    locator: { kind: label, value: 用户名 }
    value: ${ADMIN_USER}
  - op: fill
    locator: { kind: label, value: 密码 }
    value: ${ADMIN_PASS}
  - op: fill
    locator: { kind: label, value: 确认密码 }
    value: ${ADMIN_PASS}
  - op: fill
    locator: { kind: label, value: 备注 }
    value: plain text
"#,
        )
        .unwrap();
        let vars = HashMap::from([("ADMIN_USER".to_string(), "admin".to_string())]);
        assert_eq!(unresolved_placeholders(&ir, &vars), vec!["ADMIN_PASS"]);
    }

    #[test]
    fn test_load_ir_reports_missing_file() {
        let err = load_ir(Path::new("/nonexistent/ir.yaml")).unwrap_err();
        assert!(err.to_string().contains("I/O"));
    }

    #[test]
    fn test_headed_overrides_env() {
        let args = RunArgs {
            ir: "x.yaml".into(),
            dry_run: false,
            headed: true,
            no_sandbox: false,
            chromium: None,
        };
        assert!(!session_config(&args).headless);
    }
}
