//! `vpngw run` command handler

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use vpngw_scenario::{
    CleanupReport, ScenarioKind, ScenarioOptions, SuiteContext, SuiteReport, plan_scenario,
    run_suite,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `run` command.
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let kinds = select_scenarios(&args)?;
    let ctx = SuiteContext::load(config_path).await?;

    if args.dry_run {
        let report = DryRunReport {
            scenarios: kinds
                .iter()
                .map(|kind| plan_scenario(*kind, &ctx))
                .collect::<Result<_, _>>()?,
        };
        writer.render(&report)?;
        return Ok(());
    }

    info!(
        scenarios = ?kinds.iter().map(ScenarioKind::name).collect::<Vec<_>>(),
        "running scenarios"
    );
    let report = RunReport(run_suite(Arc::new(ctx), &kinds).await);
    writer.render(&report)?;

    if !report.0.all_passed() {
        return Err(CliError::ScenariosFailed {
            failed: report.0.failed,
            total: report.0.results.len(),
        });
    }
    Ok(())
}

/// Resolve scenario names, `--all`, or an empty list (an error).
pub(crate) fn select_scenarios(args: &RunArgs) -> Result<Vec<ScenarioKind>, CliError> {
    if args.all {
        return Ok(ScenarioKind::ALL.to_vec());
    }
    if args.scenarios.is_empty() {
        return Err(CliError::Command(
            "no scenario given (pass scenario names or --all; see `vpngw list`)".to_owned(),
        ));
    }

    let mut kinds: Vec<ScenarioKind> = Vec::with_capacity(args.scenarios.len());
    for name in &args.scenarios {
        let kind: ScenarioKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Suite result wrapper for rendering.
#[derive(Serialize)]
#[serde(transparent)]
pub struct RunReport(pub SuiteReport);

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let suite = &self.0;
        writeln!(
            w,
            "{:<22} {:<8} {:<14} {:>9}  Cleanup",
            "Scenario", "Result", "Prefix", "Duration"
        )?;
        writeln!(w, "{}", "-".repeat(80))?;

        for result in &suite.results {
            let status = if result.passed() {
                "PASS".green().bold()
            } else {
                "FAIL".red().bold()
            };
            let cleanup = result
                .cleanup
                .iter()
                .map(cleanup_label)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                w,
                "{:<22} {:<8} {:<14} {:>8.1}s  {}",
                result.scenario.name(),
                status,
                result.prefix.as_deref().unwrap_or("-"),
                result.duration.as_secs_f64(),
                cleanup
            )?;
            if let Some(error) = &result.error {
                writeln!(w, "  {}", error.red())?;
            }
            for report in &result.cleanup {
                match report {
                    CleanupReport::Preserved { workspace, dir, .. }
                    | CleanupReport::DestroyFailed {
                        workspace,
                        dir: Some(dir),
                        ..
                    } => {
                        writeln!(
                            w,
                            "  {} vpngw destroy --dir {} --workspace {}",
                            "manual cleanup:".yellow(),
                            dir.display(),
                            workspace
                        )?;
                    }
                    _ => {}
                }
            }
        }

        writeln!(w)?;
        let summary = format!(
            "{} passed, {} failed in {:.1}s",
            suite.passed,
            suite.failed,
            suite.duration.as_secs_f64()
        );
        if suite.all_passed() {
            writeln!(w, "{}", summary.green().bold())?;
        } else {
            writeln!(w, "{}", summary.red().bold())?;
        }
        Ok(())
    }
}

fn cleanup_label(report: &CleanupReport) -> String {
    match report {
        CleanupReport::Destroyed { role, .. } => format!("{role}: destroyed"),
        CleanupReport::Preserved { role, .. } => format!("{role}: preserved"),
        CleanupReport::DestroyFailed { role, .. } => format!("{role}: destroy failed"),
    }
}

/// Options assembled by a dry run.
#[derive(Serialize)]
pub struct DryRunReport {
    pub scenarios: Vec<ScenarioOptions>,
}

impl Render for DryRunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for options in &self.scenarios {
            writeln!(
                w,
                "{} (prefix {}, dir {})",
                options.scenario.bold(),
                options.prefix,
                options.terraform_dir.display()
            )?;
            for (name, value) in &options.vars {
                let shown = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                writeln!(w, "  {name:<22} = {shown}")?;
            }
            writeln!(w)?;
        }
        writeln!(w, "{}", "dry run: no terraform command was executed".dimmed())?;
        Ok(())
    }
}
