//! `vpngw destroy` command handler
//!
//! Tears down a stack that a failed run left behind because the
//! preserve-on-failure flag was set (or because its destroy failed).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use vpngw_core::config::HarnessConfig;
use vpngw_scenario::{ScenarioError, check_credential, retry_policy};
use vpngw_terraform::{Terraform, TerraformCli, TerraformClient, TerraformOptions};

use crate::cli::DestroyArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `destroy` command.
pub async fn execute(
    args: DestroyArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = HarnessConfig::load(config_path).await?;
    check_credential(&config.suite.credential_env).map_err(ScenarioError::from)?;

    let client = Arc::new(TerraformCli::from_config(&config.terraform));
    let terraform = Terraform::new(client, retry_policy(&config)?);

    let report = destroy_stack(
        &terraform,
        &args.dir,
        &args.workspace,
        config.terraform.upgrade,
    )
    .await?;
    writer.render(&report)?;
    Ok(())
}

/// Re-initialises the preserved working copy with its saved variables,
/// destroys the workspace's resources and then deletes the workspace.
pub(crate) async fn destroy_stack<C: TerraformClient>(
    terraform: &Terraform<C>,
    dir: &Path,
    workspace: &str,
    upgrade: bool,
) -> Result<DestroyReport, CliError> {
    let options = TerraformOptions::new(dir)
        .with_upgrade(upgrade)
        .with_saved_vars()
        .await?;
    options.ensure_dir()?;

    info!(workspace, dir = %dir.display(), "START: manual destroy");
    terraform.init(&options).await?;
    terraform.workspace_select_or_new(&options, workspace).await?;
    terraform.destroy(&options).await?;
    terraform.workspace_delete(&options, workspace).await?;
    info!(workspace, dir = %dir.display(), "END: manual destroy");

    Ok(DestroyReport {
        workspace: workspace.to_owned(),
        dir: dir.to_path_buf(),
        destroyed: true,
    })
}

#[derive(Serialize)]
pub struct DestroyReport {
    pub workspace: String,
    pub dir: PathBuf,
    pub destroyed: bool,
}

impl Render for DestroyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Workspace {} {}",
            self.workspace.bold(),
            "destroyed".green().bold()
        )?;
        writeln!(
            w,
            "The working copy at {} can now be removed.",
            self.dir.display()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use vpngw_terraform::{MockTerraform, RetryPolicy};

    use super::*;

    fn terraform(mock: MockTerraform) -> (Terraform<MockTerraform>, Arc<MockTerraform>) {
        let mock = Arc::new(mock);
        let tf = Terraform::new(
            Arc::clone(&mock),
            RetryPolicy::default().with_time_between_retries(Duration::ZERO),
        );
        (tf, mock)
    }

    #[tokio::test]
    async fn test_destroy_uses_saved_vars_and_deletes_workspace() {
        let dir = tempfile::tempdir().expect("temp dir");
        TerraformOptions::new(dir.path())
            .with_var("prefix", "site1-abc123")
            .with_var("region", "eu-de")
            .write_var_file()
            .await
            .expect("write var file");

        let (tf, mock) = terraform(MockTerraform::new());
        let report = destroy_stack(&tf, dir.path(), "site1-abc123", false)
            .await
            .expect("destroy should succeed");
        assert!(report.destroyed);

        let commands: Vec<String> = mock.calls().into_iter().map(|c| c.command).collect();
        assert_eq!(
            commands,
            ["init", "workspace-select-or-new", "destroy", "workspace-delete"]
        );
        let destroy = &mock.calls_for("destroy")[0];
        assert_eq!(destroy.vars["region"], "eu-de");
        assert!(!mock.workspaces().contains("site1-abc123"));
    }

    #[tokio::test]
    async fn test_destroy_failure_keeps_workspace() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (tf, mock) =
            terraform(MockTerraform::new().with_failure("destroy", "Error: resource in use"));

        let err = destroy_stack(&tf, dir.path(), "ex-abc123", false)
            .await
            .err()
            .expect("destroy should fail");
        assert_eq!(err.exit_code(), 3);
        assert_eq!(mock.count("workspace-delete"), 0);
    }

    #[tokio::test]
    async fn test_destroy_missing_dir_fails_before_terraform() {
        let (tf, mock) = terraform(MockTerraform::new());
        let missing = Path::new("/nonexistent/vpngw/stack");
        let result = destroy_stack(&tf, missing, "ex-abc123", false).await;
        assert!(result.is_err());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_destroy_report_text() {
        let report = DestroyReport {
            workspace: "ex-abc123".to_owned(),
            dir: PathBuf::from("/tmp/ex-abc123-x"),
            destroyed: true,
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("ex-abc123"));
        assert!(output.contains("/tmp/ex-abc123-x"));
    }
}
