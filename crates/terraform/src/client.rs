//! Terraform CLI abstraction for testability.
//!
//! The [`TerraformClient`] trait covers exactly the operations the harness
//! needs from the provisioning tool. Production code uses [`TerraformCli`],
//! which shells out to the configured binary; tests use `MockTerraform`
//! (feature `test-util`).
//!
//! Each trait method is a single invocation. Retrying transient errors is the
//! job of [`crate::Terraform`], which wraps a client with a [`crate::RetryPolicy`].
//!
//! ```text
//!   ┌───────────────┐
//!   │  Terraform<C> │ (retry policy)
//!   └───────┬───────┘
//!           ▼
//!   ┌────────────────┐
//!   │TerraformClient │ (trait)
//!   └────────────────┘
//!        │        │
//!        ▼        ▼
//!   ┌────────┐ ┌──────┐
//!   │  Cli   │ │ Mock │
//!   └───┬────┘ └──────┘
//!       ▼
//!   terraform binary
//! ```

use std::future::Future;
use std::process::Output;

use tokio::process::Command;
use tracing::debug;

use vpngw_core::config::TerraformConfig;
use vpngw_core::metrics as m;
use vpngw_core::types::OutputValues;

use crate::error::TerraformError;
use crate::options::{PLAN_FILE_NAME, TerraformOptions, VAR_FILE_NAME};
use crate::plan::PlanReport;

/// Name of the workspace terraform always has.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Operations the harness requires from the provisioning tool.
///
/// The trait is `Send + Sync + 'static` so one client can be shared by every
/// scenario task through an `Arc`.
pub trait TerraformClient: Send + Sync + 'static {
    /// Initialises the working directory (`init`, with `-upgrade` when requested).
    fn init(
        &self,
        opts: &TerraformOptions,
    ) -> impl Future<Output = Result<String, TerraformError>> + Send;

    /// Applies the module with the options' variables.
    fn apply(
        &self,
        opts: &TerraformOptions,
    ) -> impl Future<Output = Result<String, TerraformError>> + Send;

    /// Plans against current state and returns the resource changes.
    fn plan(
        &self,
        opts: &TerraformOptions,
    ) -> impl Future<Output = Result<PlanReport, TerraformError>> + Send;

    /// Reads every declared output.
    fn output_all(
        &self,
        opts: &TerraformOptions,
    ) -> impl Future<Output = Result<OutputValues, TerraformError>> + Send;

    /// Destroys everything in the current workspace.
    ///
    /// Must tolerate partially created state.
    fn destroy(
        &self,
        opts: &TerraformOptions,
    ) -> impl Future<Output = Result<String, TerraformError>> + Send;

    /// Selects workspace `name`, creating it if needed.
    fn workspace_select_or_new(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> impl Future<Output = Result<String, TerraformError>> + Send;

    /// Deletes workspace `name`. Deleting a workspace that does not exist is
    /// not an error; deleting `default` is.
    fn workspace_delete(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> impl Future<Output = Result<String, TerraformError>> + Send;
}

/// Parses `terraform workspace list` output. The current workspace is
/// marked with `*`.
pub fn parse_workspace_list(output: &str) -> (Vec<String>, Option<String>) {
    let mut names = Vec::new();
    let mut current = None;
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let name = match trimmed.strip_prefix('*') {
            Some(rest) => {
                let name = rest.trim().to_owned();
                current = Some(name.clone());
                name
            }
            None => trimmed.to_owned(),
        };
        names.push(name);
    }
    (names, current)
}

/// Process-backed [`TerraformClient`].
#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: String,
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &TerraformConfig) -> Self {
        Self::new(config.binary.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn spawn(
        &self,
        opts: &TerraformOptions,
        args: &[&str],
    ) -> Result<Output, TerraformError> {
        opts.ensure_dir()?;
        debug!(binary = %self.binary, dir = %opts.dir.display(), ?args, "running terraform");
        Command::new(&self.binary)
            .args(args)
            .current_dir(&opts.dir)
            .env("TF_IN_AUTOMATION", "1")
            .envs(&opts.env)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TerraformError::Spawn {
                binary: self.binary.clone(),
                source,
            })
    }

    /// Runs a subcommand and accepts the exit codes in `ok_codes`.
    async fn run_accepting(
        &self,
        opts: &TerraformOptions,
        args: &[&str],
        ok_codes: &[i32],
    ) -> Result<(i32, String), TerraformError> {
        let command = args.first().copied().unwrap_or_default();
        let output = self.spawn(opts, args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let code = output.status.code();

        let accepted = code.is_some_and(|c| ok_codes.contains(&c));
        let result = if accepted { "success" } else { "failure" };
        metrics::counter!(
            m::TERRAFORM_COMMANDS_TOTAL,
            m::LABEL_COMMAND => command.to_owned(),
            m::LABEL_RESULT => result
        )
        .increment(1);

        match code {
            Some(c) if accepted => Ok((c, stdout)),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(TerraformError::CommandFailed {
                    command: command.to_owned(),
                    exit_code: code,
                    output: format!("{stdout}{stderr}"),
                })
            }
        }
    }

    async fn run(&self, opts: &TerraformOptions, args: &[&str]) -> Result<String, TerraformError> {
        self.run_accepting(opts, args, &[0]).await.map(|(_, out)| out)
    }

    async fn list_workspaces(
        &self,
        opts: &TerraformOptions,
    ) -> Result<(Vec<String>, Option<String>), TerraformError> {
        let out = self.run(opts, &["workspace", "list"]).await?;
        Ok(parse_workspace_list(&out))
    }
}

impl TerraformClient for TerraformCli {
    async fn init(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        let mut args = vec!["init", "-input=false", "-no-color"];
        if opts.upgrade {
            args.push("-upgrade");
        }
        self.run(opts, &args).await
    }

    async fn apply(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        opts.write_var_file().await?;
        let var_file = format!("-var-file={VAR_FILE_NAME}");
        self.run(
            opts,
            &[
                "apply",
                "-input=false",
                "-auto-approve",
                "-no-color",
                "-lock=true",
                var_file.as_str(),
            ],
        )
        .await
    }

    async fn plan(&self, opts: &TerraformOptions) -> Result<PlanReport, TerraformError> {
        opts.write_var_file().await?;
        let var_file = format!("-var-file={VAR_FILE_NAME}");
        let out_file = format!("-out={PLAN_FILE_NAME}");
        // -detailed-exitcode: 0 = no changes, 2 = changes present
        let (code, _) = self
            .run_accepting(
                opts,
                &[
                    "plan",
                    "-input=false",
                    "-no-color",
                    "-lock=false",
                    "-detailed-exitcode",
                    out_file.as_str(),
                    var_file.as_str(),
                ],
                &[0, 2],
            )
            .await?;
        debug!(dir = %opts.dir.display(), exit_code = code, "plan finished");

        let json = self
            .run(opts, &["show", "-json", "-no-color", PLAN_FILE_NAME])
            .await?;
        PlanReport::from_show_json(&json)
    }

    async fn output_all(&self, opts: &TerraformOptions) -> Result<OutputValues, TerraformError> {
        let json = self.run(opts, &["output", "-json", "-no-color"]).await?;
        OutputValues::from_terraform_json(&json).map_err(|e| TerraformError::Decode {
            command: "output".to_owned(),
            reason: e.to_string(),
        })
    }

    async fn destroy(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        opts.write_var_file().await?;
        let var_file = format!("-var-file={VAR_FILE_NAME}");
        self.run(
            opts,
            &[
                "destroy",
                "-input=false",
                "-auto-approve",
                "-no-color",
                var_file.as_str(),
            ],
        )
        .await
    }

    async fn workspace_select_or_new(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> Result<String, TerraformError> {
        let (names, _) = self.list_workspaces(opts).await?;
        if names.iter().any(|n| n == name) {
            self.run(opts, &["workspace", "select", name]).await
        } else {
            self.run(opts, &["workspace", "new", name]).await
        }
    }

    async fn workspace_delete(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> Result<String, TerraformError> {
        if name == DEFAULT_WORKSPACE {
            return Err(TerraformError::Workspace {
                name: name.to_owned(),
                reason: "the default workspace cannot be deleted".to_owned(),
            });
        }
        let (names, current) = self.list_workspaces(opts).await?;
        if !names.iter().any(|n| n == name) {
            debug!(workspace = name, "workspace already gone");
            return Ok(String::new());
        }
        // 현재 선택된 워크스페이스는 삭제할 수 없음
        if current.as_deref() == Some(name) {
            self.run(opts, &["workspace", "select", DEFAULT_WORKSPACE])
                .await?;
        }
        self.run(opts, &["workspace", "delete", name]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_workspace_list_marks_current() {
        let (names, current) = parse_workspace_list("  default\n* ex-a1b2c3\n  site1-zzzzzz\n\n");
        assert_eq!(names, vec!["default", "ex-a1b2c3", "site1-zzzzzz"]);
        assert_eq!(current.as_deref(), Some("ex-a1b2c3"));
    }

    #[test]
    fn parse_workspace_list_empty() {
        let (names, current) = parse_workspace_list("");
        assert!(names.is_empty());
        assert!(current.is_none());
    }

    #[test]
    fn from_config_uses_binary() {
        let config = TerraformConfig {
            binary: "/opt/terraform/bin/terraform".to_owned(),
            ..TerraformConfig::default()
        };
        assert_eq!(
            TerraformCli::from_config(&config).binary(),
            "/opt/terraform/bin/terraform"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = TerraformCli::new("/nonexistent/terraform-binary");
        let err = cli
            .init(&TerraformOptions::new(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::Spawn { .. }));
    }

    #[tokio::test]
    async fn missing_module_dir_fails_before_spawn() {
        let cli = TerraformCli::default();
        let err = cli
            .output_all(&TerraformOptions::new("/nonexistent/vpngw/mod"))
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::WorkingCopy { .. }));
    }

    #[tokio::test]
    async fn default_workspace_delete_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = TerraformCli::default()
            .workspace_delete(&TerraformOptions::new(dir.path()), DEFAULT_WORKSPACE)
            .await
            .unwrap_err();
        assert!(matches!(err, TerraformError::Workspace { .. }));
    }
}
