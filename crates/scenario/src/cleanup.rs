//! 정리 조정자 -- 시나리오 종료 후 스택 파기 또는 보존
//!
//! ```text
//!            ┌─ Failed && 보존 플래그 ─> Preserved (안내 출력, 작업 복사본 유지)
//! finish ────┤
//!            └─ 그 외 ─> destroy ─> workspace delete ─> Destroyed
//!                           │ 실패
//!                           └─> DestroyFailed
//! ```
//!
//! 정리 실패는 시나리오의 원래 에러를 덮어쓰지 않습니다. 통과한 시나리오에서
//! 나온 `DestroyFailed`는 호출자가 시나리오 실패로 바꿉니다.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use vpngw_core::metrics as m;
use vpngw_terraform::{Terraform, TerraformClient};

use crate::provisioner::ProvisionedStack;

/// 시나리오 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOutcome {
    Passed,
    Failed,
}

impl ScenarioOutcome {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// 실패 시 보존 정책
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservePolicy {
    env_name: String,
    enabled: bool,
}

impl PreservePolicy {
    /// 환경변수 값이 대소문자 무관 `"true"`이면 활성화됩니다.
    pub fn from_env(env_name: &str) -> Self {
        let enabled = std::env::var(env_name)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            env_name: env_name.to_owned(),
            enabled,
        }
    }

    pub fn fixed(env_name: &str, enabled: bool) -> Self {
        Self {
            env_name: env_name.to_owned(),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn should_preserve(&self, outcome: ScenarioOutcome) -> bool {
        self.enabled && outcome == ScenarioOutcome::Failed
    }
}

/// 정리 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupReport {
    /// 파기하지 않고 남겨 둠
    Preserved {
        role: String,
        workspace: String,
        dir: PathBuf,
    },
    /// 파기 및 워크스페이스 삭제 완료
    Destroyed { role: String, workspace: String },
    /// 파기 또는 워크스페이스 삭제 실패
    DestroyFailed {
        role: String,
        workspace: String,
        /// 수동 정리를 위해 남긴 작업 복사본 (파기 자체가 실패한 경우)
        dir: Option<PathBuf>,
        reason: String,
    },
}

impl CleanupReport {
    pub fn workspace(&self) -> &str {
        match self {
            Self::Preserved { workspace, .. }
            | Self::Destroyed { workspace, .. }
            | Self::DestroyFailed { workspace, .. } => workspace,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::DestroyFailed { .. })
    }

    /// `"{role} '{workspace}': {reason}"` 형식, 실패가 아니면 `None`
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::DestroyFailed {
                role,
                workspace,
                reason,
                ..
            } => Some(format!("{role} '{workspace}': {reason}")),
            _ => None,
        }
    }
}

/// 정리 조정자
pub struct CleanupCoordinator<C: TerraformClient> {
    terraform: Terraform<C>,
    policy: PreservePolicy,
}

impl<C: TerraformClient> Clone for CleanupCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            terraform: self.terraform.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<C: TerraformClient> CleanupCoordinator<C> {
    pub fn new(terraform: Terraform<C>, policy: PreservePolicy) -> Self {
        Self { terraform, policy }
    }

    pub fn policy(&self) -> &PreservePolicy {
        &self.policy
    }

    /// 스택을 정리합니다. 핸들은 소비되므로 같은 스택을 두 번 정리할 수 없습니다.
    pub async fn finish(&self, stack: ProvisionedStack, outcome: ScenarioOutcome) -> CleanupReport {
        let role = stack.role().to_owned();
        let workspace = stack.workspace().to_owned();

        if self.policy.should_preserve(outcome) {
            let dir = stack.preserve();
            warn!(
                %role,
                %workspace,
                dir = %dir.display(),
                flag = self.policy.env_name(),
                "scenario failed, preserving resources for debugging"
            );
            // 로그 필터와 무관하게 운영자에게 보이도록 stderr에도 출력
            eprintln!(
                "Scenario failed. Debug the test and delete resources manually: \
                 {role} workspace '{workspace}' in {}",
                dir.display()
            );
            metrics::counter!(m::STACKS_PRESERVED_TOTAL).increment(1);
            return CleanupReport::Preserved {
                role,
                workspace,
                dir,
            };
        }

        info!(%role, %workspace, "START: destroy");
        let destroyed = self.terraform.destroy(stack.options()).await;
        info!(%role, %workspace, "END: destroy");

        if let Err(e) = destroyed {
            let dir = stack.preserve();
            error!(
                %role,
                %workspace,
                dir = %dir.display(),
                error = %e,
                "destroy failed, working copy kept for manual cleanup"
            );
            metrics::counter!(m::CLEANUP_FAILURES_TOTAL).increment(1);
            return CleanupReport::DestroyFailed {
                role,
                workspace,
                dir: Some(dir),
                reason: e.to_string(),
            };
        }
        metrics::counter!(m::STACKS_DESTROYED_TOTAL).increment(1);

        let deleted = self
            .terraform
            .workspace_delete(stack.options(), &workspace)
            .await;
        stack.release();

        match deleted {
            Ok(_) => CleanupReport::Destroyed { role, workspace },
            Err(e) => {
                warn!(%role, %workspace, error = %e, "workspace delete failed");
                metrics::counter!(m::CLEANUP_FAILURES_TOTAL).increment(1);
                CleanupReport::DestroyFailed {
                    role,
                    workspace,
                    dir: None,
                    reason: format!("workspace delete: {e}"),
                }
            }
        }
    }
}
