//! 원격 게이트웨이 사전 리소스 프로비저닝
//!
//! 시나리오가 연결할 상대편 VPN 게이트웨이와 네트워크를 임시 스택으로 만듭니다.
//!
//! # 흐름
//! ```text
//! check_credential ─> 템플릿 복사(임시 디렉토리) ─> workspace select-or-new <prefix>
//!                                                       │
//!                               ProvisionedStack <──────┘  (prepare)
//!                                     │
//!                     init + apply (재시도) ─> output  (apply)
//! ```
//!
//! `prepare`와 `apply`를 나누어, apply 도중 실패한 스택도 핸들이 남아
//! 정리 조정자에게 넘어가도록 합니다.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use vpngw_core::config::HarnessConfig;
use vpngw_core::error::CredentialError;
use vpngw_core::metrics as m;
use vpngw_core::types::{OutputValues, Region, TerraformVars};
use vpngw_terraform::{TempModule, Terraform, TerraformClient, TerraformOptions};

use crate::error::ScenarioError;

/// 자격 증명 환경변수가 설정되어 있고 비어 있지 않은지 확인합니다.
///
/// 어떤 복사나 terraform 호출보다 먼저 실행되어야 합니다.
pub fn check_credential(var: &str) -> Result<(), CredentialError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(()),
        Ok(_) => Err(CredentialError::Empty {
            var: var.to_owned(),
        }),
        Err(_) => Err(CredentialError::Missing {
            var: var.to_owned(),
        }),
    }
}

/// 생성된 (또는 생성 중 실패한) 스택 핸들
///
/// 정리 조정자가 값으로 소비하므로 한 핸들은 최대 한 번만 정리됩니다.
/// 정리를 거치지 않고 drop되면 경고를 남깁니다.
#[derive(Debug)]
pub struct ProvisionedStack {
    role: String,
    workspace: String,
    options: TerraformOptions,
    module: Option<TempModule>,
    apply_attempted: bool,
    released: bool,
}

impl ProvisionedStack {
    /// 작업 복사본과 워크스페이스가 준비된 핸들을 만듭니다.
    pub fn new(
        role: impl Into<String>,
        workspace: impl Into<String>,
        module: TempModule,
        options: TerraformOptions,
    ) -> Self {
        Self {
            role: role.into(),
            workspace: workspace.into(),
            options,
            module: Some(module),
            apply_attempted: false,
            released: false,
        }
    }

    /// `prerequisite` 또는 시나리오 이름
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn dir(&self) -> &Path {
        &self.options.dir
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    pub fn vars(&self) -> &TerraformVars {
        &self.options.vars
    }

    /// apply를 한 번이라도 시도했는지 여부 (실패 포함)
    pub fn apply_attempted(&self) -> bool {
        self.apply_attempted
    }

    /// init + apply 후 출력값을 읽고, `required` 출력이 모두 비어 있지 않은지 확인합니다.
    pub async fn apply<C: TerraformClient>(
        &mut self,
        terraform: &Terraform<C>,
        required: &[&str],
    ) -> Result<OutputValues, ScenarioError> {
        self.apply_attempted = true;
        info!(
            role = %self.role,
            workspace = %self.workspace,
            dir = %self.dir().display(),
            "applying stack"
        );
        terraform.init_and_apply(&self.options).await?;
        let outputs = terraform.require_outputs(&self.options, required).await?;
        Ok(outputs)
    }

    /// 작업 복사본을 디스크에 남기고 핸들을 닫습니다.
    pub(crate) fn preserve(mut self) -> PathBuf {
        self.released = true;
        match self.module.take() {
            Some(module) => module.keep(),
            None => self.options.dir.clone(),
        }
    }

    /// 작업 복사본을 삭제하고 핸들을 닫습니다.
    pub(crate) fn release(mut self) {
        self.released = true;
        self.module.take();
    }
}

impl Drop for ProvisionedStack {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                role = %self.role,
                workspace = %self.workspace,
                dir = %self.options.dir.display(),
                "stack handle dropped without cleanup; resources may be leaked"
            );
        }
    }
}

/// `provision` 결과: 핸들은 apply 성공 여부와 무관하게 항상 반환됩니다.
#[derive(Debug)]
pub struct ProvisionAttempt {
    pub stack: ProvisionedStack,
    pub outputs: Result<OutputValues, ScenarioError>,
}

/// 원격 게이트웨이 사전 리소스 프로비저너
pub struct RemoteGatewayProvisioner<C: TerraformClient> {
    terraform: Terraform<C>,
    resources_dir: PathBuf,
    copy_exclude: Vec<String>,
    credential_env: String,
    upgrade: bool,
}

impl<C: TerraformClient> RemoteGatewayProvisioner<C> {
    pub fn new(terraform: Terraform<C>, config: &HarnessConfig) -> Self {
        Self {
            terraform,
            resources_dir: config.suite.resources_dir.clone(),
            copy_exclude: config.suite.copy_exclude.clone(),
            credential_env: config.suite.credential_env.clone(),
            upgrade: config.terraform.upgrade,
        }
    }


    /// 자격 증명 확인, 템플릿 복사, 워크스페이스 선택까지 수행합니다.
    ///
    /// 입력 변수는 `prefix`, `region`에 `extra_vars`를 더한 것입니다.
    pub async fn prepare(
        &self,
        region: &Region,
        prefix: &str,
        extra_vars: TerraformVars,
    ) -> Result<ProvisionedStack, ScenarioError> {
        check_credential(&self.credential_env)?;

        let module = TempModule::copy_from(&self.resources_dir, prefix, &self.copy_exclude).await?;

        let mut vars = TerraformVars::new();
        vars.insert("prefix".to_owned(), prefix.into());
        vars.insert("region".to_owned(), region.clone().into());
        vars.extend(extra_vars);

        let options = TerraformOptions::new(module.working_dir())
            .with_vars(vars)
            .with_upgrade(self.upgrade);
        self.terraform
            .workspace_select_or_new(&options, prefix)
            .await?;

        info!(
            workspace = prefix,
            %region,
            dir = %options.dir.display(),
            "prerequisite stack prepared"
        );
        Ok(ProvisionedStack::new("prerequisite", prefix, module, options))
    }

    /// `prepare` 후 `apply`까지 수행합니다.
    ///
    /// 준비 단계 실패는 `Err`, apply 실패는 `ProvisionAttempt::outputs`의 `Err`입니다.
    pub async fn provision(
        &self,
        region: &Region,
        prefix: &str,
        extra_vars: TerraformVars,
        required_outputs: &[&str],
    ) -> Result<ProvisionAttempt, ScenarioError> {
        let mut stack = self.prepare(region, prefix, extra_vars).await?;
        let outputs = stack.apply(&self.terraform, required_outputs).await;
        match &outputs {
            Ok(_) => {
                metrics::counter!(m::STACKS_PROVISIONED_TOTAL).increment(1);
            }
            Err(e) => {
                warn!(workspace = prefix, error = %e, "prerequisite apply failed");
            }
        }
        Ok(ProvisionAttempt { stack, outputs })
    }
}
