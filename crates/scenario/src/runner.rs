//! 일관성 검사 러너 -- apply, 재-plan으로 드리프트 확인, destroy
//!
//! 테스트 대상 모듈 저장소를 임시 디렉토리로 복사하고, 시나리오 디렉토리에서
//! 접두어 이름의 워크스페이스를 선택한 뒤 검사를 수행합니다. 검사가 끝나면
//! 결과와 무관하게 [`CleanupCoordinator`]가 스택을 정리(또는 보존)합니다.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use vpngw_core::config::HarnessConfig;
use vpngw_core::types::OutputValues;
use vpngw_terraform::{TempModule, Terraform, TerraformClient, TerraformOptions};

use crate::cleanup::{CleanupCoordinator, CleanupReport, ScenarioOutcome};
use crate::error::ScenarioError;
use crate::options::ScenarioOptions;
use crate::provisioner::ProvisionedStack;

/// 성공한 일관성 검사의 산출물
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub scenario: String,
    pub prefix: String,
    /// apply 후 출력값
    pub outputs: OutputValues,
    /// 재-plan에서 확인한 리소스 수
    pub checked_resources: usize,
    /// 무시 목록에 걸려 허용된 변경
    pub ignored_changes: Vec<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

pub(crate) mod duration_secs {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// 검사 결과와 정리 결과
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Result<ConsistencyReport, ScenarioError>,
    /// 작업 복사본조차 만들지 못했으면 `None`
    pub cleanup: Option<CleanupReport>,
}

/// 일관성 검사 러너
pub struct ConsistencyRunner<C: TerraformClient> {
    terraform: Terraform<C>,
    cleanup: CleanupCoordinator<C>,
    repo_root: PathBuf,
    copy_exclude: Vec<String>,
    upgrade: bool,
}

impl<C: TerraformClient> ConsistencyRunner<C> {
    pub fn new(
        terraform: Terraform<C>,
        cleanup: CleanupCoordinator<C>,
        config: &HarnessConfig,
    ) -> Self {
        Self {
            terraform,
            cleanup,
            repo_root: config.suite.repo_root.clone(),
            copy_exclude: config.suite.copy_exclude.clone(),
            upgrade: config.terraform.upgrade,
        }
    }


    /// 검사를 수행하고 스택을 정리합니다.
    pub async fn run(&self, options: &ScenarioOptions) -> RunOutcome {
        if let Err(e) = options.validate() {
            return RunOutcome {
                report: Err(e),
                cleanup: None,
            };
        }

        let stack = match self.prepare(options).await {
            Ok(stack) => stack,
            Err(e) => {
                return RunOutcome {
                    report: Err(e),
                    cleanup: None,
                };
            }
        };

        let report = self.check(&stack, options).await;
        if let Err(e) = &report {
            warn!(
                scenario = %options.scenario,
                prefix = %options.prefix,
                error = %e,
                "consistency check failed"
            );
        }
        let cleanup = self
            .cleanup
            .finish(stack, ScenarioOutcome::from_result(&report))
            .await;
        RunOutcome {
            report,
            cleanup: Some(cleanup),
        }
    }

    async fn prepare(&self, options: &ScenarioOptions) -> Result<ProvisionedStack, ScenarioError> {
        let module = TempModule::copy_from(&self.repo_root, &options.prefix, &self.copy_exclude)
            .await?
            .with_working_dir(&options.terraform_dir)?;
        let tf_options = TerraformOptions::new(module.working_dir())
            .with_vars(options.vars.clone())
            .with_upgrade(self.upgrade);
        self.terraform
            .workspace_select_or_new(&tf_options, &options.prefix)
            .await?;
        Ok(ProvisionedStack::new(
            options.scenario.clone(),
            options.prefix.clone(),
            module,
            tf_options,
        ))
    }

    async fn check(
        &self,
        stack: &ProvisionedStack,
        options: &ScenarioOptions,
    ) -> Result<ConsistencyReport, ScenarioError> {
        let started = Instant::now();
        info!(
            scenario = %options.scenario,
            prefix = %options.prefix,
            dir = %stack.dir().display(),
            "consistency check started"
        );

        self.terraform.init_and_apply(stack.options()).await?;
        let outputs = self.terraform.output_all(stack.options()).await?;

        let plan = self.terraform.plan(stack.options()).await?;
        let (unexpected, ignored) = options.changes.partition(&plan);
        if !unexpected.is_empty() {
            return Err(ScenarioError::Drift {
                scenario: options.scenario.clone(),
                changes: unexpected
                    .iter()
                    .map(|c| format!("{} ({})", c.address, c.action_label()))
                    .collect(),
            });
        }

        let report = ConsistencyReport {
            scenario: options.scenario.clone(),
            prefix: options.prefix.clone(),
            outputs,
            checked_resources: plan.changes.len(),
            ignored_changes: ignored.iter().map(|c| c.address.clone()).collect(),
            duration: started.elapsed(),
        };
        info!(
            scenario = %report.scenario,
            resources = report.checked_resources,
            ignored = report.ignored_changes.len(),
            "consistency check passed"
        );
        Ok(report)
    }
}
