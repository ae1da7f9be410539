//! 스위트 컨텍스트와 병렬 실행
//!
//! [`SuiteContext`]는 설정, terraform 핸들, 이름 생성기를 한 번 로드하여 모든
//! 시나리오에 명시적으로 전달합니다. 영구 리소스 레지스트리는 리소스 그룹을
//! 결정하는 데만 쓰입니다. 전역 상태는 없습니다.
//! [`run_suite`]는 시나리오마다 별도 tokio 태스크를 띄우고 결과를 모읍니다.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info};

use vpngw_core::config::HarnessConfig;
use vpngw_core::error::ConfigError;
use vpngw_core::registry::PermanentResources;
use vpngw_terraform::{RetryPolicy, Terraform, TerraformCli, TerraformClient};

use crate::cleanup::{CleanupCoordinator, PreservePolicy};
use crate::error::ScenarioError;
use crate::naming::NameGenerator;
use crate::provisioner::RemoteGatewayProvisioner;
use crate::runner::ConsistencyRunner;
use crate::scenarios::{ScenarioKind, ScenarioResult, run_scenario};

/// 모든 시나리오가 공유하는 읽기 전용 컨텍스트
pub struct SuiteContext<C: TerraformClient> {
    config: HarnessConfig,
    resource_group: String,
    terraform: Terraform<C>,
    names: NameGenerator,
    preserve: PreservePolicy,
}

impl SuiteContext<TerraformCli> {
    /// 설정 파일과 영구 리소스 레지스트리를 로드하여 실제 terraform을 쓰는
    /// 컨텍스트를 만듭니다. 레지스트리 로드 실패는 치명적입니다.
    pub async fn load(config_path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let config = HarnessConfig::load(config_path).await?;
        let registry = PermanentResources::load(&config.permanent.resources_path).await?;
        let retry = retry_policy(&config)?;
        let client = Arc::new(TerraformCli::from_config(&config.terraform));
        let preserve = PreservePolicy::from_env(&config.suite.preserve_on_failure_env);
        Self::new(
            config,
            &registry,
            Terraform::new(client, retry),
            NameGenerator::new(),
            preserve,
        )
    }
}

/// 설정의 재시도 항목으로 정책을 만듭니다.
pub fn retry_policy(config: &HarnessConfig) -> Result<RetryPolicy, ScenarioError> {
    RetryPolicy::from_config(&config.terraform).map_err(|(pattern, e)| {
        ScenarioError::Harness(
            ConfigError::InvalidValue {
                field: "terraform.extra_retryable_errors".to_owned(),
                reason: format!("'{pattern}': {e}"),
            }
            .into(),
        )
    })
}

impl<C: TerraformClient> SuiteContext<C> {
    /// 구성 요소로 컨텍스트를 만들고 리소스 그룹을 결정합니다.
    pub fn new(
        config: HarnessConfig,
        registry: &PermanentResources,
        terraform: Terraform<C>,
        names: NameGenerator,
        preserve: PreservePolicy,
    ) -> Result<Self, ScenarioError> {
        let resource_group = config.resolve_resource_group(registry)?;
        Ok(Self {
            config,
            resource_group,
            terraform,
            names,
            preserve,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn names(&self) -> &NameGenerator {
        &self.names
    }

    pub fn provisioner(&self) -> RemoteGatewayProvisioner<C> {
        RemoteGatewayProvisioner::new(self.terraform.clone(), &self.config)
    }

    pub fn cleanup(&self) -> CleanupCoordinator<C> {
        CleanupCoordinator::new(self.terraform.clone(), self.preserve.clone())
    }

    pub fn runner(&self) -> ConsistencyRunner<C> {
        ConsistencyRunner::new(self.terraform.clone(), self.cleanup(), &self.config)
    }
}

/// 스위트 실행 결과
#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub results: Vec<ScenarioResult>,
    pub passed: usize,
    pub failed: usize,
    #[serde(with = "crate::runner::duration_secs")]
    pub duration: Duration,
}

impl SuiteReport {
    pub fn new(results: Vec<ScenarioResult>, duration: Duration) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        let failed = results.len() - passed;
        Self {
            results,
            passed,
            failed,
            duration,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// 시나리오를 병렬로 실행합니다. 결과는 `kinds` 순서를 따릅니다.
pub async fn run_suite<C: TerraformClient>(
    ctx: Arc<SuiteContext<C>>,
    kinds: &[ScenarioKind],
) -> SuiteReport {
    let started = Instant::now();
    info!(scenarios = kinds.len(), "suite started");

    let mut tasks = JoinSet::new();
    for (index, kind) in kinds.iter().copied().enumerate() {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move { (index, run_scenario(kind, &ctx).await) });
    }

    let mut slots: Vec<Option<ScenarioResult>> = kinds.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => error!(error = %e, "scenario task aborted"),
        }
    }

    let results = slots
        .into_iter()
        .zip(kinds)
        .map(|(slot, kind)| {
            slot.unwrap_or_else(|| {
                let err = ScenarioError::Task("task panicked or was cancelled".to_owned());
                ScenarioResult::aborted(*kind, err)
            })
        })
        .collect();

    let report = SuiteReport::new(results, started.elapsed());
    info!(
        passed = report.passed,
        failed = report.failed,
        duration_secs = report.duration.as_secs(),
        "suite finished"
    );
    report
}
