//! 시나리오 카탈로그와 전체 실행 흐름
//!
//! | 시나리오 | 모듈 디렉토리 | 라벨 | 사전 리소스 |
//! |----------|---------------|------|-------------|
//! | `single-site` | `examples/single-site` | `site1` | 원격 게이트웨이 1개 |
//! | `multiple-connections` | `examples/multiple-connections` | `mconn` | 원격 게이트웨이 2개 |
//! | `vpc-to-vpc` | `examples/vpc-to-vpc` | `vpcs` | 없음 (서로 다른 두 리전) |
//!
//! 실행 흐름: 자격 증명 확인 → 옵션 조립 → (사전 리소스 프로비저닝, 출력값을
//! 입력 변수로 연결) → 일관성 검사 → 사전 리소스 정리. 이미 실패한 시나리오의
//! 정리 실패는 로그로만 남고, 통과한 시나리오의 정리 실패는 시나리오를 실패로
//! 바꿉니다.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use vpngw_core::metrics as m;
use vpngw_core::types::{OutputValues, TerraformVars};
use vpngw_terraform::TerraformClient;

use crate::cleanup::{CleanupReport, ScenarioOutcome};
use crate::error::ScenarioError;
use crate::options::{ScenarioOptions, default_vars};
use crate::provisioner::{ProvisionedStack, check_credential};
use crate::runner::ConsistencyReport;
use crate::suite::SuiteContext;

/// 게이트웨이 시나리오 공통 필수 변수
const GATEWAY_VARS: &[&str] = &[
    "region",
    "prefix",
    "resource_group",
    "remote_cidr",
    "preshared_key",
    "remote_gateway_ip",
];

/// 사전 리소스 출력 → 시나리오 입력 변수
const SINGLE_SITE_OUTPUTS: &[(&str, &str)] = &[
    ("vpn_gateway_public_ip", "remote_gateway_ip"),
    ("remote_cidr", "remote_cidr"),
];

const MULTIPLE_CONNECTIONS_OUTPUTS: &[(&str, &str)] = &[
    ("vpn_gateway_public_ip", "remote_gateway_ip"),
    ("remote_cidr", "remote_cidr"),
    ("vpn_gateway_public_ip_2", "remote_gateway_ip_2"),
    ("remote_cidr", "remote_cidr_2"),
];

/// 시나리오 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    SingleSite,
    MultipleConnections,
    VpcToVpc,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 3] = [
        ScenarioKind::SingleSite,
        ScenarioKind::MultipleConnections,
        ScenarioKind::VpcToVpc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleSite => "single-site",
            Self::MultipleConnections => "multiple-connections",
            Self::VpcToVpc => "vpc-to-vpc",
        }
    }

    /// 접두어 라벨
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleSite => "site1",
            Self::MultipleConnections => "mconn",
            Self::VpcToVpc => "vpcs",
        }
    }

    /// 저장소 루트 기준 모듈 디렉토리
    pub fn terraform_dir(&self) -> &'static Path {
        Path::new(match self {
            Self::SingleSite => "examples/single-site",
            Self::MultipleConnections => "examples/multiple-connections",
            Self::VpcToVpc => "examples/vpc-to-vpc",
        })
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::SingleSite => "site-to-site VPN to one remote gateway",
            Self::MultipleConnections => "two VPN connections to two remote gateways",
            Self::VpcToVpc => "VPN between two VPCs in distinct regions",
        }
    }

    pub fn needs_prerequisite(&self) -> bool {
        !self.output_mappings().is_empty()
    }

    /// 사전 리소스 스택에 추가로 넘길 변수
    pub fn prerequisite_vars(&self) -> TerraformVars {
        let mut vars = TerraformVars::new();
        if *self == Self::MultipleConnections {
            vars.insert("enable_second_gateway".to_owned(), true.into());
        }
        vars
    }

    /// `(사전 리소스 출력, 시나리오 입력 변수)` 쌍
    pub fn output_mappings(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::SingleSite => SINGLE_SITE_OUTPUTS,
            Self::MultipleConnections => MULTIPLE_CONNECTIONS_OUTPUTS,
            Self::VpcToVpc => &[],
        }
    }

    /// 사전 리소스에서 반드시 비어 있지 않아야 하는 출력
    pub fn required_outputs(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.output_mappings().iter().map(|(o, _)| *o).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn required_vars(&self) -> Vec<&'static str> {
        match self {
            Self::SingleSite => GATEWAY_VARS.to_vec(),
            Self::MultipleConnections => {
                let mut vars = GATEWAY_VARS.to_vec();
                vars.extend(["remote_gateway_ip_2", "remote_cidr_2"]);
                vars
            }
            Self::VpcToVpc => vec![
                "region_site_a",
                "region_site_b",
                "preshared_key",
                "resource_group",
                "prefix",
            ],
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ScenarioError::UnknownScenario(s.to_owned()))
    }
}

/// 시나리오 한 번의 최종 결과
#[derive(Debug, Serialize)]
pub struct ScenarioResult {
    pub scenario: ScenarioKind,
    pub prefix: Option<String>,
    pub outcome: ScenarioOutcome,
    pub report: Option<ConsistencyReport>,
    pub error: Option<String>,
    /// 정리 순서대로 (테스트 대상 모듈, 사전 리소스)
    pub cleanup: Vec<CleanupReport>,
    #[serde(with = "crate::runner::duration_secs")]
    pub duration: Duration,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }

    /// 실행 자체가 중단된 시나리오
    pub fn aborted(scenario: ScenarioKind, err: ScenarioError) -> Self {
        Self {
            scenario,
            prefix: None,
            outcome: ScenarioOutcome::Failed,
            report: None,
            error: Some(err.to_string()),
            cleanup: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// 시나리오 입력 변수 (사전 리소스 출력 제외)
fn scenario_vars<C: TerraformClient>(
    kind: ScenarioKind,
    ctx: &SuiteContext<C>,
    prefix: &str,
) -> Result<TerraformVars, ScenarioError> {
    match kind {
        ScenarioKind::VpcToVpc => {
            let (site_a, site_b) = ctx.names().region_pair(&ctx.config().regions())?;
            let mut vars = TerraformVars::new();
            vars.insert("region_site_a".to_owned(), site_a.into());
            vars.insert("region_site_b".to_owned(), site_b.into());
            vars.insert("preshared_key".to_owned(), ctx.names().preshared_key().into());
            vars.insert("resource_group".to_owned(), ctx.resource_group().into());
            vars.insert("prefix".to_owned(), prefix.into());
            Ok(vars)
        }
        _ => default_vars(ctx.config(), ctx.resource_group(), ctx.names(), prefix),
    }
}

/// 사전 리소스 출력값을 입력 변수로 옮깁니다.
fn map_outputs(kind: ScenarioKind, outputs: &OutputValues) -> Result<TerraformVars, ScenarioError> {
    let mut vars = TerraformVars::new();
    for (output, var) in kind.output_mappings() {
        let value = outputs
            .get_str(output)
            .ok_or_else(|| ScenarioError::InvalidOptions {
                scenario: kind.name().to_owned(),
                reason: format!("prerequisite output '{output}' is missing or empty"),
            })?;
        vars.insert((*var).to_owned(), value.into());
    }
    Ok(vars)
}

fn options_from(
    kind: ScenarioKind,
    ctx_resource_group: &str,
    tags: &[String],
    prefix: String,
    vars: TerraformVars,
) -> Result<ScenarioOptions, ScenarioError> {
    ScenarioOptions::builder(kind.name(), kind.terraform_dir())
        .prefix(prefix)
        .resource_group(ctx_resource_group)
        .tags(tags.to_vec())
        .vars(vars)
        .require(&kind.required_vars())
        .build()
}

/// 드라이런: terraform을 호출하지 않고 옵션을 조립하고 검증합니다.
///
/// 사전 리소스 출력은 `<prerequisite:출력이름>` 자리표시자로 채워집니다.
pub fn plan_scenario<C: TerraformClient>(
    kind: ScenarioKind,
    ctx: &SuiteContext<C>,
) -> Result<ScenarioOptions, ScenarioError> {
    let prefix = ctx.names().prefix(kind.label());
    let mut vars = scenario_vars(kind, ctx, &prefix)?;
    for (output, var) in kind.output_mappings() {
        vars.insert((*var).to_owned(), format!("<prerequisite:{output}>").into());
    }
    options_from(kind, ctx.resource_group(), &ctx.config().suite.tags, prefix, vars)
}

/// 시나리오를 끝까지 실행합니다. 패닉 없이 항상 결과를 반환합니다.
pub async fn run_scenario<C: TerraformClient>(
    kind: ScenarioKind,
    ctx: &SuiteContext<C>,
) -> ScenarioResult {
    let started = Instant::now();
    let mut prefix = None;
    let mut cleanup = Vec::new();

    info!(scenario = %kind, "scenario started");
    let result = execute(kind, ctx, &mut prefix, &mut cleanup).await;
    let duration = started.elapsed();

    let (report, error) = match result {
        // 통과한 시나리오라도 정리에 실패하면 리소스가 남으므로 실패로 기록
        Ok(report) => match cleanup.iter().find_map(CleanupReport::failure_reason) {
            Some(reason) => {
                error!(scenario = %kind, error = %reason, "scenario passed but cleanup failed");
                (Some(report), Some(format!("cleanup failed: {reason}")))
            }
            None => {
                info!(scenario = %kind, duration_secs = duration.as_secs(), "scenario passed");
                (Some(report), None)
            }
        },
        Err(e) => {
            error!(scenario = %kind, error = %e, "scenario failed");
            (None, Some(e.to_string()))
        }
    };
    let outcome = if error.is_none() {
        ScenarioOutcome::Passed
    } else {
        ScenarioOutcome::Failed
    };

    metrics::counter!(
        m::SCENARIOS_TOTAL,
        m::LABEL_SCENARIO => kind.name(),
        m::LABEL_RESULT => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!(m::SCENARIO_DURATION_SECONDS, m::LABEL_SCENARIO => kind.name())
        .record(duration.as_secs_f64());

    ScenarioResult {
        scenario: kind,
        prefix,
        outcome,
        report,
        error,
        cleanup,
        duration,
    }
}

async fn execute<C: TerraformClient>(
    kind: ScenarioKind,
    ctx: &SuiteContext<C>,
    prefix_out: &mut Option<String>,
    cleanup: &mut Vec<CleanupReport>,
) -> Result<ConsistencyReport, ScenarioError> {
    check_credential(&ctx.config().suite.credential_env)?;

    let prefix = ctx.names().prefix(kind.label());
    *prefix_out = Some(prefix.clone());
    let mut vars = scenario_vars(kind, ctx, &prefix)?;

    let mut prerequisite: Option<ProvisionedStack> = None;
    if kind.needs_prerequisite() {
        // 사전 게이트웨이 리전은 시나리오 리전과 별도로 뽑음
        let region = ctx.names().region(&ctx.config().regions())?;
        let prereq_prefix = ctx.names().prerequisite_prefix();
        let attempt = ctx
            .provisioner()
            .provision(
                &region,
                &prereq_prefix,
                kind.prerequisite_vars(),
                &kind.required_outputs(),
            )
            .await?;

        match attempt.outputs.and_then(|outputs| map_outputs(kind, &outputs)) {
            Ok(mapped) => {
                vars.extend(mapped);
                prerequisite = Some(attempt.stack);
            }
            Err(e) => {
                cleanup.push(ctx.cleanup().finish(attempt.stack, ScenarioOutcome::Failed).await);
                return Err(ScenarioError::Prerequisite {
                    workspace: prereq_prefix,
                    reason: e.to_string(),
                });
            }
        }
    }

    let tags = &ctx.config().suite.tags;
    let report = match options_from(kind, ctx.resource_group(), tags, prefix, vars) {
        Ok(options) => {
            let outcome = ctx.runner().run(&options).await;
            cleanup.extend(outcome.cleanup);
            outcome.report
        }
        Err(e) => Err(e),
    };

    if let Some(stack) = prerequisite {
        let outcome = ScenarioOutcome::from_result(&report);
        cleanup.push(ctx.cleanup().finish(stack, outcome).await);
    }
    report
}
