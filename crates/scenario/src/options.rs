//! 시나리오 옵션 빌더
//!
//! [`ScenarioOptions`]는 일관성 검사 한 번에 필요한 모든 입력을 담습니다.
//! 빌더로 조립하고 검증한 뒤에는 변경하지 않고 러너에 넘깁니다.

use std::path::PathBuf;

use serde::Serialize;

use vpngw_core::config::HarnessConfig;
use vpngw_core::types::TerraformVars;
use vpngw_terraform::ChangeFilter;

use crate::error::ScenarioError;
use crate::naming::NameGenerator;

/// 시나리오 한 번의 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOptions {
    /// 시나리오 이름
    pub scenario: String,
    /// 저장소 루트 기준 모듈 디렉토리
    pub terraform_dir: PathBuf,
    /// 리소스 이름 접두어 (= 워크스페이스 이름)
    pub prefix: String,
    /// 리소스 그룹
    pub resource_group: String,
    /// 태그
    pub tags: Vec<String>,
    /// 입력 변수
    pub vars: TerraformVars,
    /// 반드시 있어야 하는 입력 변수
    pub required_vars: Vec<String>,
    /// 재-plan에서 허용할 변경
    pub changes: ChangeFilter,
}

impl ScenarioOptions {
    pub fn builder(
        scenario: impl Into<String>,
        terraform_dir: impl Into<PathBuf>,
    ) -> ScenarioOptionsBuilder {
        ScenarioOptionsBuilder::new(scenario, terraform_dir)
    }

    /// 옵션이 완전하고 일관적인지 검사합니다.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |reason: String| ScenarioError::InvalidOptions {
            scenario: self.scenario.clone(),
            reason,
        };

        if self.terraform_dir.as_os_str().is_empty() || self.terraform_dir.is_absolute() {
            return Err(invalid(format!(
                "terraform_dir '{}' must be a non-empty relative path",
                self.terraform_dir.display()
            )));
        }
        if !is_valid_prefix(&self.prefix) {
            return Err(invalid(format!(
                "prefix '{}' must start with a lowercase letter and contain only [a-z0-9-]",
                self.prefix
            )));
        }
        if self.resource_group.trim().is_empty() {
            return Err(invalid("resource_group is empty".to_owned()));
        }
        for name in &self.required_vars {
            match self.vars.get(name) {
                None | Some(serde_json::Value::Null) => {
                    return Err(invalid(format!("required variable '{name}' is missing")));
                }
                Some(serde_json::Value::String(s)) if s.is_empty() => {
                    return Err(invalid(format!("required variable '{name}' is empty")));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// 문자열 입력 변수 조회
    pub fn var_str(&self, name: &str) -> Option<&str> {
        self.vars.get(name).and_then(serde_json::Value::as_str)
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// [`ScenarioOptions`] 빌더
#[derive(Debug, Clone)]
pub struct ScenarioOptionsBuilder {
    scenario: String,
    terraform_dir: PathBuf,
    prefix: Option<String>,
    resource_group: String,
    tags: Vec<String>,
    vars: TerraformVars,
    required_vars: Vec<String>,
    changes: ChangeFilter,
}

impl ScenarioOptionsBuilder {
    pub fn new(scenario: impl Into<String>, terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario: scenario.into(),
            terraform_dir: terraform_dir.into(),
            prefix: None,
            resource_group: String::new(),
            tags: Vec::new(),
            vars: TerraformVars::new(),
            required_vars: Vec::new(),
            changes: ChangeFilter::default(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn resource_group(mut self, resource_group: impl Into<String>) -> Self {
        self.resource_group = resource_group.into();
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// 여러 변수를 한 번에 추가합니다. 같은 이름은 덮어씁니다.
    pub fn vars(mut self, vars: TerraformVars) -> Self {
        self.vars.extend(vars);
        self
    }

    pub fn require(mut self, names: &[&str]) -> Self {
        self.required_vars
            .extend(names.iter().map(|n| (*n).to_owned()));
        self
    }

    pub fn ignore_adds(mut self, addresses: &[&str]) -> Self {
        self.changes
            .ignore_adds
            .extend(addresses.iter().map(|a| (*a).to_owned()));
        self
    }

    pub fn ignore_updates(mut self, addresses: &[&str]) -> Self {
        self.changes
            .ignore_updates
            .extend(addresses.iter().map(|a| (*a).to_owned()));
        self
    }

    pub fn ignore_destroys(mut self, addresses: &[&str]) -> Self {
        self.changes
            .ignore_destroys
            .extend(addresses.iter().map(|a| (*a).to_owned()));
        self
    }

    /// 접두어가 없으면 `names`에서 `label`로 발급받아 조립하고 검증합니다.
    pub fn build_with(
        self,
        names: &NameGenerator,
        label: &str,
    ) -> Result<ScenarioOptions, ScenarioError> {
        let prefix = match &self.prefix {
            Some(p) => p.clone(),
            None => names.prefix(label),
        };
        self.prefix(prefix).build()
    }

    /// 조립하고 검증합니다. 접두어가 반드시 지정되어 있어야 합니다.
    pub fn build(self) -> Result<ScenarioOptions, ScenarioError> {
        let prefix = self.prefix.ok_or_else(|| ScenarioError::InvalidOptions {
            scenario: self.scenario.clone(),
            reason: "prefix not set".to_owned(),
        })?;
        let options = ScenarioOptions {
            scenario: self.scenario,
            terraform_dir: self.terraform_dir,
            prefix,
            resource_group: self.resource_group,
            tags: self.tags,
            vars: self.vars,
            required_vars: self.required_vars,
            changes: self.changes,
        };
        options.validate()?;
        Ok(options)
    }
}

/// 게이트웨이 시나리오의 표준 입력 변수를 조립합니다.
///
/// `region`(허용 목록에서 무작위), `prefix`, `resource_group`, `tags`,
/// `remote_cidr`, `preshared_key`를 채웁니다.
pub fn default_vars(
    config: &HarnessConfig,
    resource_group: &str,
    names: &NameGenerator,
    prefix: &str,
) -> Result<TerraformVars, ScenarioError> {
    let region = names.region(&config.regions())?;
    let mut vars = TerraformVars::new();
    vars.insert("region".to_owned(), region.into());
    vars.insert("prefix".to_owned(), prefix.into());
    vars.insert("resource_group".to_owned(), resource_group.into());
    vars.insert("tags".to_owned(), config.suite.tags.clone().into());
    vars.insert(
        "remote_cidr".to_owned(),
        config.suite.remote_cidr.as_str().into(),
    );
    vars.insert("preshared_key".to_owned(), names.preshared_key().into());
    Ok(vars)
}
