//! 설정 관리 -- vpngw.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 하네스 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VPNGW_SUITE_RESOURCE_GROUP=my-rg` 형식)
//! 3. 설정 파일 (`vpngw.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vpngw_core::error::VpngwError> {
//! use vpngw_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("vpngw.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, RegistryError, VpngwError};
use crate::registry::PermanentResources;
use crate::types::Region;

/// 하네스 통합 설정
///
/// `vpngw.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Terraform 실행 설정
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// 시나리오 스위트 설정
    #[serde(default)]
    pub suite: SuiteConfig,
    /// 영구 리소스 레지스트리 설정
    #[serde(default)]
    pub permanent: PermanentConfig,
}

/// 재시도 최대 횟수 상한
const MAX_RETRIES_LIMIT: u32 = 20;
/// 재시도 간격 상한 (초)
const MAX_TIME_BETWEEN_RETRIES_SECS: u64 = 600;

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VpngwError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다.
    ///
    /// 환경변수 오버라이드와 검증은 하지 않습니다. 오버라이드가 잘못된 파일
    /// 값을 고칠 수 있도록 검증은 [`HarnessConfig::load`]에서 마지막에 합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VpngwError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VpngwError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VpngwError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VpngwError> {
        toml::from_str(toml_str).map_err(|e| {
            VpngwError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VPNGW_{SECTION}_{FIELD}`
    /// 예: `VPNGW_TERRAFORM_MAX_RETRIES=5`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VPNGW_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VPNGW_GENERAL_LOG_FORMAT");

        // Terraform
        override_string(&mut self.terraform.binary, "VPNGW_TERRAFORM_BINARY");
        override_bool(&mut self.terraform.upgrade, "VPNGW_TERRAFORM_UPGRADE");
        override_u32(&mut self.terraform.max_retries, "VPNGW_TERRAFORM_MAX_RETRIES");
        override_u64(
            &mut self.terraform.time_between_retries_secs,
            "VPNGW_TERRAFORM_TIME_BETWEEN_RETRIES_SECS",
        );

        // Suite
        override_path(&mut self.suite.repo_root, "VPNGW_SUITE_REPO_ROOT");
        override_path(&mut self.suite.resources_dir, "VPNGW_SUITE_RESOURCES_DIR");
        override_string(
            &mut self.suite.resource_group,
            "VPNGW_SUITE_RESOURCE_GROUP",
        );
        override_csv(&mut self.suite.regions, "VPNGW_SUITE_REGIONS");
        override_string(&mut self.suite.remote_cidr, "VPNGW_SUITE_REMOTE_CIDR");
        override_csv(&mut self.suite.tags, "VPNGW_SUITE_TAGS");

        // Permanent resources
        override_path(
            &mut self.permanent.resources_path,
            "VPNGW_PERMANENT_RESOURCES_PATH",
        );
        if let Ok(key) = std::env::var("VPNGW_PERMANENT_RESOURCE_GROUP_KEY") {
            self.permanent.resource_group_key = (!key.is_empty()).then_some(key);
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), VpngwError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.terraform.binary.trim().is_empty() {
            return Err(invalid("terraform.binary", "must not be empty".to_owned()));
        }

        if self.terraform.max_retries > MAX_RETRIES_LIMIT {
            return Err(invalid(
                "terraform.max_retries",
                format!("must be 0-{MAX_RETRIES_LIMIT}"),
            ));
        }

        if self.terraform.time_between_retries_secs > MAX_TIME_BETWEEN_RETRIES_SECS {
            return Err(invalid(
                "terraform.time_between_retries_secs",
                format!("must be 0-{MAX_TIME_BETWEEN_RETRIES_SECS}"),
            ));
        }

        // 2-리전 시나리오는 서로 다른 리전 두 개가 필요합니다.
        let distinct: HashSet<&str> = self.suite.regions.iter().map(String::as_str).collect();
        if distinct.len() < 2 {
            return Err(invalid(
                "suite.regions",
                "must contain at least 2 distinct regions".to_owned(),
            ));
        }
        if self.suite.regions.iter().any(|r| r.trim().is_empty()) {
            return Err(invalid(
                "suite.regions",
                "region names must not be empty".to_owned(),
            ));
        }

        validate_ipv4_cidr(&self.suite.remote_cidr)?;

        if self.suite.credential_env.trim().is_empty() {
            return Err(invalid(
                "suite.credential_env",
                "must not be empty".to_owned(),
            ));
        }

        if self.suite.preserve_on_failure_env.trim().is_empty() {
            return Err(invalid(
                "suite.preserve_on_failure_env",
                "must not be empty".to_owned(),
            ));
        }

        if self.suite.resource_group.trim().is_empty()
            && self.permanent.resource_group_key.is_none()
        {
            return Err(invalid(
                "suite.resource_group",
                "must not be empty unless permanent.resource_group_key is set".to_owned(),
            ));
        }

        Ok(())
    }

    /// 리전 허용 목록을 반환합니다.
    pub fn regions(&self) -> Vec<Region> {
        self.suite.regions.iter().map(|r| Region::new(r.as_str())).collect()
    }

    /// 사용할 리소스 그룹 이름을 결정합니다.
    ///
    /// `permanent.resource_group_key`가 설정되어 있으면 레지스트리에서 조회하고,
    /// 아니면 `suite.resource_group`을 사용합니다.
    pub fn resolve_resource_group(
        &self,
        registry: &PermanentResources,
    ) -> Result<String, RegistryError> {
        match &self.permanent.resource_group_key {
            Some(key) => registry.require_str(key).map(str::to_owned),
            None => Ok(self.suite.resource_group.clone()),
        }
    }
}

fn invalid(field: &str, reason: String) -> VpngwError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn validate_ipv4_cidr(cidr: &str) -> Result<(), VpngwError> {
    let bad = || invalid("suite.remote_cidr", format!("'{cidr}' is not an IPv4 CIDR"));
    let (addr, len) = cidr.split_once('/').ok_or_else(bad)?;
    addr.parse::<Ipv4Addr>().map_err(|_| bad())?;
    let len: u8 = len.parse().map_err(|_| bad())?;
    if len > 32 {
        return Err(bad());
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Terraform 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    /// terraform 실행 파일 경로
    pub binary: String,
    /// `init -upgrade` 사용 여부
    pub upgrade: bool,
    /// 알려진 일시적 에러에 대한 재시도 최대 횟수
    pub max_retries: u32,
    /// 재시도 간격 (초)
    pub time_between_retries_secs: u64,
    /// 기본 허용 목록에 추가할 재시도 가능 에러 (정규식 → 설명)
    pub extra_retryable_errors: BTreeMap<String, String>,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_owned(),
            upgrade: true,
            max_retries: 3,
            time_between_retries_secs: 5,
            extra_retryable_errors: BTreeMap::new(),
        }
    }
}

/// 시나리오 스위트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// 테스트 대상 모듈 저장소 루트 (시나리오 디렉토리는 이 경로 기준)
    pub repo_root: PathBuf,
    /// 원격 게이트웨이 사전 리소스 템플릿 디렉토리
    pub resources_dir: PathBuf,
    /// 기존 리소스 그룹 이름
    pub resource_group: String,
    /// 리전 허용 목록
    pub regions: Vec<String>,
    /// 원격 네트워크 대역
    pub remote_cidr: String,
    /// 모든 리소스에 붙일 태그
    pub tags: Vec<String>,
    /// 클라우드 자격 증명 환경변수 이름
    pub credential_env: String,
    /// 실패 시 리소스 보존 플래그 환경변수 이름
    pub preserve_on_failure_env: String,
    /// 작업 복사본 생성 시 제외할 파일/디렉토리 이름
    pub copy_exclude: Vec<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from(".."),
            resources_dir: PathBuf::from("resources"),
            resource_group: "geretain-test-resources".to_owned(),
            regions: DEFAULT_REGIONS.iter().map(|r| (*r).to_owned()).collect(),
            remote_cidr: "10.100.10.0/24".to_owned(),
            tags: Vec::new(),
            credential_env: "TF_VAR_ibmcloud_api_key".to_owned(),
            preserve_on_failure_env: "DO_NOT_DESTROY_ON_FAILURE".to_owned(),
            copy_exclude: vec![".git".to_owned(), "target".to_owned()],
        }
    }
}

/// 기본 리전 허용 목록
pub const DEFAULT_REGIONS: [&str; 6] = [
    "au-syd", "us-south", "us-east", "eu-de", "eu-gb", "jp-tok",
];

/// 영구 리소스 레지스트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermanentConfig {
    /// 영구 리소스 YAML 파일 경로
    pub resources_path: PathBuf,
    /// 리소스 그룹 이름을 조회할 레지스트리 키 (없으면 `suite.resource_group` 사용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group_key: Option<String>,
}

impl Default for PermanentConfig {
    fn default() -> Self {
        Self {
            resources_path: PathBuf::from(
                "../common-dev-assets/common-go-assets/common-permanent-resources.yaml",
            ),
            resource_group_key: None,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_path(target: &mut PathBuf, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = PathBuf::from(val);
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = HarnessConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.terraform.binary, "terraform");
        assert_eq!(config.terraform.max_retries, 3);
        assert_eq!(config.suite.regions.len(), 6);
        assert_eq!(config.suite.remote_cidr, "10.100.10.0/24");
        assert_eq!(config.suite.credential_env, "TF_VAR_ibmcloud_api_key");
        assert_eq!(
            config.suite.preserve_on_failure_env,
            "DO_NOT_DESTROY_ON_FAILURE"
        );
    }

    #[test]
    fn default_config_passes_validation() {
        HarnessConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = HarnessConfig::parse("").unwrap();
        assert_eq!(config.suite.resource_group, "geretain-test-resources");
        assert_eq!(config.regions()[0].as_str(), "au-syd");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[terraform]
max_retries = 5

[suite]
regions = ["us-south", "eu-de"]
"#;
        let config = HarnessConfig::parse(toml).unwrap();
        assert_eq!(config.terraform.max_retries, 5);
        // time_between_retries_secs는 기본값 유지
        assert_eq!(config.terraform.time_between_retries_secs, 5);
        assert_eq!(config.suite.regions, vec!["us-south", "eu-de"]);
        config.validate().unwrap();
    }

    #[test]
    fn extra_retryable_errors_parse_as_table() {
        let toml = r#"
[terraform.extra_retryable_errors]
".*rate limit exceeded.*" = "API rate limiting"
"#;
        let config = HarnessConfig::parse(toml).unwrap();
        assert_eq!(
            config
                .terraform
                .extra_retryable_errors
                .get(".*rate limit exceeded.*")
                .map(String::as_str),
            Some("API rate limiting")
        );
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = HarnessConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            VpngwError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = HarnessConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_single_region() {
        let mut config = HarnessConfig::default();
        config.suite.regions = vec!["us-south".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("suite.regions"));
    }

    #[test]
    fn validate_rejects_duplicate_only_regions() {
        let mut config = HarnessConfig::default();
        config.suite.regions = vec!["us-south".to_owned(), "us-south".to_owned()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_cidr() {
        for cidr in ["10.100.10.0", "10.100.10.0/33", "banana/24", "10.0.0.0/x"] {
            let mut config = HarnessConfig::default();
            config.suite.remote_cidr = cidr.to_owned();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("remote_cidr"), "cidr {cidr}");
        }
    }

    #[test]
    fn validate_rejects_excessive_retries() {
        let mut config = HarnessConfig::default();
        config.terraform.max_retries = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn validate_rejects_empty_credential_env() {
        let mut config = HarnessConfig::default();
        config.suite.credential_env = " ".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_resource_group_prefers_registry_key() {
        let mut config = HarnessConfig::default();
        let registry =
            PermanentResources::parse("general_test_resource_group: shared-rg\n").unwrap();

        assert_eq!(
            config.resolve_resource_group(&registry).unwrap(),
            "geretain-test-resources"
        );

        config.permanent.resource_group_key = Some("general_test_resource_group".to_owned());
        assert_eq!(config.resolve_resource_group(&registry).unwrap(), "shared-rg");

        config.permanent.resource_group_key = Some("missing".to_owned());
        assert!(config.resolve_resource_group(&registry).is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_apply_to_sections() {
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe {
            std::env::set_var("VPNGW_TERRAFORM_MAX_RETRIES", "7");
            std::env::set_var("VPNGW_SUITE_REGIONS", "us-south, eu-gb ,");
            std::env::set_var("VPNGW_PERMANENT_RESOURCE_GROUP_KEY", "rg_key");
        }
        let mut config = HarnessConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("VPNGW_TERRAFORM_MAX_RETRIES");
            std::env::remove_var("VPNGW_SUITE_REGIONS");
            std::env::remove_var("VPNGW_PERMANENT_RESOURCE_GROUP_KEY");
        }
        assert_eq!(config.terraform.max_retries, 7);
        assert_eq!(config.suite.regions, vec!["us-south", "eu-gb"]);
        assert_eq!(config.permanent.resource_group_key.as_deref(), Some("rg_key"));
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_VPNGW_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_VPNGW_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_VPNGW_BOOL_BAD") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_VPNGW_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = HarnessConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = HarnessConfig::parse(&toml_str).unwrap();
        assert_eq!(config.suite.regions, parsed.suite.regions);
        assert_eq!(config.terraform.binary, parsed.terraform.binary);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = HarnessConfig::from_file("/nonexistent/path/vpngw.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VpngwError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
