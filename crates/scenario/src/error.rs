//! 시나리오 에러 타입
//!
//! [`ScenarioError`]는 시나리오 준비, 사전 리소스 프로비저닝, 일관성 검사 중
//! 발생하는 에러를 표현합니다. `From<ScenarioError> for VpngwError` 변환이
//! 구현되어 있어 상위 레이어에서 `?`로 전파할 수 있습니다.

use vpngw_core::error::{CredentialError, RegistryError, VpngwError};
use vpngw_terraform::TerraformError;

/// 시나리오 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// 자격 증명 누락 (치명적, 프로비저닝 전에 발생)
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// 영구 리소스 레지스트리 조회 실패
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// 설정 로드/검증 실패
    #[error(transparent)]
    Harness(#[from] VpngwError),

    /// terraform 실행 실패
    #[error(transparent)]
    Terraform(#[from] TerraformError),

    /// 리전 허용 목록으로 요청을 만족할 수 없음
    #[error("region selection failed: {0}")]
    RegionSelection(String),

    /// 시나리오 옵션이 불완전하거나 일관되지 않음
    #[error("invalid options for scenario '{scenario}': {reason}")]
    InvalidOptions {
        /// 시나리오 이름
        scenario: String,
        /// 사유
        reason: String,
    },

    /// 사전 리소스 스택 실패
    #[error("prerequisite stack '{workspace}' failed: {reason}")]
    Prerequisite {
        /// 워크스페이스 (= 접두어)
        workspace: String,
        /// 사유
        reason: String,
    },

    /// apply 직후 plan이 변경을 제안함
    #[error(
        "scenario '{scenario}' is not idempotent, plan after apply proposes: {}",
        .changes.join("; ")
    )]
    Drift {
        /// 시나리오 이름
        scenario: String,
        /// `address (actions)` 목록
        changes: Vec<String>,
    },

    /// 알 수 없는 시나리오 이름
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    /// 시나리오 태스크 비정상 종료
    #[error("scenario task failed: {0}")]
    Task(String),
}

impl From<ScenarioError> for VpngwError {
    fn from(err: ScenarioError) -> Self {
        match err {
            ScenarioError::Credential(e) => VpngwError::Credential(e),
            ScenarioError::Registry(e) => VpngwError::Registry(e),
            ScenarioError::Harness(e) => e,
            ScenarioError::Terraform(e) => e.into(),
            other => VpngwError::Scenario(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_lists_changes() {
        let err = ScenarioError::Drift {
            scenario: "single-site".to_owned(),
            changes: vec![
                "ibm_is_vpn_gateway.gw (update)".to_owned(),
                "ibm_is_vpc.vpc (delete,create)".to_owned(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("single-site"));
        assert!(msg.contains("ibm_is_vpn_gateway.gw (update); ibm_is_vpc.vpc (delete,create)"));
    }

    #[test]
    fn credential_error_keeps_its_kind_at_top_level() {
        let err: VpngwError = ScenarioError::Credential(CredentialError::Missing {
            var: "TF_VAR_ibmcloud_api_key".to_owned(),
        })
        .into();
        assert!(matches!(err, VpngwError::Credential(_)));
    }

    #[test]
    fn terraform_error_becomes_provisioning() {
        let err: VpngwError = ScenarioError::Terraform(TerraformError::OutputMissing {
            name: "remote_cidr".to_owned(),
        })
        .into();
        assert!(matches!(err, VpngwError::Provisioning(_)));
    }

    #[test]
    fn other_errors_become_scenario() {
        let err: VpngwError = ScenarioError::UnknownScenario("dual-stack".to_owned()).into();
        assert!(matches!(err, VpngwError::Scenario(msg) if msg.contains("dual-stack")));
    }
}
