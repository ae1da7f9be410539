//! 에러 타입 -- 계층별 에러 정의

/// 하네스 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VpngwError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 영구 리소스 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 클라우드 자격 증명 에러
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// 프로비저닝 도구(terraform) 에러
    #[error("provisioning error: {0}")]
    Provisioning(String),

    /// 시나리오 실행 에러
    #[error("scenario error: {0}")]
    Scenario(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 영구 리소스 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 레지스트리 파일을 찾을 수 없음
    #[error("permanent resource file not found: {path}")]
    FileNotFound { path: String },

    /// YAML 파싱 실패
    #[error("failed to parse permanent resources: {reason}")]
    ParseFailed { reason: String },

    /// 필수 키 누락
    #[error("permanent resource '{key}' is missing")]
    MissingKey { key: String },

    /// 키는 있지만 문자열이 아님
    #[error("permanent resource '{key}' is not a string")]
    NotAString { key: String },
}

/// 클라우드 자격 증명 에러
///
/// 어떤 프로비저닝도 시작하기 전에 발생하며, 항상 치명적입니다.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// 환경변수가 설정되지 않음
    #[error("{var} environment variable not set")]
    Missing { var: String },

    /// 환경변수가 비어 있음
    #[error("{var} environment variable is empty")]
    Empty { var: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_missing_names_variable() {
        let err = CredentialError::Missing {
            var: "TF_VAR_ibmcloud_api_key".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "TF_VAR_ibmcloud_api_key environment variable not set"
        );
    }

    #[test]
    fn credential_error_converts_to_top_level() {
        let err: VpngwError = CredentialError::Empty {
            var: "X".to_owned(),
        }
        .into();
        assert!(matches!(err, VpngwError::Credential(CredentialError::Empty { .. })));
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn registry_missing_key_display() {
        let err = RegistryError::MissingKey {
            key: "resource_group".to_owned(),
        };
        assert!(err.to_string().contains("resource_group"));
    }

    #[test]
    fn config_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "suite.regions".to_owned(),
            reason: "need at least 2 regions".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("suite.regions"));
        assert!(msg.contains("at least 2"));
    }
}
