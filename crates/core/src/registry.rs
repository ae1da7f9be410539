//! 영구 리소스 레지스트리 -- 시나리오 간 공유되는 장기 리소스 식별자
//!
//! 공용 YAML 파일(예: `common-permanent-resources.yaml`)을 프로세스 시작 시
//! 한 번 읽어 [`PermanentResources`]로 보관합니다. 로드 이후에는 읽기 전용이며,
//! 전역 상태가 아니라 각 시나리오에 명시적으로 전달됩니다.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::error::RegistryError;

/// 공유 영구 리소스 레지스트리 (이름 → 값)
#[derive(Debug, Clone, Default)]
pub struct PermanentResources {
    entries: BTreeMap<String, serde_yaml::Value>,
}

impl PermanentResources {
    /// YAML 파일에서 레지스트리를 로드합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RegistryError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RegistryError::ParseFailed {
                    reason: format!("{}: {e}", path.display()),
                }
            }
        })?;
        let registry = Self::parse(&content)?;
        info!(
            path = %path.display(),
            entries = registry.len(),
            "loaded permanent resources"
        );
        Ok(registry)
    }

    /// YAML 문자열을 파싱합니다. 최상위는 매핑이어야 합니다.
    pub fn parse(yaml: &str) -> Result<Self, RegistryError> {
        // 빈 문서는 빈 레지스트리로 취급
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_str(yaml).map_err(|e| RegistryError::ParseFailed {
                reason: e.to_string(),
            })?;
        Ok(Self { entries })
    }

    /// 문자열 값을 조회합니다.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(serde_yaml::Value::as_str)
    }

    /// 반드시 존재해야 하는 문자열 값을 조회합니다.
    pub fn require_str(&self, key: &str) -> Result<&str, RegistryError> {
        match self.entries.get(key) {
            None => Err(RegistryError::MissingKey {
                key: key.to_owned(),
            }),
            Some(value) => value.as_str().ok_or_else(|| RegistryError::NotAString {
                key: key.to_owned(),
            }),
        }
    }

    /// 원본 YAML 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
general_test_resource_group: geretain-test-resources
permanent_vpc_region: us-south
cos_instances:
  - name: shared-cos
    region: us-south
retention_days: 30
"#;

    #[test]
    fn parse_reads_top_level_mapping() {
        let registry = PermanentResources::parse(SAMPLE).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.get_str("general_test_resource_group"),
            Some("geretain-test-resources")
        );
    }

    #[test]
    fn require_str_reports_missing_key() {
        let registry = PermanentResources::parse(SAMPLE).unwrap();
        let err = registry.require_str("nope").unwrap_err();
        assert!(matches!(err, RegistryError::MissingKey { .. }));
    }

    #[test]
    fn require_str_rejects_non_string() {
        let registry = PermanentResources::parse(SAMPLE).unwrap();
        let err = registry.require_str("retention_days").unwrap_err();
        assert!(matches!(err, RegistryError::NotAString { .. }));
        assert!(registry.get("cos_instances").is_some());
    }

    #[test]
    fn empty_document_is_empty_registry() {
        let registry = PermanentResources::parse("   \n").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn non_mapping_document_is_error() {
        let err = PermanentResources::parse("- a\n- b\n").unwrap_err();
        assert!(matches!(err, RegistryError::ParseFailed { .. }));
    }

    #[tokio::test]
    async fn load_missing_file_is_not_found() {
        let err = PermanentResources::load("/nonexistent/permanent.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permanent.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let registry = PermanentResources::load(&path).await.unwrap();
        assert_eq!(registry.get_str("permanent_vpc_region"), Some("us-south"));
        assert_eq!(registry.keys().count(), 4);
    }
}
