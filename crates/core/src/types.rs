//! 도메인 타입 -- 하네스 전역에서 사용되는 공통 타입
//!
//! 리전, Terraform 입력 변수, Terraform 출력값을 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Terraform 입력 변수 (이름 → 값)
///
/// 정렬된 맵을 사용하므로 var-file 직렬화 결과가 항상 동일합니다.
pub type TerraformVars = BTreeMap<String, serde_json::Value>;

/// 클라우드 리전 식별자 (예: `us-south`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    /// 새 리전을 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 리전 이름을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<Region> for serde_json::Value {
    fn from(region: Region) -> Self {
        serde_json::Value::String(region.0)
    }
}

/// 완료된 프로비저닝 실행에서 추출한 출력값
///
/// `terraform output -json`의 `{"name": {"value": ..., "type": ..., "sensitive": ...}}`
/// 형식에서 `value`만 보관합니다. 생성 이후 읽기 전용입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputValues {
    values: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawOutput {
    value: serde_json::Value,
}

impl OutputValues {
    /// `terraform output -json` 결과를 파싱합니다.
    pub fn from_terraform_json(json: &str) -> Result<Self, serde_json::Error> {
        // 출력이 하나도 없는 경우 terraform은 `{}`를 내보냅니다.
        let raw: BTreeMap<String, RawOutput> = serde_json::from_str(json)?;
        let values = raw.into_iter().map(|(k, v)| (k, v.value)).collect();
        Ok(Self { values })
    }

    /// 이름 → 값 쌍에서 직접 생성합니다.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 출력값을 문자열로 반환합니다.
    ///
    /// 문자열 출력은 그대로, 그 외 타입은 JSON 표현으로 변환합니다.
    /// 값이 없거나 비어 있거나 `null`이면 `None`입니다.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.values.get(name)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// 원본 JSON 값을 반환합니다.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    /// 출력 이름 목록
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
