//! 단일 terraform 실행 단위의 입력
//!
//! 작업 디렉토리, 입력 변수, `init -upgrade` 여부, 추가 환경 변수를 묶습니다.
//! 입력 변수는 명령행 `-var` 대신 작업 디렉토리의 JSON var-file로 전달되어
//! 리스트/맵 변수도 손실 없이 넘어갑니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use vpngw_core::types::TerraformVars;

use crate::error::TerraformError;

/// 작업 디렉토리에 기록되는 var-file 이름
pub const VAR_FILE_NAME: &str = "vpngw.tfvars.json";

/// plan 결과 파일 이름
pub const PLAN_FILE_NAME: &str = "vpngw.tfplan";

/// terraform 실행 옵션
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerraformOptions {
    /// 모듈 디렉토리 (명령의 작업 디렉토리)
    pub dir: PathBuf,
    /// 입력 변수
    pub vars: TerraformVars,
    /// `init -upgrade` 사용 여부
    pub upgrade: bool,
    /// terraform 프로세스에 추가로 넘길 환경 변수
    pub env: BTreeMap<String, String>,
}

impl TerraformOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_vars(mut self, vars: TerraformVars) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_var(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn var_file_path(&self) -> PathBuf {
        self.dir.join(VAR_FILE_NAME)
    }

    /// 입력 변수를 var-file로 기록하고 경로를 반환합니다.
    pub async fn write_var_file(&self) -> Result<PathBuf, TerraformError> {
        let path = self.var_file_path();
        let body = serde_json::to_vec_pretty(&self.vars).map_err(|e| TerraformError::WorkingCopy {
            path: path.display().to_string(),
            reason: format!("failed to encode variables: {e}"),
        })?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| TerraformError::WorkingCopy {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(path)
    }

    /// 이전 실행이 남긴 var-file에서 입력 변수를 읽어 옵니다.
    ///
    /// 보존된 작업 복사본을 수동으로 파기할 때 같은 변수로 destroy하기 위해 씁니다.
    /// var-file이 없으면 빈 변수로 시작합니다.
    pub async fn with_saved_vars(mut self) -> Result<Self, TerraformError> {
        let path = self.var_file_path();
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self),
            Err(e) => {
                return Err(TerraformError::WorkingCopy {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };
        self.vars = serde_json::from_slice(&body).map_err(|e| TerraformError::WorkingCopy {
            path: path.display().to_string(),
            reason: format!("failed to decode variables: {e}"),
        })?;
        Ok(self)
    }

    /// 모듈 디렉토리가 존재하는지 확인합니다.
    pub fn ensure_dir(&self) -> Result<&Path, TerraformError> {
        if self.dir.is_dir() {
            Ok(&self.dir)
        } else {
            Err(TerraformError::WorkingCopy {
                path: self.dir.display().to_string(),
                reason: "module directory does not exist".to_owned(),
            })
        }
    }
}
