//! Terraform 실행 에러 타입
//!
//! [`TerraformError`]는 terraform 프로세스 실행과 결과 해석 중 발생하는 모든
//! 에러를 표현합니다. `From<TerraformError> for VpngwError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use vpngw_core::error::VpngwError;

/// Terraform 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TerraformError {
    /// terraform 바이너리를 실행할 수 없음
    #[error("failed to spawn '{binary}': {source}")]
    Spawn {
        /// 실행하려던 바이너리
        binary: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },

    /// terraform 명령이 실패 종료 코드로 끝남
    #[error("terraform {command} exited with code {exit_code:?}: {output}")]
    CommandFailed {
        /// 하위 명령 (init, apply, ...)
        command: String,
        /// 종료 코드 (시그널로 종료되면 None)
        exit_code: Option<i32>,
        /// stdout + stderr
        output: String,
    },

    /// 알려진 일시적 에러로 재시도했지만 끝내 실패
    #[error("terraform {command} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// 하위 명령
        command: String,
        /// 총 시도 횟수
        attempts: u32,
        /// 마지막 에러
        last: Box<TerraformError>,
    },

    /// 필수 출력값이 없거나 비어 있음
    #[error("output '{name}' is missing or empty")]
    OutputMissing {
        /// 출력 이름
        name: String,
    },

    /// terraform JSON 출력 해석 실패
    #[error("failed to decode terraform {command} json: {reason}")]
    Decode {
        /// 하위 명령
        command: String,
        /// 실패 사유
        reason: String,
    },

    /// 워크스페이스 조작 불가 (예: default 삭제)
    #[error("workspace '{name}': {reason}")]
    Workspace {
        /// 워크스페이스 이름
        name: String,
        /// 사유
        reason: String,
    },

    /// 작업 복사본 생성/파일 쓰기 실패
    #[error("working copy error at {path}: {reason}")]
    WorkingCopy {
        /// 대상 경로
        path: String,
        /// 사유
        reason: String,
    },
}

impl TerraformError {
    /// 재시도 허용 목록과 비교할 출력 텍스트를 반환합니다.
    pub fn output_text(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<TerraformError> for VpngwError {
    fn from(err: TerraformError) -> Self {
        VpngwError::Provisioning(err.to_string())
    }
}
