//! 격리된 모듈 작업 복사본
//!
//! 병렬로 실행되는 시나리오가 같은 `.terraform` 디렉토리나 state 파일을
//! 공유하지 않도록, 템플릿 디렉토리를 임시 디렉토리로 복사한 뒤 그 안에서
//! terraform을 실행합니다. [`TempModule`]이 drop되면 복사본도 삭제되며,
//! 실패한 스택을 보존할 때는 [`TempModule::keep`]으로 경로를 남깁니다.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::TerraformError;

/// 숨김 항목 중 복사하는 예외 (provider 버전 잠금 파일)
const KEPT_HIDDEN: &[&str] = &[".terraform.lock.hcl"];

/// 실행 산출물이므로 항상 제외하는 이름
const ALWAYS_EXCLUDED: &[&str] = &["terraform.tfstate.d", "vpngw.tfvars.json", "vpngw.tfplan"];

/// 항상 제외하는 확장자
const EXCLUDED_SUFFIXES: &[&str] = &[".tfstate", ".tfstate.backup"];

/// 임시 디렉토리에 복사된 terraform 모듈
#[derive(Debug)]
pub struct TempModule {
    root: TempDir,
    working_dir: PathBuf,
}

impl TempModule {
    /// `src`를 `<tmp>/<prefix>-XXXX/`로 복사합니다.
    ///
    /// `exclude`에 있는 이름과 숨김 항목, state 파일은 복사하지 않습니다.
    pub async fn copy_from(
        src: impl AsRef<Path>,
        prefix: &str,
        exclude: &[String],
    ) -> Result<Self, TerraformError> {
        let src = src.as_ref().to_path_buf();
        let prefix = format!("{prefix}-");
        let exclude = exclude.to_vec();

        let source = src.clone();
        let root = tokio::task::spawn_blocking(move || -> io::Result<TempDir> {
            if !source.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "source directory does not exist",
                ));
            }
            let root = tempfile::Builder::new().prefix(&prefix).tempdir()?;
            copy_tree(&source, root.path(), &exclude)?;
            Ok(root)
        })
        .await
        .map_err(|e| TerraformError::WorkingCopy {
            path: src.display().to_string(),
            reason: format!("copy task failed: {e}"),
        })?
        .map_err(|e| TerraformError::WorkingCopy {
            path: src.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(src = %src.display(), dest = %root.path().display(), "copied module");
        let working_dir = root.path().to_path_buf();
        Ok(Self { root, working_dir })
    }

    /// 복사본 안의 하위 디렉토리를 작업 디렉토리로 지정합니다.
    pub fn with_working_dir(mut self, relative: impl AsRef<Path>) -> Result<Self, TerraformError> {
        let dir = self.root.path().join(relative.as_ref());
        if !dir.is_dir() {
            return Err(TerraformError::WorkingCopy {
                path: dir.display().to_string(),
                reason: "module directory not found in working copy".to_owned(),
            });
        }
        self.working_dir = dir;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// 삭제하지 않고 디스크에 남깁니다. 작업 디렉토리 경로를 반환합니다.
    pub fn keep(self) -> PathBuf {
        let working_dir = self.working_dir;
        let _root = self.root.keep();
        working_dir
    }
}

fn is_excluded(name: &str, exclude: &[String]) -> bool {
    if exclude.iter().any(|e| e == name) || ALWAYS_EXCLUDED.contains(&name) {
        return true;
    }
    if name.starts_with('.') && !KEPT_HIDDEN.contains(&name) {
        return true;
    }
    EXCLUDED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn copy_tree(src: &Path, dest: &Path, exclude: &[String]) -> io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name_str) = name.to_str() else {
            continue;
        };
        if is_excluded(name_str, exclude) {
            continue;
        }
        let from = entry.path();
        let to = dest.join(&name);
        // 심볼릭 링크는 대상 기준으로 복사, 깨진 링크는 건너뜀
        let Ok(meta) = std::fs::metadata(&from) else {
            continue;
        };
        if meta.is_dir() {
            std::fs::create_dir_all(&to)?;
            copy_tree(&from, &to, exclude)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
