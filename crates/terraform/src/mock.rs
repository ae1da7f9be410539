//! 테스트용 Mock Terraform 클라이언트
//!
//! terraform 바이너리나 클라우드 계정 없이 시나리오 흐름을 검증하기 위해
//! 모든 호출을 기록하고, 명령별로 실패/일시적 실패를 주입할 수 있습니다.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use vpngw_core::types::{OutputValues, TerraformVars};

use crate::client::{DEFAULT_WORKSPACE, TerraformClient};
use crate::error::TerraformError;
use crate::options::TerraformOptions;
use crate::plan::PlanReport;

/// 기록된 호출 한 건
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// 하위 명령 (init, apply, plan, output, destroy, workspace-select-or-new, workspace-delete)
    pub command: String,
    /// 작업 디렉토리
    pub dir: PathBuf,
    /// 호출 시점의 입력 변수
    pub vars: TerraformVars,
    /// 워크스페이스 명령의 대상 이름
    pub workspace: Option<String>,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<MockCall>,
    workspaces: BTreeSet<String>,
    transient: HashMap<String, VecDeque<String>>,
}

/// 설정 가능한 응답을 반환하는 Mock 클라이언트
#[derive(Debug)]
pub struct MockTerraform {
    state: Mutex<MockState>,
    failures: HashMap<String, String>,
    outputs: OutputValues,
    outputs_by_dir: Vec<(String, OutputValues)>,
    plan: PlanReport,
}

impl Default for MockTerraform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTerraform {
    /// 모든 명령이 성공하는 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                workspaces: BTreeSet::from([DEFAULT_WORKSPACE.to_owned()]),
                transient: HashMap::new(),
            }),
            failures: HashMap::new(),
            outputs: OutputValues::default(),
            outputs_by_dir: Vec::new(),
            plan: PlanReport::default(),
        }
    }

    /// `command`가 항상 실패하도록 설정합니다.
    pub fn with_failure(mut self, command: &str, output: &str) -> Self {
        self.failures.insert(command.to_owned(), output.to_owned());
        self
    }

    /// `command`의 다음 호출 한 번이 실패하도록 설정합니다. 여러 번 호출하면 누적됩니다.
    pub fn with_transient_failure(self, command: &str, output: &str) -> Self {
        self.lock()
            .transient
            .entry(command.to_owned())
            .or_default()
            .push_back(output.to_owned());
        self
    }

    /// 기본 출력값을 설정합니다.
    pub fn with_outputs(mut self, outputs: OutputValues) -> Self {
        self.outputs = outputs;
        self
    }

    /// 작업 디렉토리 경로에 `fragment`가 포함될 때 사용할 출력값을 설정합니다.
    pub fn with_outputs_for(mut self, fragment: &str, outputs: OutputValues) -> Self {
        self.outputs_by_dir.push((fragment.to_owned(), outputs));
        self
    }

    /// plan 결과를 설정합니다.
    pub fn with_plan(mut self, plan: PlanReport) -> Self {
        self.plan = plan;
        self
    }

    /// 기록된 모든 호출
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// 특정 명령의 호출 목록
    pub fn calls_for(&self, command: &str) -> Vec<MockCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.command == command)
            .cloned()
            .collect()
    }

    /// 특정 명령의 호출 횟수
    pub fn count(&self, command: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.command == command)
            .count()
    }

    /// 현재 존재하는 워크스페이스
    pub fn workspaces(&self) -> BTreeSet<String> {
        self.lock().workspaces.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(
        &self,
        command: &str,
        opts: &TerraformOptions,
        workspace: Option<&str>,
    ) -> Result<(), TerraformError> {
        let mut state = self.lock();
        state.calls.push(MockCall {
            command: command.to_owned(),
            dir: opts.dir.clone(),
            vars: opts.vars.clone(),
            workspace: workspace.map(str::to_owned),
        });
        let transient = state
            .transient
            .get_mut(command)
            .and_then(VecDeque::pop_front);
        if let Some(output) = transient.or_else(|| self.failures.get(command).cloned()) {
            return Err(TerraformError::CommandFailed {
                command: command.to_owned(),
                exit_code: Some(1),
                output,
            });
        }
        Ok(())
    }

    fn outputs_for(&self, dir: &Path) -> OutputValues {
        let dir = dir.to_string_lossy();
        self.outputs_by_dir
            .iter()
            .find(|(fragment, _)| dir.contains(fragment.as_str()))
            .map(|(_, outputs)| outputs.clone())
            .unwrap_or_else(|| self.outputs.clone())
    }
}

impl TerraformClient for MockTerraform {
    async fn init(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        self.record("init", opts, None)?;
        Ok("Terraform has been successfully initialized!".to_owned())
    }

    async fn apply(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        self.record("apply", opts, None)?;
        Ok("Apply complete!".to_owned())
    }

    async fn plan(&self, opts: &TerraformOptions) -> Result<PlanReport, TerraformError> {
        self.record("plan", opts, None)?;
        Ok(self.plan.clone())
    }

    async fn output_all(&self, opts: &TerraformOptions) -> Result<OutputValues, TerraformError> {
        self.record("output", opts, None)?;
        Ok(self.outputs_for(&opts.dir))
    }

    async fn destroy(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        self.record("destroy", opts, None)?;
        Ok("Destroy complete!".to_owned())
    }

    async fn workspace_select_or_new(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> Result<String, TerraformError> {
        self.record("workspace-select-or-new", opts, Some(name))?;
        self.lock().workspaces.insert(name.to_owned());
        Ok(format!("Switched to workspace \"{name}\"."))
    }

    async fn workspace_delete(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> Result<String, TerraformError> {
        self.record("workspace-delete", opts, Some(name))?;
        if name == DEFAULT_WORKSPACE {
            return Err(TerraformError::Workspace {
                name: name.to_owned(),
                reason: "the default workspace cannot be deleted".to_owned(),
            });
        }
        self.lock().workspaces.remove(name);
        Ok(format!("Deleted workspace \"{name}\"!"))
    }
}
