//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다. 레코더가 설치되지 않으면
//! 기록은 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `vpngw_`
//! - 영역: `terraform_`, `stack_`, `scenario_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// terraform 하위 명령 레이블 키 (init, apply, plan, output, destroy, workspace)
pub const LABEL_COMMAND: &str = "command";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 시나리오 이름 레이블 키
pub const LABEL_SCENARIO: &str = "scenario";

// ─── Terraform 메트릭 ──────────────────────────────────────────────

/// Terraform: 실행된 명령 수 (counter, labels: command, result)
pub const TERRAFORM_COMMANDS_TOTAL: &str = "vpngw_terraform_commands_total";

/// Terraform: 알려진 일시적 에러로 인한 재시도 수 (counter, label: command)
pub const TERRAFORM_RETRIES_TOTAL: &str = "vpngw_terraform_retries_total";

// ─── 스택 수명 주기 메트릭 ─────────────────────────────────────────

/// 프로비저닝된 사전 리소스 스택 수 (counter)
pub const STACKS_PROVISIONED_TOTAL: &str = "vpngw_stacks_provisioned_total";

/// 정리된 스택 수 (counter)
pub const STACKS_DESTROYED_TOTAL: &str = "vpngw_stacks_destroyed_total";

/// 실패 후 보존된 스택 수 (counter)
pub const STACKS_PRESERVED_TOTAL: &str = "vpngw_stacks_preserved_total";

/// 정리 실패 수 (counter)
pub const CLEANUP_FAILURES_TOTAL: &str = "vpngw_cleanup_failures_total";

// ─── 시나리오 메트릭 ───────────────────────────────────────────────

/// 시나리오 실행 수 (counter, labels: scenario, result)
pub const SCENARIOS_TOTAL: &str = "vpngw_scenarios_total";

/// 시나리오 소요 시간 (histogram, 초, label: scenario)
pub const SCENARIO_DURATION_SECONDS: &str = "vpngw_scenario_duration_seconds";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        TERRAFORM_COMMANDS_TOTAL,
        "Terraform commands executed, by subcommand and result"
    );
    describe_counter!(
        TERRAFORM_RETRIES_TOTAL,
        "Terraform commands retried after a known transient error"
    );
    describe_counter!(
        STACKS_PROVISIONED_TOTAL,
        "Prerequisite stacks applied successfully"
    );
    describe_counter!(STACKS_DESTROYED_TOTAL, "Stacks destroyed during cleanup");
    describe_counter!(
        STACKS_PRESERVED_TOTAL,
        "Stacks left in place after a failed scenario"
    );
    describe_counter!(
        CLEANUP_FAILURES_TOTAL,
        "Destroy or workspace deletion failures during cleanup"
    );
    describe_counter!(SCENARIOS_TOTAL, "Scenarios executed, by result");
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Wall-clock duration of a scenario in seconds"
    );
}
