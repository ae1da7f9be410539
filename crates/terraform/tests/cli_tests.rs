//! 통합 테스트 -- 가짜 terraform 바이너리로 TerraformCli 검증
//!
//! 셸 스크립트로 terraform의 입출력 형식을 흉내 내어, 실제 프로세스 실행 경로
//! (인자 구성, var-file, 종료 코드 해석, 워크스페이스 목록 파싱)를 테스트합니다.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

use vpngw_terraform::{
    ChangeAction, RetryPolicy, Terraform, TerraformCli, TerraformClient, TerraformError,
    TerraformOptions,
};

const FAKE_TERRAFORM: &str = r#"#!/bin/sh
case "$1" in
  init)
    if [ ! -f .init-attempted ]; then
      touch .init-attempted
      echo "Error: Failed to query available provider packages" >&2
      exit 1
    fi
    echo "Terraform has been successfully initialized!"
    ;;
  apply)
    cat vpngw.tfvars.json > applied.json
    echo "$TF_IN_AUTOMATION" > automation
    echo "Apply complete! Resources: 2 added, 0 changed, 0 destroyed."
    ;;
  plan)
    for arg in "$@"; do
      case "$arg" in -out=*) : > "${arg#-out=}" ;; esac
    done
    exit 2
    ;;
  show)
    echo '{"format_version":"1.2","resource_changes":[{"address":"ibm_is_vpn_gateway.gw","change":{"actions":["update"]}}]}'
    ;;
  output)
    echo '{"vpn_gateway_public_ip":{"sensitive":false,"type":"string","value":"169.61.10.4"},"remote_cidr":{"sensitive":false,"type":"string","value":"10.100.10.0/24"}}'
    ;;
  destroy)
    touch destroyed
    echo "Destroy complete! Resources: 2 destroyed."
    ;;
  workspace)
    [ -f workspaces ] || echo default > workspaces
    current=$(cat current 2>/dev/null || echo default)
    case "$2" in
      list)
        while read -r ws; do
          if [ "$ws" = "$current" ]; then echo "* $ws"; else echo "  $ws"; fi
        done < workspaces
        ;;
      new) echo "$3" >> workspaces; echo "$3" > current ;;
      select) echo "$3" > current ;;
      delete)
        if [ "$3" = "$current" ]; then echo "cannot delete current workspace" >&2; exit 1; fi
        grep -v "^$3\$" workspaces > workspaces.tmp; mv workspaces.tmp workspaces
        ;;
    esac
    ;;
  *)
    echo "unknown command $1" >&2
    exit 1
    ;;
esac
"#;

const FAILING_TERRAFORM: &str = "#!/bin/sh\necho \"Error: creating VPN gateway: quota exceeded\" >&2\nexit 1\n";

fn install_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("terraform");
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

struct Fixture {
    _bin: TempDir,
    module: TempDir,
    cli: TerraformCli,
}

fn fixture(body: &str) -> Fixture {
    let bin = tempfile::tempdir().unwrap();
    let script = install_script(bin.path(), body);
    let module = tempfile::tempdir().unwrap();
    std::fs::write(module.path().join("main.tf"), "").unwrap();
    Fixture {
        cli: TerraformCli::new(script.display().to_string()),
        _bin: bin,
        module,
    }
}

#[tokio::test]
#[serial]
async fn full_lifecycle_against_fake_binary() {
    let fx = fixture(FAKE_TERRAFORM);
    let tf = Terraform::new(
        Arc::new(fx.cli.clone()),
        RetryPolicy::default().with_time_between_retries(Duration::ZERO),
    );
    let opts = TerraformOptions::new(fx.module.path())
        .with_var("prefix", "ex-q1w2e3")
        .with_var("region", "jp-tok")
        .with_upgrade(true);

    tf.workspace_select_or_new(&opts, "ex-q1w2e3").await.unwrap();

    // 첫 init은 알려진 일시적 에러로 실패하고 재시도에서 성공
    tf.init_and_apply(&opts).await.unwrap();
    let applied: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(fx.module.path().join("applied.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(applied["prefix"], "ex-q1w2e3");
    assert_eq!(applied["region"], "jp-tok");
    assert_eq!(
        std::fs::read_to_string(fx.module.path().join("automation"))
            .unwrap()
            .trim(),
        "1"
    );

    let outputs = tf
        .require_outputs(&opts, &["vpn_gateway_public_ip", "remote_cidr"])
        .await
        .unwrap();
    assert_eq!(
        outputs.get_str("vpn_gateway_public_ip").as_deref(),
        Some("169.61.10.4")
    );

    let plan = tf.plan(&opts).await.unwrap();
    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].actions, vec![ChangeAction::Update]);

    tf.destroy(&opts).await.unwrap();
    assert!(fx.module.path().join("destroyed").exists());

    // 현재 워크스페이스 삭제 전 default로 전환
    tf.workspace_delete(&opts, "ex-q1w2e3").await.unwrap();
    let listing = std::fs::read_to_string(fx.module.path().join("workspaces")).unwrap();
    assert!(!listing.contains("ex-q1w2e3"));

    // 이미 삭제된 워크스페이스는 성공으로 취급
    let out = tf.workspace_delete(&opts, "ex-q1w2e3").await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
#[serial]
async fn failure_captures_stderr_and_exit_code() {
    let fx = fixture(FAILING_TERRAFORM);
    let err = fx
        .cli
        .apply(&TerraformOptions::new(fx.module.path()))
        .await
        .unwrap_err();
    match err {
        TerraformError::CommandFailed {
            command,
            exit_code,
            output,
        } => {
            assert_eq!(command, "apply");
            assert_eq!(exit_code, Some(1));
            assert!(output.contains("quota exceeded"));
        }
        other => panic!("expected CommandFailed, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn non_retryable_failure_runs_once() {
    let fx = fixture(FAILING_TERRAFORM);
    let tf = Terraform::new(
        Arc::new(fx.cli.clone()),
        RetryPolicy::default().with_time_between_retries(Duration::ZERO),
    );
    let err = tf
        .destroy(&TerraformOptions::new(fx.module.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, TerraformError::CommandFailed { .. }));
}
