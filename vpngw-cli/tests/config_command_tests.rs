//! Integration tests for `vpngw config` and `vpngw list`.
//!
//! Config loading is exercised through vpngw-core with real TOML files, and the
//! built binary is invoked for exit codes and JSON output.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

use vpngw_core::config::HarnessConfig;

fn vpngw() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vpngw"))
}

const VALID_CONFIG: &str = r#"
[general]
log_level = "warn"
log_format = "json"

[terraform]
binary = "terraform"
max_retries = 2
time_between_retries_secs = 1

[suite]
resource_group = "vpn-ci-rg"
regions = ["us-south", "eu-de"]
remote_cidr = "10.200.0.0/16"
tags = ["vpngw-ci"]
"#;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("vpngw.toml");
    fs::write(&config_path, VALID_CONFIG).expect("should write config");

    // When: Loading the config
    let config = HarnessConfig::load(&config_path)
        .await
        .expect("valid config should load successfully");

    // Then: File values are applied and the rest falls back to defaults
    assert_eq!(config.suite.resource_group, "vpn-ci-rg");
    assert_eq!(config.terraform.max_retries, 2);
    assert_eq!(config.suite.credential_env, "TF_VAR_ibmcloud_api_key");
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[suite\nregions = 1").expect("should write bad config");

    let result = HarnessConfig::load(&config_path).await;
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_single_region_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("vpngw.toml");
    fs::write(&config_path, "[suite]\nregions = [\"us-south\"]\n").expect("should write config");

    let result = HarnessConfig::load(&config_path).await;
    assert!(result.is_err(), "two-region scenarios need two regions");
}

#[test]
fn test_cli_config_validate_exit_codes() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let good = temp_dir.path().join("good.toml");
    let bad = temp_dir.path().join("bad.toml");
    fs::write(&good, VALID_CONFIG).expect("write good");
    fs::write(&bad, "[suite]\nremote_cidr = \"10.0.0.0/40\"\n").expect("write bad");

    let status = vpngw()
        .args(["config", "validate", "--config"])
        .arg(&good)
        .status()
        .expect("binary should run");
    assert_eq!(status.code(), Some(0));

    let output = vpngw()
        .args(["config", "validate", "--output", "json", "--config"])
        .arg(&bad)
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["valid"], false);
    assert!(report["errors"][0].as_str().unwrap_or_default().contains("remote_cidr"));
}

#[test]
fn test_cli_config_show_section() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("vpngw.toml");
    fs::write(&config_path, VALID_CONFIG).expect("should write config");

    let output = vpngw()
        .args(["config", "show", "--section", "suite", "--config"])
        .arg(&config_path)
        .output()
        .expect("binary should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("vpn-ci-rg"));
    assert!(stdout.contains("10.200.0.0/16"));
}

#[test]
fn test_cli_list_json_without_config() {
    let output = vpngw()
        .args(["list", "--output", "json", "--config", "/nonexistent/vpngw.toml"])
        .output()
        .expect("binary should run");
    assert!(output.status.success(), "list needs no configuration");

    let list: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let names: Vec<&str> = list["scenarios"]
        .as_array()
        .expect("scenarios array")
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(names, ["single-site", "multiple-connections", "vpc-to-vpc"]);
}

#[test]
fn test_cli_run_unknown_scenario_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("vpngw.toml");
    fs::write(&config_path, VALID_CONFIG).expect("should write config");

    let output = vpngw()
        .args(["run", "dual-stack", "--dry-run", "--config"])
        .arg(&config_path)
        .output()
        .expect("binary should run");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("dual-stack"));
}

#[test]
fn test_cli_run_dry_run_prints_assembled_vars() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let registry = temp_dir.path().join("permanent.yaml");
    fs::write(&registry, "general_test_resource_group: shared-rg\n").expect("write registry");
    let config_path = temp_dir.path().join("vpngw.toml");
    let config = format!(
        "{VALID_CONFIG}\n[permanent]\nresources_path = \"{}\"\n\
         resource_group_key = \"general_test_resource_group\"\n",
        registry.display()
    );
    fs::write(&config_path, config).expect("should write config");

    let output = vpngw()
        .args(["run", "vpc-to-vpc", "single-site", "--dry-run", "--output", "json", "--config"])
        .arg(&config_path)
        .output()
        .expect("binary should run");
    assert!(
        output.status.success(),
        "dry run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let scenarios = report["scenarios"].as_array().expect("scenarios array");
    assert_eq!(scenarios.len(), 2);
    assert_eq!(scenarios[0]["scenario"], "vpc-to-vpc");
    assert_eq!(scenarios[0]["vars"]["resource_group"], "shared-rg");
    assert_ne!(
        scenarios[0]["vars"]["region_site_a"],
        scenarios[0]["vars"]["region_site_b"]
    );
    assert_eq!(
        scenarios[1]["vars"]["remote_gateway_ip"],
        "<prerequisite:vpn_gateway_public_ip>"
    );
}
