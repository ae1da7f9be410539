#![doc = include_str!("../README.md")]

pub mod cleanup;
pub mod error;
pub mod naming;
pub mod options;
pub mod provisioner;
pub mod runner;
pub mod scenarios;
pub mod suite;

pub use cleanup::{CleanupCoordinator, CleanupReport, PreservePolicy, ScenarioOutcome};
pub use error::ScenarioError;
pub use naming::{NameGenerator, pick_distinct_pair, pick_region, unique_id};
pub use options::{ScenarioOptions, ScenarioOptionsBuilder, default_vars};
pub use provisioner::{
    ProvisionAttempt, ProvisionedStack, RemoteGatewayProvisioner, check_credential,
};
pub use runner::{ConsistencyReport, ConsistencyRunner, RunOutcome};
pub use scenarios::{ScenarioKind, ScenarioResult, plan_scenario, run_scenario};
pub use suite::{SuiteContext, SuiteReport, retry_policy, run_suite};
