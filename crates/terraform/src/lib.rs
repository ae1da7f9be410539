#![doc = include_str!("../README.md")]

pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod ops;
pub mod options;
pub mod plan;
pub mod retry;
pub mod workdir;

pub use client::{DEFAULT_WORKSPACE, TerraformCli, TerraformClient};
pub use error::TerraformError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockTerraform};
pub use ops::Terraform;
pub use options::TerraformOptions;
pub use plan::{ChangeAction, ChangeFilter, PlanReport, ResourceChange};
pub use retry::{RetryPolicy, RetryableError};
pub use workdir::TempModule;
