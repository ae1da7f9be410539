//! Client + retry policy.
//!
//! [`Terraform`] is what the scenario layer talks to. Commands that hit the
//! provider registry or cloud APIs (init, apply, plan, destroy) go through the
//! [`RetryPolicy`]; reads and workspace bookkeeping run once.

use std::sync::Arc;

use tracing::info;

use vpngw_core::types::OutputValues;

use crate::client::TerraformClient;
use crate::error::TerraformError;
use crate::options::TerraformOptions;
use crate::plan::PlanReport;
use crate::retry::RetryPolicy;

/// Shared terraform handle.
pub struct Terraform<C: TerraformClient> {
    client: Arc<C>,
    retry: RetryPolicy,
}

impl<C: TerraformClient> Clone for Terraform<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            retry: self.retry.clone(),
        }
    }
}

impl<C: TerraformClient> Terraform<C> {
    pub fn new(client: Arc<C>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn init(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        self.retry.run("init", || self.client.init(opts)).await
    }

    pub async fn apply(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        self.retry.run("apply", || self.client.apply(opts)).await
    }

    /// `init` followed by `apply`, each retried independently.
    pub async fn init_and_apply(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        info!(dir = %opts.dir.display(), "terraform init and apply");
        self.init(opts).await?;
        self.apply(opts).await
    }

    pub async fn plan(&self, opts: &TerraformOptions) -> Result<PlanReport, TerraformError> {
        self.retry.run("plan", || self.client.plan(opts)).await
    }

    pub async fn output_all(
        &self,
        opts: &TerraformOptions,
    ) -> Result<OutputValues, TerraformError> {
        self.client.output_all(opts).await
    }

    /// Reads outputs and checks that each name in `required` is a non-empty
    /// value.
    pub async fn require_outputs(
        &self,
        opts: &TerraformOptions,
        required: &[&str],
    ) -> Result<OutputValues, TerraformError> {
        let outputs = self.output_all(opts).await?;
        if let Some(missing) = required.iter().find(|n| outputs.get_str(n).is_none()) {
            return Err(TerraformError::OutputMissing {
                name: (*missing).to_owned(),
            });
        }
        Ok(outputs)
    }

    pub async fn destroy(&self, opts: &TerraformOptions) -> Result<String, TerraformError> {
        info!(dir = %opts.dir.display(), "terraform destroy");
        self.retry.run("destroy", || self.client.destroy(opts)).await
    }

    pub async fn workspace_select_or_new(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> Result<String, TerraformError> {
        self.client.workspace_select_or_new(opts, name).await
    }

    pub async fn workspace_delete(
        &self,
        opts: &TerraformOptions,
        name: &str,
    ) -> Result<String, TerraformError> {
        self.client.workspace_delete(opts, name).await
    }
}
