//! Allow-list driven retry policy for transient provider errors.
//!
//! Only a failed terraform command whose captured output matches one of the
//! configured patterns is retried. Anything else surfaces immediately so a
//! real defect in the module under test is never masked by retries.

use std::future::Future;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

use vpngw_core::config::TerraformConfig;
use vpngw_core::metrics as m;

use crate::error::TerraformError;

/// Patterns for provider/registry hiccups that are safe to retry.
///
/// Each entry is `(regex, human readable reason)`.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        ".*read: connection reset by peer.*",
        "Failed to reach helm charts repository.",
    ),
    (".*transport is closing.*", "Failed to reach Kubernetes API."),
    (
        ".*unable to verify signature.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*unable to verify checksum.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*no provider exists with the given name.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*registry service is unreachable.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*Error installing provider.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*Failed to query available provider packages.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*timeout while waiting for plugin to start.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*timed out waiting for server handshake.*",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        "could not query provider registry for",
        "Failed to retrieve plugin due to transient network error.",
    ),
    (
        ".*Provider produced inconsistent result after apply.*",
        "Provider eventual consistency error.",
    ),
];

/// One allow-list entry.
#[derive(Debug, Clone)]
pub struct RetryableError {
    pattern: Regex,
    reason: String,
}

impl RetryableError {
    /// Compiles a new entry.
    pub fn new(pattern: &str, reason: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            reason: reason.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Retry policy applied to init, apply and destroy.
///
/// `max_retries` counts retries, so a command runs at most `max_retries + 1` times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retryable: Vec<RetryableError>,
    max_retries: u32,
    time_between_retries: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        let retryable = DEFAULT_RETRYABLE_ERRORS
            .iter()
            .filter_map(|(pattern, reason)| RetryableError::new(pattern, *reason).ok())
            .collect();
        Self {
            retryable,
            max_retries: 3,
            time_between_retries: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retryable: Vec::new(),
            max_retries: 0,
            time_between_retries: Duration::ZERO,
        }
    }

    /// Builds the default allow-list extended with the configured extras.
    ///
    /// # Errors
    ///
    /// Returns the offending pattern if an extra entry is not a valid regex.
    pub fn from_config(config: &TerraformConfig) -> Result<Self, (String, regex::Error)> {
        let mut policy = Self::default()
            .with_max_retries(config.max_retries)
            .with_time_between_retries(Duration::from_secs(config.time_between_retries_secs));
        for (pattern, reason) in &config.extra_retryable_errors {
            let entry =
                RetryableError::new(pattern, reason.as_str()).map_err(|e| (pattern.clone(), e))?;
            policy.retryable.push(entry);
        }
        Ok(policy)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_time_between_retries(mut self, delay: Duration) -> Self {
        self.time_between_retries = delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn time_between_retries(&self) -> Duration {
        self.time_between_retries
    }

    pub fn retryable(&self) -> &[RetryableError] {
        &self.retryable
    }

    /// Returns the allow-list entry matching this error, if any.
    pub fn classify(&self, err: &TerraformError) -> Option<&RetryableError> {
        let output = err.output_text()?;
        self.retryable.iter().find(|e| e.pattern.is_match(output))
    }

    /// Runs `op`, retrying while it fails with an allow-listed error.
    pub async fn run<T, F, Fut>(&self, command: &str, mut op: F) -> Result<T, TerraformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TerraformError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(known) = self.classify(&err) else {
                return Err(err);
            };

            if attempt >= self.max_retries {
                return Err(TerraformError::RetriesExhausted {
                    command: command.to_owned(),
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            attempt += 1;
            warn!(
                command,
                attempt,
                max_retries = self.max_retries,
                reason = known.reason(),
                delay_ms = u64::try_from(self.time_between_retries.as_millis()).unwrap_or(u64::MAX),
                "transient terraform error, retrying"
            );
            metrics::counter!(m::TERRAFORM_RETRIES_TOTAL, m::LABEL_COMMAND => command.to_owned())
                .increment(1);
            tokio::time::sleep(self.time_between_retries).await;
        }
    }
}
