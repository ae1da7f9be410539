//! CLI-specific error types and exit code mapping

use vpngw_core::error::VpngwError;
use vpngw_scenario::ScenarioError;
use vpngw_terraform::TerraformError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to the process exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid command usage that clap cannot catch.
    #[error("{0}")]
    Command(String),

    /// One or more scenarios failed.
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },

    /// Scenario setup error (unknown scenario, credentials, registry).
    #[error("{0}")]
    Scenario(#[from] ScenarioError),

    /// Manual terraform operation failed.
    #[error("terraform error: {0}")]
    Terraform(#[from] TerraformError),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from vpngw-core.
    #[error("{0}")]
    Core(#[from] VpngwError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success, every scenario passed            |
    /// | 1    | Scenario failure or general command error |
    /// | 2    | Configuration error                       |
    /// | 3    | Terraform failure in a manual operation   |
    /// | 10   | IO error                                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(VpngwError::Config(_)) => 2,
            Self::Terraform(_) => 3,
            Self::Io(_) => 10,
            Self::Command(_)
            | Self::ScenariosFailed { .. }
            | Self::Scenario(_)
            | Self::JsonSerialize(_)
            | Self::Core(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_scenarios_failed() {
        let err = CliError::ScenariosFailed { failed: 1, total: 3 };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "1 of 3 scenario(s) failed");
    }

    #[test]
    fn test_exit_code_config_errors() {
        assert_eq!(CliError::Config("bad".to_owned()).exit_code(), 2);

        let core = VpngwError::Config(vpngw_core::error::ConfigError::FileNotFound {
            path: "vpngw.toml".to_owned(),
        });
        assert_eq!(CliError::from(core).exit_code(), 2);
    }

    #[test]
    fn test_exit_code_terraform_error() {
        let err = CliError::from(TerraformError::CommandFailed {
            command: "destroy".to_owned(),
            exit_code: Some(1),
            output: "Error: resource in use".to_owned(),
        });
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("resource in use"));
    }

    #[test]
    fn test_exit_code_unknown_scenario() {
        let err = CliError::from(ScenarioError::UnknownScenario("dual-stack".to_owned()));
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("dual-stack"));
    }

    #[test]
    fn test_exit_code_io_error() {
        let err = CliError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(err.exit_code(), 10);
    }
}
