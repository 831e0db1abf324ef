//! Typed error hierarchy for sitedeploy.
//!
//! Configuration errors (`UnknownEnvironment`, `MissingSetting`,
//! `InvalidSetting`, `InvalidFlag`) are raised before any command reaches the
//! target host. `RemoteCommandFailed` marks a hard failure of a remote step;
//! soft failures never become errors, they are logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Unknown environment '{0}'. Valid values: production, staging, development")]
    UnknownEnvironment(String),

    #[error("Missing required setting '{key}'")]
    MissingSetting { key: String },

    #[error("Invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Invalid value '{value}' for --{flag}. Use y or n")]
    InvalidFlag { flag: String, value: String },

    #[error("Command `{command}` exited with status {status}{}", format_stderr(.stderr))]
    RemoteCommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to upload {} to {remote}: {message}", .local.display())]
    Upload {
        local: PathBuf,
        remote: String,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl DeployError {
    /// True for errors detected while reading configuration or CLI input.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DeployError::UnknownEnvironment(_)
                | DeployError::MissingSetting { .. }
                | DeployError::InvalidSetting { .. }
                | DeployError::InvalidFlag { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_command_failed_includes_stderr() {
        let err = DeployError::RemoteCommandFailed {
            command: "cp a b".to_string(),
            status: 1,
            stderr: "cp: cannot stat 'a'\n".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cp a b"));
        assert!(msg.contains("status 1"));
        assert!(msg.ends_with("cp: cannot stat 'a'"));
    }

    #[test]
    fn remote_command_failed_without_stderr() {
        let err = DeployError::RemoteCommandFailed {
            command: "false".to_string(),
            status: 1,
            stderr: "  ".to_string(),
        };
        assert_eq!(err.to_string(), "Command `false` exited with status 1");
    }

    #[test]
    fn unknown_environment_lists_valid_values() {
        let err = DeployError::UnknownEnvironment("qa".into());
        assert!(err.to_string().contains("'qa'"));
        assert!(err.to_string().contains("production, staging, development"));
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(DeployError::UnknownEnvironment("x".into()).is_configuration_error());
        assert!(
            DeployError::MissingSetting {
                key: "project.user".into()
            }
            .is_configuration_error()
        );
        assert!(
            !DeployError::RemoteCommandFailed {
                command: "x".into(),
                status: 2,
                stderr: String::new()
            }
            .is_configuration_error()
        );
    }
}
