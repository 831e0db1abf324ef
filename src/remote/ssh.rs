//! SSH transport: shells out to the system `ssh` and `scp` clients.
//!
//! Every command runs under `bash -l -c` so that login-shell setup such as
//! virtualenvwrapper's `workon` is available. Elevated commands are prefixed
//! with the configured sudo command; sudo must not prompt for a password
//! because stdin may carry file contents.

use super::{CommandOutput, RemoteCommand, Transport, shell_quote, wrap_for_privilege};
use crate::errors::DeployError;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct SshTransport {
    /// `user@host` without the port
    destination: String,
    port: Option<u16>,
    sudo: String,
    options: Vec<String>,
}

impl SshTransport {
    /// Create a transport for `user@host` or `user@host:port`.
    pub fn new(host: impl Into<String>, sudo: String, options: Vec<String>) -> Result<Self> {
        let (destination, port) = parse_host(&host.into())?;
        Ok(Self {
            destination,
            port,
            sudo,
            options,
        })
    }

    /// Arguments passed to `ssh` for a command.
    pub(crate) fn ssh_args(&self, command: &RemoteCommand) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(port) = self.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.extend(self.options.iter().cloned());
        args.push(self.destination.clone());
        let wrapped = wrap_for_privilege(&command.command, command.privilege, &self.sudo);
        args.push(format!("bash -l -c {}", shell_quote(&wrapped)));
        args
    }

    pub(crate) fn scp_args(&self, local: &Path, remote_parent: &str) -> Vec<String> {
        let mut args = vec!["-r".to_string(), "-q".to_string()];
        if let Some(port) = self.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }
        args.extend(self.options.iter().cloned());
        args.push(local.display().to_string());
        args.push(format!("{}:{}", self.destination, remote_parent));
        args
    }
}

/// Split `user@host:port` into destination and port.
fn parse_host(host: &str) -> Result<(String, Option<u16>)> {
    let host = host.trim();
    if host.is_empty() {
        return Err(DeployError::MissingSetting {
            key: "remote.host".to_string(),
        }
        .into());
    }
    match host.rsplit_once(':') {
        Some((destination, port)) if !destination.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| DeployError::InvalidSetting {
                key: "remote.host".to_string(),
                message: format!("invalid port '{}'", port),
            })?;
            Ok((destination.to_string(), Some(port)))
        }
        _ => Ok((host.to_string(), None)),
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, command: &RemoteCommand) -> Result<CommandOutput, DeployError> {
        let mut child = Command::new("ssh")
            .args(self.ssh_args(command))
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DeployError::SpawnFailed {
                program: "ssh".to_string(),
                source,
            })?;

        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|source| DeployError::SpawnFailed {
                    program: "ssh".to_string(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| DeployError::SpawnFailed {
                program: "ssh".to_string(),
                source,
            })?;
        Ok(CommandOutput::from_process(output))
    }

    async fn upload(&self, local: &Path, remote_parent: &str) -> Result<(), DeployError> {
        let output = Command::new("scp")
            .args(self.scp_args(local, remote_parent))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| DeployError::SpawnFailed {
                program: "scp".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(DeployError::Upload {
                local: local.to_path_buf(),
                remote: format!("{}:{}", self.destination, remote_parent),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self.port {
            Some(port) => format!("ssh://{}:{}", self.destination, port),
            None => format!("ssh://{}", self.destination),
        }
    }
}
