//! Local transport: runs commands on this machine.
//!
//! Used to provision the machine the tool runs on, and by the integration
//! tests, which point every system path at a temporary directory. Commands
//! run under `bash -l -c`, as they do over SSH.

use super::{CommandOutput, RemoteCommand, Transport, wrap_for_privilege};
use crate::errors::DeployError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use walkdir::WalkDir;

pub struct LocalTransport {
    sudo: String,
    shell: String,
}

impl LocalTransport {
    pub fn new(sudo: String) -> Self {
        Self {
            sudo,
            shell: "bash".to_string(),
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> DeployError {
        DeployError::SpawnFailed {
            program: self.shell.clone(),
            source,
        }
    }
}

/// Recursively copy `local` into `parent`, keeping its directory name.
fn copy_tree(local: &Path, parent: &Path) -> std::io::Result<PathBuf> {
    let name = local.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no directory name", local.display()),
        )
    })?;
    let target_root = parent.join(name);

    for entry in WalkDir::new(local) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(local)
            .map_err(std::io::Error::other)?;
        let target = target_root.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(dir) = target.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(target_root)
}

#[async_trait]
impl Transport for LocalTransport {
    async fn exec(&self, command: &RemoteCommand) -> Result<CommandOutput, DeployError> {
        let wrapped = wrap_for_privilege(&command.command, command.privilege, &self.sudo);

        let mut child = Command::new(&self.shell)
            .arg("-l")
            .arg("-c")
            .arg(&wrapped)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| self.spawn_error(e))?;
            // stdin is dropped here, closing the pipe
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(CommandOutput::from_process(output))
    }

    async fn upload(&self, local: &Path, remote_parent: &str) -> Result<(), DeployError> {
        let source = local.to_path_buf();
        let parent = PathBuf::from(remote_parent);
        let result = tokio::task::spawn_blocking({
            let source = source.clone();
            let parent = parent.clone();
            move || copy_tree(&source, &parent)
        })
        .await
        .map_err(|e| DeployError::Other(anyhow::anyhow!("upload task failed: {}", e)))?;

        result.map(|_| ()).map_err(|e| DeployError::Upload {
            local: source,
            remote: remote_parent.to_string(),
            message: e.to_string(),
        })
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}
