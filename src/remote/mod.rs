//! Command execution on the target host.
//!
//! A [`Transport`] carries one shell command at a time to the host and
//! reports its exit status and output. [`Remote`] layers the helpers the
//! lifecycle operations are written against:
//!
//! | Helper            | Failure handling                              |
//! |-------------------|-----------------------------------------------|
//! | `run` / `sudo`    | non-zero exit → `DeployError::RemoteCommandFailed` |
//! | `run_soft` / `sudo_soft` | non-zero exit → warning, execution continues |
//! | `exists` / `contains` | 0 → true, 1 → false, anything else → `RemoteCommandFailed` |
//!
//! Commands are issued strictly one after another; nothing is retried.

pub mod local;
pub mod ssh;

use crate::errors::DeployError;
use crate::settings::{RemoteSection, TransportKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

pub use local::LocalTransport;
pub use ssh::SshTransport;

/// Privilege a command runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    User,
    Elevated,
}

/// One shell command to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub command: String,
    pub privilege: Privilege,
    /// Written to the command's stdin, then stdin is closed
    pub stdin: Option<String>,
}

impl RemoteCommand {
    pub fn user(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            privilege: Privilege::User,
            stdin: None,
        }
    }

    pub fn elevated(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            privilege: Privilege::Elevated,
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub(crate) fn from_process(output: std::process::Output) -> Self {
        Self {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// A command pipe to one host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a command to completion.
    async fn exec(&self, command: &RemoteCommand) -> Result<CommandOutput, DeployError>;

    /// Copy a local directory tree into `remote_parent` on the host.
    async fn upload(&self, local: &Path, remote_parent: &str) -> Result<(), DeployError>;

    /// Short description used in log lines.
    fn describe(&self) -> String;
}

/// Quote a string for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Wrap a command for the given privilege using the configured sudo prefix.
pub(crate) fn wrap_for_privilege(command: &str, privilege: Privilege, sudo: &str) -> String {
    match privilege {
        Privilege::Elevated if !sudo.trim().is_empty() => {
            format!("{} bash -l -c {}", sudo.trim(), shell_quote(command))
        }
        _ => command.to_string(),
    }
}

/// Fabric-style helpers over a transport.
pub struct Remote {
    transport: Box<dyn Transport>,
}

impl Remote {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build the transport selected by `[remote]`.
    pub fn from_settings(remote: &RemoteSection) -> Result<Self> {
        let transport: Box<dyn Transport> = match remote.transport {
            TransportKind::Ssh => {
                let host = remote.host.clone().ok_or_else(|| DeployError::MissingSetting {
                    key: "remote.host".to_string(),
                })?;
                Box::new(SshTransport::new(
                    host,
                    remote.sudo.clone(),
                    remote.ssh_options.clone(),
                )?)
            }
            TransportKind::Local => Box::new(LocalTransport::new(remote.sudo.clone())),
        };
        Ok(Self::new(transport))
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    async fn exec_hard(&self, command: RemoteCommand) -> Result<CommandOutput> {
        tracing::debug!(command = %command.command, privilege = ?command.privilege, "exec");
        let output = self.transport.exec(&command).await?;
        if !output.success() {
            return Err(DeployError::RemoteCommandFailed {
                command: command.command,
                status: output.status,
                stderr: output.stderr,
            }
            .into());
        }
        Ok(output)
    }

    async fn exec_soft(&self, command: RemoteCommand) -> Result<CommandOutput> {
        tracing::debug!(command = %command.command, privilege = ?command.privilege, "exec (soft)");
        let output = self.transport.exec(&command).await?;
        if !output.success() {
            tracing::warn!(
                command = %command.command,
                status = output.status,
                stderr = %output.stderr.trim(),
                "command failed, continuing"
            );
        }
        Ok(output)
    }

    /// Run as the connecting user; non-zero exit is a hard failure.
    pub async fn run(&self, command: impl Into<String>) -> Result<CommandOutput> {
        self.exec_hard(RemoteCommand::user(command)).await
    }

    /// Run elevated; non-zero exit is a hard failure.
    pub async fn sudo(&self, command: impl Into<String>) -> Result<CommandOutput> {
        self.exec_hard(RemoteCommand::elevated(command)).await
    }

    /// Run a prepared command; non-zero exit is a hard failure.
    pub async fn exec(&self, command: RemoteCommand) -> Result<CommandOutput> {
        self.exec_hard(command).await
    }

    /// Run as the connecting user; failure is logged and returned, not raised.
    pub async fn run_soft(&self, command: impl Into<String>) -> Result<CommandOutput> {
        self.exec_soft(RemoteCommand::user(command)).await
    }

    /// Run elevated; failure is logged and returned, not raised.
    pub async fn sudo_soft(&self, command: impl Into<String>) -> Result<CommandOutput> {
        self.exec_soft(RemoteCommand::elevated(command)).await
    }

    /// Run a yes/no test command. Exit 1 means "no"; any other non-zero
    /// status (ssh exits 255 when the connection fails) is an error.
    async fn exec_check(&self, command: RemoteCommand) -> Result<bool> {
        tracing::debug!(command = %command.command, "exec (check)");
        let output = self.transport.exec(&command).await?;
        match output.status {
            0 => Ok(true),
            1 => Ok(false),
            status => Err(DeployError::RemoteCommandFailed {
                command: command.command,
                status,
                stderr: output.stderr,
            }
            .into()),
        }
    }

    /// True if the path exists on the host (symlinks included, even dangling).
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let quoted = shell_quote(path);
        self.exec_check(RemoteCommand::user(format!(
            "test -e {0} || test -L {0}",
            quoted
        )))
        .await
    }

    /// True if the file exists and contains `text` as a fixed string.
    pub async fn contains(&self, path: &str, text: &str) -> Result<bool> {
        let quoted = shell_quote(path);
        self.exec_check(RemoteCommand::user(format!(
            "test -f {0} && grep -qF -- {1} {0}",
            quoted,
            shell_quote(text)
        )))
        .await
    }

    /// Read a whole file.
    pub async fn read_file(&self, path: &str, privilege: Privilege) -> Result<String> {
        let command = RemoteCommand {
            command: format!("cat {}", shell_quote(path)),
            privilege,
            stdin: None,
        };
        let output = self
            .exec_hard(command)
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        Ok(output.stdout)
    }

    /// Replace a file's contents.
    pub async fn write_file(&self, path: &str, contents: &str, privilege: Privilege) -> Result<()> {
        let command = RemoteCommand {
            command: format!("cat > {}", shell_quote(path)),
            privilege,
            stdin: Some(contents.to_string()),
        };
        self.exec_hard(command)
            .await
            .with_context(|| format!("Failed to write {}", path))?;
        Ok(())
    }

    /// Copy a local directory tree into `remote_parent`.
    pub async fn upload(&self, local: &Path, remote_parent: &str) -> Result<()> {
        tracing::debug!(local = %local.display(), remote = remote_parent, "upload");
        self.transport.upload(local, remote_parent).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording transport for unit tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every command and answers from simple rules.
    ///
    /// - `fail_on`: commands containing any of these substrings exit 1
    /// - `unreachable`: every command exits 255, like ssh without a connection
    /// - `existing`: paths for which `test -e` succeeds
    /// - `files`: contents returned by `cat <path>`; `cat > <path>` stores stdin
    #[derive(Default)]
    pub struct FakeTransport {
        pub log: Mutex<Vec<RemoteCommand>>,
        pub uploads: Mutex<Vec<(std::path::PathBuf, String)>>,
        pub fail_on: Vec<String>,
        pub unreachable: bool,
        pub existing: Mutex<Vec<String>>,
        pub files: Mutex<HashMap<String, String>>,
    }

    impl FakeTransport {
        pub fn commands(&self) -> Vec<String> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.command.clone())
                .collect()
        }
    }

    fn unquote(s: &str) -> String {
        s.trim_matches('\'').to_string()
    }

    #[async_trait]
    impl Transport for std::sync::Arc<FakeTransport> {
        async fn exec(&self, command: &RemoteCommand) -> Result<CommandOutput, DeployError> {
            self.log.lock().unwrap().push(command.clone());
            let text = &command.command;

            if self.unreachable {
                return Ok(CommandOutput {
                    status: 255,
                    stdout: String::new(),
                    stderr: "ssh: connect to host example.net port 22: Connection refused".to_string(),
                });
            }
            if self.fail_on.iter().any(|f| text.contains(f.as_str())) {
                return Ok(CommandOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: format!("simulated failure: {}", text),
                });
            }
            if let Some(rest) = text.strip_prefix("test -e ") {
                let path = unquote(rest.split(" || ").next().unwrap_or(""));
                let found = self.existing.lock().unwrap().contains(&path);
                return Ok(CommandOutput {
                    status: if found { 0 } else { 1 },
                    ..Default::default()
                });
            }
            if let Some(path) = text.strip_prefix("cat > ") {
                let path = unquote(path);
                self.files
                    .lock()
                    .unwrap()
                    .insert(path, command.stdin.clone().unwrap_or_default());
                return Ok(CommandOutput::default());
            }
            if let Some(path) = text.strip_prefix("cat ") {
                let path = unquote(path);
                let contents = self.files.lock().unwrap().get(&path).cloned();
                return Ok(match contents {
                    Some(stdout) => CommandOutput {
                        status: 0,
                        stdout,
                        stderr: String::new(),
                    },
                    None => CommandOutput {
                        status: 1,
                        stdout: String::new(),
                        stderr: format!("cat: {}: No such file or directory", path),
                    },
                });
            }
            if text.starts_with("test -f ") {
                return Ok(CommandOutput {
                    status: 1,
                    ..Default::default()
                });
            }
            Ok(CommandOutput::default())
        }

        async fn upload(&self, local: &Path, remote_parent: &str) -> Result<(), DeployError> {
            self.uploads
                .lock()
                .unwrap()
                .push((local.to_path_buf(), remote_parent.to_string()));
            Ok(())
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    pub fn remote_with(fake: &std::sync::Arc<FakeTransport>) -> Remote {
        Remote::new(Box::new(fake.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("/etc/nginx/sites-enabled/app"), "/etc/nginx/sites-enabled/app");
        assert_eq!(shell_quote("user@host"), "user@host");
    }

    #[test]
    fn test_shell_quote_special() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("workon x && pip"), "'workon x && pip'");
    }

    #[test]
    fn test_wrap_for_privilege() {
        assert_eq!(wrap_for_privilege("ls", Privilege::User, "sudo"), "ls");
        assert_eq!(
            wrap_for_privilege("service nginx stop", Privilege::Elevated, "sudo"),
            "sudo bash -l -c 'service nginx stop'"
        );
        assert_eq!(
            wrap_for_privilege("service nginx stop", Privilege::Elevated, ""),
            "service nginx stop"
        );
    }

    #[tokio::test]
    async fn test_run_hard_failure_is_error() {
        let fake = Arc::new(FakeTransport {
            fail_on: vec!["apt-get".to_string()],
            ..Default::default()
        });
        let remote = remote_with(&fake);
        let err = remote.sudo("apt-get -y install nginx").await.unwrap_err();
        let deploy_err = err.downcast_ref::<DeployError>().unwrap();
        assert!(matches!(
            deploy_err,
            DeployError::RemoteCommandFailed { status: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_run_soft_failure_continues() {
        let fake = Arc::new(FakeTransport {
            fail_on: vec!["service app stop".to_string()],
            ..Default::default()
        });
        let remote = remote_with(&fake);
        let output = remote.sudo_soft("service app stop").await.unwrap();
        assert!(!output.success());
        remote.run("echo next").await.unwrap();
        assert_eq!(fake.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_exists_and_file_roundtrip() {
        let fake = Arc::new(FakeTransport::default());
        fake.existing.lock().unwrap().push("/srv/app".to_string());
        let remote = remote_with(&fake);
        assert!(remote.exists("/srv/app").await.unwrap());
        assert!(!remote.exists("/srv/other").await.unwrap());

        remote
            .write_file("/tmp/x", "hello\n", Privilege::User)
            .await
            .unwrap();
        assert_eq!(
            remote.read_file("/tmp/x", Privilege::User).await.unwrap(),
            "hello\n"
        );
    }

    #[tokio::test]
    async fn test_checks_fail_when_host_unreachable() {
        let fake = Arc::new(FakeTransport {
            unreachable: true,
            ..Default::default()
        });
        let remote = remote_with(&fake);

        let err = remote.exists("/srv/app").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::RemoteCommandFailed { status: 255, .. })
        ));
        assert!(remote.contains("/home/deploy/.bashrc", "WORKON_HOME").await.is_err());
    }

    #[tokio::test]
    async fn test_contains_missing_file_is_false() {
        let fake = Arc::new(FakeTransport::default());
        let remote = remote_with(&fake);
        assert!(!remote.contains("/home/deploy/.bash_profile", "WORKON_HOME").await.unwrap());
        assert_eq!(
            fake.commands(),
            vec!["test -f /home/deploy/.bash_profile && grep -qF -- WORKON_HOME /home/deploy/.bash_profile"]
        );
    }

    #[tokio::test]
    async fn test_read_missing_file_names_path() {
        let fake = Arc::new(FakeTransport::default());
        let remote = remote_with(&fake);
        let err = remote
            .read_file("/tmp/missing", Privilege::User)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/tmp/missing"));
    }
}
