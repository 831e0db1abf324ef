//! Server-wide provisioning and user management.

use super::{Deployment, command_line};
use crate::errors::DeployError;
use crate::remote::{RemoteCommand, shell_quote};
use crate::template::materialize::fix_venv_permission;
use crate::ui;
use anyhow::{Context, Result};
use rand::Rng;

/// Shell startup files that get the virtualenvwrapper lines.
const SHELL_PROFILES: [&str; 2] = [".bash_profile", ".bashrc"];

/// Lines appended to each profile, with the text that marks them present.
const PROFILE_LINES: [(&str, &str); 2] = [
    (
        "export WORKON_HOME",
        "export WORKON_HOME=$HOME/.virtualenvs",
    ),
    (
        "source /usr/local/bin/virtualenvwrapper.sh",
        "source /usr/local/bin/virtualenvwrapper.sh",
    ),
];

const PASSWORD_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PASSWORD_LEN: usize = 8;

impl Deployment<'_> {
    /// Install system packages, global pip packages and the
    /// virtualenvwrapper shell setup for the project user.
    pub async fn setup_server(&self, mirror: bool) -> Result<()> {
        let mirror = self.pip_mirror(mirror)?;
        let packages = &self.config.packages;
        let user = &self.config.project.user;

        ui::step("Installing system packages");
        for package in &packages.ubuntu {
            self.remote
                .sudo(format!("apt-get -y install {}", package))
                .await?;
        }

        self.remote
            .sudo(command_line(&["pip install pip --upgrade", &mirror]))
            .await?;
        for package in &packages.pip {
            self.remote
                .sudo(command_line(&["pip install", package, &mirror]))
                .await?;
        }
        self.remote
            .sudo(command_line(&["pip install distribute --upgrade", &mirror]))
            .await?;

        fix_venv_permission(self.remote, &self.config.paths, user).await?;

        let home = self.config.paths.home_dir(user);
        for profile in SHELL_PROFILES {
            let path = format!("{}/{}", home, profile);
            for (marker, line) in PROFILE_LINES {
                if !self.remote.contains(&path, marker).await? {
                    self.remote
                        .run(format!(
                            "echo {} >> {}",
                            shell_quote(line),
                            shell_quote(&path)
                        ))
                        .await?;
                }
            }
        }

        tracing::info!(user = %user, "server provisioned");
        Ok(())
    }

    /// Create a login user with sudo rights and a random password.
    ///
    /// Returns the password; it is not stored anywhere.
    pub async fn add_user(&self, user: &str) -> Result<String> {
        if user.is_empty()
            || !user
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(DeployError::InvalidSetting {
                key: "user".to_string(),
                message: format!("'{}' is not a valid user name", user),
            }
            .into());
        }

        self.remote
            .sudo(format!("useradd {} -s /bin/bash -m", user))
            .await
            .with_context(|| format!("Adding user {}", user))?;
        self.remote
            .sudo(format!(
                "echo {} >> /etc/sudoers",
                shell_quote(&format!("{} ALL=(ALL) ALL", user))
            ))
            .await?;

        let password = random_password();
        // Password goes over stdin so it never shows up in a process list.
        self.remote
            .exec(RemoteCommand::elevated("chpasswd").with_stdin(format!("{}:{}\n", user, password)))
            .await
            .with_context(|| format!("Setting the password for {}", user))?;

        Ok(password)
    }
}

fn random_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LEN)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}
