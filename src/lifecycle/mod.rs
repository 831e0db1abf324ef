//! Lifecycle operations: setup, update, deploy, start/stop, clean.
//!
//! Every operation is a fixed sequence of commands issued through
//! [`Remote`], one at a time. Targets are processed in the order given.
//! A hard failure stops the operation; nothing is rolled back.
//!
//! | Module    | Operations                                              |
//! |-----------|---------------------------------------------------------|
//! | `server`  | `setup_server`, `add_user`                              |
//! | `venv`    | `setup_venvs`                                           |
//! | `project` | `update_project`, `put_settings_files`, `update_apps`, `update`, `run_tests` |
//! | `service` | `start`, `stop`, `restart`, `deploy`                    |
//! | `clean`   | `clean`                                                 |
//! | `commit`  | `commit` (local git)                                    |

pub mod clean;
pub mod commit;
pub mod project;
pub mod server;
pub mod service;
pub mod venv;

use crate::derive::{EnvParams, EnvTable};
use crate::environment::Environment;
use crate::errors::DeployError;
use crate::remote::Remote;
use crate::settings::DeployConfig;
use crate::template::Materializer;
use anyhow::{Context, Result};

/// Options shared by `update` and `deploy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Upload the local settings file after updating the code
    pub update_settings: bool,
    /// Pass `--upgrade` when installing git apps
    pub upgrade_apps: bool,
}

/// One run against one host.
pub struct Deployment<'a> {
    pub config: &'a DeployConfig,
    pub table: &'a EnvTable,
    pub remote: &'a Remote,
}

impl<'a> Deployment<'a> {
    pub fn new(config: &'a DeployConfig, table: &'a EnvTable, remote: &'a Remote) -> Self {
        Self {
            config,
            table,
            remote,
        }
    }

    pub(crate) fn params(&self, env: Environment) -> &'a EnvParams {
        self.table.get(env)
    }

    /// Extra pip arguments for `--mirror`; empty when no mirror is requested.
    pub(crate) fn pip_mirror(&self, mirror: bool) -> Result<String, DeployError> {
        if !mirror {
            return Ok(String::new());
        }
        match &self.config.packages.mirror_url {
            Some(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
            _ => Err(DeployError::MissingSetting {
                key: "packages.mirror_url".to_string(),
            }),
        }
    }

    /// Render and install the launcher, site and job files.
    pub async fn put_config_files(&self, targets: &[Environment]) -> Result<()> {
        Materializer::new(self.remote, &self.config.paths)
            .materialize(self.table, targets)
            .await
    }

    /// Provision the server, create the virtualenvs, install config files.
    pub async fn setup(&self, targets: &[Environment], mirror: bool) -> Result<()> {
        // Fail on a missing mirror before touching the host.
        self.pip_mirror(mirror)?;

        self.setup_server(mirror)
            .await
            .context("Setting up the server")?;
        self.setup_venvs(targets, mirror).await?;
        self.put_config_files(targets).await
    }
}

/// Join command words, dropping empty ones.
pub(crate) fn command_line(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
