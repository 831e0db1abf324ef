//! CLI command implementations.
//!
//! | Module      | Commands handled                                              |
//! |-------------|---------------------------------------------------------------|
//! | `lifecycle` | `Setup`, `Update`, `Deploy`, `Start`, `Stop`, `Restart`, `Clean`, `PutConfig`, `PutSettings`, `AddUser`, `Test`, `Commit` |
//! | `project`   | `Init`, `Env`                                                 |
//! | `config`    | `Config`                                                      |

pub mod config;
pub mod lifecycle;
pub mod project;

pub use config::cmd_config;
pub use lifecycle::{
    ServiceAction, cmd_add_user, cmd_clean, cmd_commit, cmd_put_config, cmd_put_settings,
    cmd_service, cmd_setup, cmd_test, cmd_update,
};
pub use project::{cmd_env, cmd_init};

use crate::Cli;
use anyhow::Result;
use sitedeploy::derive::{EnvTable, derive};
use sitedeploy::environment::{Environment, parse_targets};
use sitedeploy::errors::DeployError;
use sitedeploy::remote::Remote;
use sitedeploy::settings::{CliOverrides, DeployConfig};

/// Parse a y/n style flag value.
pub fn parse_flag(flag: &str, value: &str) -> Result<bool, DeployError> {
    match value.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" => Ok(true),
        "n" | "no" | "false" | "" => Ok(false),
        _ => Err(DeployError::InvalidFlag {
            flag: flag.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse one or more environment arguments into an ordered target list.
pub fn parse_envs(envs: &[String]) -> Result<Vec<Environment>, DeployError> {
    let targets = parse_targets(envs)?;
    if targets.is_empty() {
        return Err(DeployError::UnknownEnvironment(envs.join(",")));
    }
    Ok(targets)
}

/// Load the config with env/CLI overrides applied and derive the table.
pub fn load(cli: &Cli) -> Result<(DeployConfig, EnvTable)> {
    let mut config = DeployConfig::load(&cli.config)?;
    config.apply_overrides(&CliOverrides {
        host: cli.host.clone(),
        transport: cli.transport,
    })?;
    let table = derive(&config);
    Ok((config, table))
}

/// Connect to the configured host.
pub fn connect(config: &DeployConfig) -> Result<Remote> {
    let remote = Remote::from_settings(&config.remote)?;
    tracing::info!(target_host = %remote.describe(), "connected");
    Ok(remote)
}
