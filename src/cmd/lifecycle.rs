//! Lifecycle commands: `setup`, `update`, `deploy`, `start`, `stop`,
//! `restart`, `clean`, `put-config`, `put-settings`, `add-user`, `test`,
//! `commit`.
//!
//! Every command parses its environment and flag arguments before loading
//! the configuration, and loads the configuration before connecting.

use super::{connect, load, parse_envs, parse_flag};
use crate::Cli;
use anyhow::Result;
use sitedeploy::environment::Environment;
use sitedeploy::lifecycle::{Deployment, UpdateOptions};
use sitedeploy::remote::{LocalTransport, Remote};
use sitedeploy::ui;

#[derive(Debug, Clone, Copy)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

fn parse_env(env: &str) -> Result<Environment> {
    Ok(env.parse::<Environment>()?)
}

pub async fn cmd_setup(cli: &Cli, envs: &[String], mirror: &str) -> Result<()> {
    let targets = parse_envs(envs)?;
    let mirror = parse_flag("mirror", mirror)?;
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;

    Deployment::new(&config, &table, &remote)
        .setup(&targets, mirror)
        .await?;
    ui::success("Setup complete");
    Ok(())
}

pub async fn cmd_update(
    cli: &Cli,
    env: &str,
    update_settings: &str,
    upgrade_apps: &str,
    restart: bool,
) -> Result<()> {
    let env = parse_env(env)?;
    let options = UpdateOptions {
        update_settings: parse_flag("update-settings", update_settings)?,
        upgrade_apps: parse_flag("upgrade-apps", upgrade_apps)?,
    };
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;
    let deployment = Deployment::new(&config, &table, &remote);

    if restart {
        deployment.deploy(env, options).await?;
        ui::success(&format!("Deployed {}", env));
    } else {
        deployment.update(env, options).await?;
        ui::success(&format!("Updated {}", env));
    }
    Ok(())
}

pub async fn cmd_service(cli: &Cli, env: &str, action: ServiceAction) -> Result<()> {
    let env = parse_env(env)?;
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;
    let deployment = Deployment::new(&config, &table, &remote);

    match action {
        ServiceAction::Start => deployment.start(env).await?,
        ServiceAction::Stop => deployment.stop(env).await?,
        ServiceAction::Restart => deployment.restart(env).await?,
    }
    Ok(())
}

pub async fn cmd_clean(cli: &Cli, envs: &[String], clean_nginx: &str) -> Result<()> {
    use dialoguer::Confirm;

    let targets = parse_envs(envs)?;
    let clean_nginx = parse_flag("clean-nginx", clean_nginx)?;
    let (config, table) = load(cli)?;

    if !cli.yes {
        let names: Vec<&str> = targets.iter().map(|e| e.as_str()).collect();
        let confirm = Confirm::new()
            .with_prompt(format!(
                "This removes the code, logs, virtualenv and config files of {}. Continue?",
                names.join(", ")
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Clean cancelled");
            return Ok(());
        }
    }

    let remote = connect(&config)?;
    Deployment::new(&config, &table, &remote)
        .clean(&targets, clean_nginx)
        .await?;
    ui::success("Clean complete");
    Ok(())
}

pub async fn cmd_put_config(cli: &Cli, envs: &[String]) -> Result<()> {
    let targets = parse_envs(envs)?;
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;

    Deployment::new(&config, &table, &remote)
        .put_config_files(&targets)
        .await?;
    ui::success("Configuration files installed");
    Ok(())
}

pub async fn cmd_put_settings(cli: &Cli, env: &str) -> Result<()> {
    let env = parse_env(env)?;
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;

    Deployment::new(&config, &table, &remote)
        .put_settings_files(env)
        .await
}

pub async fn cmd_add_user(cli: &Cli, user: &str) -> Result<()> {
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;

    let password = Deployment::new(&config, &table, &remote)
        .add_user(user)
        .await?;
    ui::secret(&format!("Password for {} is", user), &password);
    Ok(())
}

pub async fn cmd_test(cli: &Cli, env: &str) -> Result<()> {
    let env = parse_env(env)?;
    let (config, table) = load(cli)?;
    let remote = connect(&config)?;

    Deployment::new(&config, &table, &remote)
        .run_tests(env)
        .await
}

pub async fn cmd_commit(cli: &Cli, env: &str, message: &str, push: &str) -> Result<()> {
    let env = parse_env(env)?;
    let push = parse_flag("push", push)?;
    let (config, table) = load(cli)?;
    // Commits are made in local checkouts; no host connection is needed.
    let remote = Remote::new(Box::new(LocalTransport::new(String::new())));

    Deployment::new(&config, &table, &remote)
        .commit(env, message, push)
        .await
}
