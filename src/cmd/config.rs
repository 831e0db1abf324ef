//! Configuration view and validation commands: `sitedeploy config`.

use anyhow::Result;

use super::super::{Cli, ConfigCommands};
use super::load;

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &cli.config;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("sitedeploy configuration");
            println!("========================");
            println!();

            if !config_path.exists() {
                println!("No deploy.toml found at {}", config_path.display());
                println!();
                println!("Run 'sitedeploy init' to create one.");
                println!();
                return Ok(());
            }

            println!("Config file: {}", config_path.display());
            println!();

            let (config, _) = load(cli)?;
            let project = &config.project;
            println!("[project]");
            println!("  user = \"{}\"", project.user);
            println!("  name = \"{}\"", project.name);
            println!("  dir = \"{}\"", project.dir);
            println!("  logdir = \"{}\"", project.logdir);
            println!("  script_name = \"{}\"", project.script_name());
            println!("  repo_url = \"{}\"", project.repo_url);
            println!();

            if !config.apps.is_empty() {
                println!("[apps]");
                for app in &config.apps {
                    println!("  {}", app.name);
                }
                println!();
            }

            // Effective values, including env and CLI overrides
            println!("Effective values (with env/CLI overrides):");
            println!(
                "  host = \"{}\"",
                config.remote.host.as_deref().unwrap_or("(not set)")
            );
            println!("  transport = \"{}\"", config.remote.transport);
            println!("  sudo = \"{}\"", config.remote.sudo);
            println!(
                "  template_dir = \"{}\"",
                config.paths.template_dir.display()
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let (config, _) = load(cli)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }

    Ok(())
}
