//! Project commands: `init` and `env`.

use super::load;
use crate::Cli;
use anyhow::{Context, Result};
use sitedeploy::derive::EnvParams;
use sitedeploy::environment::Environment;
use sitedeploy::ui;
use std::collections::BTreeMap;

pub fn cmd_init(cli: &Cli) -> Result<()> {
    use sitedeploy::init::init_project;

    let project_dir = match cli.config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => std::env::current_dir().context("Failed to get current directory")?,
    };
    let result = init_project(&project_dir)?;

    if result.created.is_empty() {
        println!("Already initialized in {}", project_dir.display());
        return Ok(());
    }

    println!("Initialized sitedeploy in {}", project_dir.display());
    for path in &result.created {
        ui::created(path);
    }
    for path in &result.skipped {
        println!("  kept existing {}", path.display());
    }
    println!();
    println!("Next steps:");
    println!("  1. Edit deploy.toml for your project and host");
    println!("  2. Run 'sitedeploy config validate'");
    println!("  3. Run 'sitedeploy setup production,staging,development'");
    Ok(())
}

/// Print derived parameters, keyed by environment name.
pub fn cmd_env(cli: &Cli, env: Option<&str>, json: bool) -> Result<()> {
    let selected: Vec<Environment> = match env {
        Some(name) => vec![name.parse::<Environment>()?],
        None => Environment::all().to_vec(),
    };
    let (_, table) = load(cli)?;

    let records: BTreeMap<&str, &EnvParams> = selected
        .iter()
        .map(|env| (env.as_str(), table.get(*env)))
        .collect();

    let output = if json {
        serde_json::to_string_pretty(&records)?
    } else {
        toml::to_string_pretty(&records)?
    };
    println!("{}", output.trim_end());
    Ok(())
}
