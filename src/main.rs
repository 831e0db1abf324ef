use anyhow::Result;
use clap::{Parser, Subcommand};
use sitedeploy::errors::DeployError;
use sitedeploy::settings::{CONFIG_FILE, TransportKind};
use sitedeploy::ui;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "sitedeploy")]
#[command(
    version,
    about = "Provision and deploy a gunicorn/Nginx web project across production, staging and development"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "SITEDEPLOY_CONFIG", default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Target host as user@host[:port]. Overrides remote.host.
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// How commands reach the host: ssh or local
    #[arg(long, global = true)]
    pub transport: Option<TransportKind>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the server, create virtualenvs and install config files
    Setup {
        /// Environments, comma-separated or repeated
        #[arg(required = true)]
        envs: Vec<String>,
        /// Install pip packages from packages.mirror_url (y/n)
        #[arg(long, default_value = "n")]
        mirror: String,
    },
    /// Update project code and companion apps
    Update {
        #[arg(default_value = "development")]
        env: String,
        /// Upload the local settings file (y/n)
        #[arg(long, default_value = "n")]
        update_settings: String,
        /// Upgrade git-installed apps (y/n)
        #[arg(long, default_value = "n")]
        upgrade_apps: String,
    },
    /// Update, then restart
    Deploy {
        #[arg(default_value = "development")]
        env: String,
        #[arg(long, default_value = "n")]
        update_settings: String,
        #[arg(long, default_value = "n")]
        upgrade_apps: String,
    },
    /// Start Nginx and the project service
    Start {
        #[arg(default_value = "development")]
        env: String,
    },
    /// Stop Nginx and the project service
    Stop {
        #[arg(default_value = "development")]
        env: String,
    },
    Restart {
        #[arg(default_value = "development")]
        env: String,
    },
    /// Remove everything installed for the given environments
    Clean {
        #[arg(required = true)]
        envs: Vec<String>,
        /// Also revert the nginx.conf tuning (y/n)
        #[arg(long, default_value = "n")]
        clean_nginx: String,
    },
    /// Render and install the launcher, site and job files
    PutConfig {
        #[arg(required = true)]
        envs: Vec<String>,
    },
    /// Upload the local settings file
    PutSettings {
        #[arg(default_value = "development")]
        env: String,
    },
    /// Create a sudo-capable login user with a random password
    AddUser { user: String },
    /// Run the Django test suite on the host
    Test {
        #[arg(default_value = "development")]
        env: String,
    },
    /// Commit (and push) local project and app checkouts
    Commit {
        #[arg(default_value = "development")]
        env: String,
        #[arg(short, long)]
        message: String,
        /// Push after committing (y/n)
        #[arg(long, default_value = "n")]
        push: String,
    },
    /// Print the derived parameters of one or all environments
    Env {
        env: Option<String>,
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Write deploy.toml and the default templates
    Init,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    sitedeploy::logging::init(cli.verbose);

    if let Err(err) = run(&cli).await {
        let configuration = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<DeployError>())
            .any(DeployError::is_configuration_error);
        let label = if configuration {
            "Configuration error"
        } else {
            "Error"
        };
        ui::failure(&format!("{}: {:#}", label, err));
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Setup { envs, mirror } => cmd::cmd_setup(cli, envs, mirror).await?,
        Commands::Update {
            env,
            update_settings,
            upgrade_apps,
        } => cmd::cmd_update(cli, env, update_settings, upgrade_apps, false).await?,
        Commands::Deploy {
            env,
            update_settings,
            upgrade_apps,
        } => cmd::cmd_update(cli, env, update_settings, upgrade_apps, true).await?,
        Commands::Start { env } => cmd::cmd_service(cli, env, cmd::ServiceAction::Start).await?,
        Commands::Stop { env } => cmd::cmd_service(cli, env, cmd::ServiceAction::Stop).await?,
        Commands::Restart { env } => {
            cmd::cmd_service(cli, env, cmd::ServiceAction::Restart).await?
        }
        Commands::Clean { envs, clean_nginx } => cmd::cmd_clean(cli, envs, clean_nginx).await?,
        Commands::PutConfig { envs } => cmd::cmd_put_config(cli, envs).await?,
        Commands::PutSettings { env } => cmd::cmd_put_settings(cli, env).await?,
        Commands::AddUser { user } => cmd::cmd_add_user(cli, user).await?,
        Commands::Test { env } => cmd::cmd_test(cli, env).await?,
        Commands::Commit { env, message, push } => {
            cmd::cmd_commit(cli, env, message, push).await?
        }
        Commands::Env { env, json } => cmd::cmd_env(cli, env.as_deref(), *json)?,
        Commands::Init => cmd::cmd_init(cli)?,
        Commands::Config { command } => cmd::cmd_config(cli, command.clone())?,
    }

    Ok(())
}
