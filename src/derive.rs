//! Per-environment parameter records derived from the base configuration.
//!
//! `derive` expands one [`DeployConfig`] into three fully-resolved
//! [`EnvParams`] records:
//! - shared fields (user, inner dir, repository URL, settings path) are copied;
//! - name-like fields go through [`suffix`];
//! - domain and public IP/port come from each environment's own section;
//! - gunicorn tunables for development fall back to the staging values
//!   wherever development does not set its own.

use crate::environment::{Environment, suffix};
use crate::settings::DeployConfig;
use serde::Serialize;

/// Template file name of the gunicorn launcher script.
pub const RUN_SCRIPT_TEMPLATE: &str = "run-project";
/// Template file name of the Nginx site and Upstart job.
pub const SITE_TEMPLATE: &str = "django-project";

/// Everything an operation needs to know about one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvParams {
    pub environment: Environment,

    // Shared
    pub user: String,
    pub inner_dir: String,
    pub repo_url: String,
    pub settings_path: String,

    // Suffixed
    pub name: String,
    pub descriptive_name: String,
    pub dir: String,
    pub logdir: String,
    pub script_name: String,
    /// Launcher template copy used for this environment
    pub run_script_file: String,
    /// Site and job template copy used for this environment
    pub site_file: String,

    pub log_gunicorn: String,
    pub log_nginx_access: String,
    pub log_nginx_error: String,

    pub domain: String,
    pub public_ip: String,
    pub public_port: u16,

    pub gunicorn_loglevel: String,
    pub gunicorn_num_workers: u32,
    pub gunicorn_bind_ip: String,
    pub gunicorn_bind_port: u16,
}

impl EnvParams {
    /// gunicorn bind address, `ip:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.gunicorn_bind_ip, self.gunicorn_bind_port)
    }

    /// Nginx listen address, `ip:port`.
    pub fn public_address(&self) -> String {
        format!("{}:{}", self.public_ip, self.public_port)
    }
}

/// The three derived records, addressed by environment.
#[derive(Debug, Clone, Serialize)]
pub struct EnvTable {
    pub production: EnvParams,
    pub staging: EnvParams,
    pub development: EnvParams,
}

impl EnvTable {
    pub fn get(&self, env: Environment) -> &EnvParams {
        match env {
            Environment::Production => &self.production,
            Environment::Staging => &self.staging,
            Environment::Development => &self.development,
        }
    }
}

/// Build the parameter record for every environment.
pub fn derive(config: &DeployConfig) -> EnvTable {
    EnvTable {
        production: derive_one(config, Environment::Production),
        staging: derive_one(config, Environment::Staging),
        development: derive_one(config, Environment::Development),
    }
}

fn derive_one(config: &DeployConfig, env: Environment) -> EnvParams {
    let project = &config.project;
    let envs = &config.environments;

    let (endpoint, tunables) = match env {
        Environment::Production => (&envs.production.endpoint, envs.production.tunables.clone()),
        Environment::Staging => (&envs.staging.endpoint, envs.staging.tunables.clone()),
        Environment::Development => (
            &envs.development.endpoint,
            envs.development.overrides.resolve(&envs.staging.tunables),
        ),
    };

    EnvParams {
        environment: env,
        user: project.user.clone(),
        inner_dir: project.inner_dir.clone(),
        repo_url: project.repo_url.clone(),
        settings_path: project.settings_path.clone(),
        name: suffix(&project.name, env),
        descriptive_name: suffix(&project.descriptive_name, env),
        dir: suffix(&project.dir, env),
        logdir: suffix(&project.logdir, env),
        script_name: suffix(&project.script_name(), env),
        run_script_file: suffix(RUN_SCRIPT_TEMPLATE, env),
        site_file: suffix(SITE_TEMPLATE, env),
        log_gunicorn: config.logs.gunicorn.clone(),
        log_nginx_access: config.logs.nginx_access.clone(),
        log_nginx_error: config.logs.nginx_error.clone(),
        domain: endpoint.domain.clone(),
        public_ip: endpoint.nginx_ip.clone(),
        public_port: endpoint.nginx_port,
        gunicorn_loglevel: tunables.gunicorn_loglevel,
        gunicorn_num_workers: tunables.gunicorn_num_workers,
        gunicorn_bind_ip: tunables.gunicorn_bind_ip,
        gunicorn_bind_port: tunables.gunicorn_bind_port,
    }
}
