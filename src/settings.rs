//! Deployment configuration loaded from `deploy.toml`.
//!
//! The file is read once at startup. Environment variables and CLI flags are
//! layered on top (file → environment → CLI) and the resulting value is passed
//! explicitly to every operation; nothing here is global.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! user = "deploy"
//! name = "shop"
//! descriptive_name = "The shop project"
//! dir = "/home/deploy/shop"
//! inner_dir = "shop"
//! logdir = "/home/deploy/logs/shop"
//! settings_path = "/home/deploy/settings/shop_local_settings.py"
//! repo_url = "git@github.com:deploy/shop.git"
//!
//! [environments.production]
//! domain = "example.com"
//! nginx_ip = "192.168.0.185"
//! nginx_port = 80
//! gunicorn_loglevel = "info"
//! gunicorn_num_workers = 3
//! gunicorn_bind_ip = "127.0.0.1"
//! gunicorn_bind_port = 8000
//!
//! [environments.staging]
//! # same keys as production
//!
//! [environments.development]
//! domain = "development.example.com"
//! nginx_ip = "192.168.0.185"
//! nginx_port = 82
//! gunicorn_bind_port = 8002   # unset gunicorn_* keys fall back to staging
//!
//! [remote]
//! host = "deploy@192.168.0.185"
//! ```

use crate::environment::Environment;
use crate::errors::DeployError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, relative to the working directory.
pub const CONFIG_FILE: &str = "deploy.toml";

/// Environment variable overriding `remote.host`.
pub const HOST_ENV: &str = "SITEDEPLOY_HOST";
/// Environment variable overriding `remote.transport`.
pub const TRANSPORT_ENV: &str = "SITEDEPLOY_TRANSPORT";
/// Environment variable overriding `remote.sudo`.
pub const SUDO_ENV: &str = "SITEDEPLOY_SUDO";

/// Settings shared by every environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Account that owns the project files and runs gunicorn
    pub user: String,
    /// Used for the virtualenv, the service and the installed config files
    pub name: String,
    /// Used as the Upstart job description
    pub descriptive_name: String,
    /// Project checkout directory (no trailing slash)
    pub dir: String,
    /// Inner Django project directory, relative to `dir`
    pub inner_dir: String,
    /// Directory holding gunicorn and Nginx logs
    pub logdir: String,
    /// Launcher script name; defaults to `run-<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_name: Option<String>,
    /// Local settings file uploaded by `put-settings`, relative to the config file
    pub settings_path: String,
    #[serde(default = "default_repo_type")]
    pub repo_type: String,
    pub repo_url: String,
}

fn default_repo_type() -> String {
    "git".to_string()
}

impl ProjectSection {
    pub fn script_name(&self) -> String {
        self.script_name
            .clone()
            .unwrap_or_else(|| format!("run-{}", self.name))
    }
}

/// Log file names, shared across environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsSection {
    #[serde(default = "default_log_gunicorn")]
    pub gunicorn: String,
    #[serde(default = "default_log_nginx_access")]
    pub nginx_access: String,
    #[serde(default = "default_log_nginx_error")]
    pub nginx_error: String,
}

fn default_log_gunicorn() -> String {
    "gunicorn.log".to_string()
}

fn default_log_nginx_access() -> String {
    "nginx-access.log".to_string()
}

fn default_log_nginx_error() -> String {
    "nginx-error.log".to_string()
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            gunicorn: default_log_gunicorn(),
            nginx_access: default_log_nginx_access(),
            nginx_error: default_log_nginx_error(),
        }
    }
}

/// Public address Nginx listens on for one environment. Never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicEndpoint {
    pub domain: String,
    pub nginx_ip: String,
    pub nginx_port: u16,
}

/// gunicorn tunables, fully specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunables {
    pub gunicorn_loglevel: String,
    pub gunicorn_num_workers: u32,
    pub gunicorn_bind_ip: String,
    pub gunicorn_bind_port: u16,
}

/// gunicorn tunables where each field may be left to the staging value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunableOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gunicorn_loglevel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gunicorn_num_workers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gunicorn_bind_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gunicorn_bind_port: Option<u16>,
}

impl TunableOverrides {
    /// Resolve against a fallback, field by field.
    pub fn resolve(&self, fallback: &Tunables) -> Tunables {
        Tunables {
            gunicorn_loglevel: self
                .gunicorn_loglevel
                .clone()
                .unwrap_or_else(|| fallback.gunicorn_loglevel.clone()),
            gunicorn_num_workers: self
                .gunicorn_num_workers
                .unwrap_or(fallback.gunicorn_num_workers),
            gunicorn_bind_ip: self
                .gunicorn_bind_ip
                .clone()
                .unwrap_or_else(|| fallback.gunicorn_bind_ip.clone()),
            gunicorn_bind_port: self
                .gunicorn_bind_port
                .unwrap_or(fallback.gunicorn_bind_port),
        }
    }
}

/// Settings for production or staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSection {
    #[serde(flatten)]
    pub endpoint: PublicEndpoint,
    #[serde(flatten)]
    pub tunables: Tunables,
}

/// Settings for development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevelopmentSection {
    #[serde(flatten)]
    pub endpoint: PublicEndpoint,
    #[serde(flatten)]
    pub overrides: TunableOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentsSection {
    pub production: EnvironmentSection,
    pub staging: EnvironmentSection,
    pub development: DevelopmentSection,
}

/// Package lists installed by `setup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesSection {
    /// apt packages installed system-wide
    #[serde(default)]
    pub ubuntu: Vec<String>,
    /// pip packages installed system-wide
    #[serde(default)]
    pub pip: Vec<String>,
    /// pip packages installed into every virtualenv
    #[serde(default)]
    pub venv: Vec<String>,
    /// Extra pip arguments used when `--mirror y` is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_url: Option<String>,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            ubuntu: Vec::new(),
            pip: vec![
                "virtualenv".to_string(),
                "virtualenvwrapper".to_string(),
            ],
            venv: vec!["gunicorn".to_string()],
            mirror_url: None,
        }
    }
}

/// How an extra app is installed into the virtualenv.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppSourceType {
    /// `pip install <source>`, upgraded on request
    Git,
    /// `pip install -e <source>`
    Editable,
}

/// Where an extra app comes from in one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSource {
    #[serde(rename = "type")]
    pub source_type: AppSourceType,
    pub source: String,
    pub dir: String,
}

/// A companion app installed alongside the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    pub name: String,
    pub production: AppSource,
    pub staging: AppSource,
    pub development: AppSource,
}

impl AppSection {
    pub fn source(&self, env: Environment) -> &AppSource {
        match env {
            Environment::Production => &self.production,
            Environment::Staging => &self.staging,
            Environment::Development => &self.development,
        }
    }
}

/// Fixed system locations on the target host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_home_root")]
    pub home_root: String,
    #[serde(default = "default_nginx_dir")]
    pub nginx_dir: String,
    #[serde(default = "default_init_dir")]
    pub init_dir: String,
    #[serde(default = "default_init_d_dir")]
    pub init_d_dir: String,
    #[serde(default = "default_upstart_job")]
    pub upstart_job: String,
    /// Remote scratch directory the templates are uploaded into
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Local template directory, relative to the config file
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// site-packages path inside a virtualenv
    #[serde(default = "default_site_packages")]
    pub site_packages: String,
}

fn default_home_root() -> String {
    "/home".to_string()
}

fn default_nginx_dir() -> String {
    "/etc/nginx".to_string()
}

fn default_init_dir() -> String {
    "/etc/init".to_string()
}

fn default_init_d_dir() -> String {
    "/etc/init.d".to_string()
}

fn default_upstart_job() -> String {
    "/lib/init/upstart-job".to_string()
}

fn default_staging_dir() -> String {
    "/tmp".to_string()
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("deploy")
}

fn default_site_packages() -> String {
    "lib/python2.7/site-packages".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            home_root: default_home_root(),
            nginx_dir: default_nginx_dir(),
            init_dir: default_init_dir(),
            init_d_dir: default_init_d_dir(),
            upstart_job: default_upstart_job(),
            staging_dir: default_staging_dir(),
            template_dir: default_template_dir(),
            site_packages: default_site_packages(),
        }
    }
}

impl PathsSection {
    pub fn home_dir(&self, user: &str) -> String {
        format!("{}/{}", self.home_root, user)
    }

    pub fn virtualenvs_dir(&self, user: &str) -> String {
        format!("{}/.virtualenvs", self.home_dir(user))
    }

    pub fn sites_available(&self) -> String {
        format!("{}/sites-available", self.nginx_dir)
    }

    pub fn sites_enabled(&self) -> String {
        format!("{}/sites-enabled", self.nginx_dir)
    }

    pub fn nginx_conf(&self) -> String {
        format!("{}/nginx.conf", self.nginx_dir)
    }

    /// Remote directory the template tree is uploaded to.
    pub fn remote_template_dir(&self) -> String {
        let name = self
            .template_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "deploy".to_string());
        format!("{}/{}", self.staging_dir.trim_end_matches('/'), name)
    }
}

/// Which transport carries commands to the target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Ssh,
    Local,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Ssh => write!(f, "ssh"),
            TransportKind::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ssh" => Ok(TransportKind::Ssh),
            "local" => Ok(TransportKind::Local),
            _ => anyhow::bail!("Invalid transport '{}'. Valid values: ssh, local", s),
        }
    }
}

/// Connection settings for the target host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    /// `user@host` or `user@host:port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default)]
    pub transport: TransportKind,
    /// Command prefixed to elevated commands; empty disables escalation
    #[serde(default = "default_sudo")]
    pub sudo: String,
    /// Extra arguments passed to ssh and scp
    #[serde(default)]
    pub ssh_options: Vec<String>,
}

fn default_sudo() -> String {
    "sudo".to_string()
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            host: None,
            transport: TransportKind::default(),
            sudo: default_sudo(),
            ssh_options: Vec::new(),
        }
    }
}

/// The complete deploy.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    pub project: ProjectSection,
    #[serde(default)]
    pub logs: LogsSection,
    pub environments: EnvironmentsSection,
    #[serde(default)]
    pub packages: PackagesSection,
    #[serde(default)]
    pub apps: Vec<AppSection>,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

/// CLI values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub transport: Option<TransportKind>,
}

impl DeployConfig {
    /// Load configuration from a TOML file and check required values.
    ///
    /// Relative `paths.template_dir` and `project.settings_path` are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        if let Some(parent) = path.parent() {
            if config.paths.template_dir.is_relative() {
                config.paths.template_dir = parent.join(&config.paths.template_dir);
            }
            if Path::new(&config.project.settings_path).is_relative() {
                config.project.settings_path = parent
                    .join(&config.project.settings_path)
                    .display()
                    .to_string();
            }
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string and check required values.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse deploy.toml")?;
        config.ensure_complete()?;
        Ok(config)
    }

    /// Apply environment variable and CLI overrides (file → env → CLI).
    pub fn apply_overrides(&mut self, cli: &CliOverrides) -> Result<()> {
        if let Ok(host) = std::env::var(HOST_ENV) {
            if !host.is_empty() {
                self.remote.host = Some(host);
            }
        }
        if let Ok(transport) = std::env::var(TRANSPORT_ENV) {
            self.remote.transport = transport.parse()?;
        }
        if let Ok(sudo) = std::env::var(SUDO_ENV) {
            self.remote.sudo = sudo;
        }
        if let Some(host) = &cli.host {
            self.remote.host = Some(host.clone());
        }
        if let Some(transport) = cli.transport {
            self.remote.transport = transport;
        }
        Ok(())
    }

    /// Reject present-but-empty required values.
    pub fn ensure_complete(&self) -> Result<(), DeployError> {
        let required = [
            ("project.user", &self.project.user),
            ("project.name", &self.project.name),
            ("project.descriptive_name", &self.project.descriptive_name),
            ("project.dir", &self.project.dir),
            ("project.inner_dir", &self.project.inner_dir),
            ("project.logdir", &self.project.logdir),
            ("project.settings_path", &self.project.settings_path),
            ("project.repo_url", &self.project.repo_url),
            (
                "environments.production.domain",
                &self.environments.production.endpoint.domain,
            ),
            (
                "environments.staging.domain",
                &self.environments.staging.endpoint.domain,
            ),
            (
                "environments.development.domain",
                &self.environments.development.endpoint.domain,
            ),
            (
                "environments.production.nginx_ip",
                &self.environments.production.endpoint.nginx_ip,
            ),
            (
                "environments.staging.nginx_ip",
                &self.environments.staging.endpoint.nginx_ip,
            ),
            (
                "environments.development.nginx_ip",
                &self.environments.development.endpoint.nginx_ip,
            ),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(DeployError::MissingSetting {
                    key: key.to_string(),
                });
            }
        }

        if !self
            .project
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DeployError::InvalidSetting {
                key: "project.name".to_string(),
                message: "use only letters, digits, '_' and '-'".to_string(),
            });
        }

        for (key, tunables) in [
            ("environments.production", &self.environments.production.tunables),
            ("environments.staging", &self.environments.staging.tunables),
        ] {
            if tunables.gunicorn_num_workers == 0 {
                return Err(DeployError::InvalidSetting {
                    key: format!("{}.gunicorn_num_workers", key),
                    message: "must be at least 1".to_string(),
                });
            }
        }
        if self.environments.development.overrides.gunicorn_num_workers == Some(0) {
            return Err(DeployError::InvalidSetting {
                key: "environments.development.gunicorn_num_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.project.repo_type != "git" {
            return Err(DeployError::InvalidSetting {
                key: "project.repo_type".to_string(),
                message: format!("unsupported repository type '{}'", self.project.repo_type),
            });
        }

        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, value) in [
            ("project.dir", &self.project.dir),
            ("project.logdir", &self.project.logdir),
        ] {
            if value.len() > 1 && value.ends_with('/') {
                warnings.push(format!(
                    "{} '{}' has a trailing slash; suffixed names will be '{}/_staging'",
                    key,
                    value,
                    value.trim_end_matches('/')
                ));
            }
        }

        let prod = &self.environments.production;
        let staging = &self.environments.staging;
        let dev = &self.environments.development;
        let dev_tunables = dev.overrides.resolve(&staging.tunables);

        let binds = [
            (Environment::Production, prod.tunables.gunicorn_bind_ip.as_str(), prod.tunables.gunicorn_bind_port),
            (Environment::Staging, staging.tunables.gunicorn_bind_ip.as_str(), staging.tunables.gunicorn_bind_port),
            (Environment::Development, dev_tunables.gunicorn_bind_ip.as_str(), dev_tunables.gunicorn_bind_port),
        ];
        for (i, a) in binds.iter().enumerate() {
            for b in &binds[i + 1..] {
                if a.1 == b.1 && a.2 == b.2 {
                    warnings.push(format!(
                        "{} and {} both bind gunicorn to {}:{}",
                        a.0, b.0, a.1, a.2
                    ));
                }
            }
        }

        let endpoints = [
            (Environment::Production, &prod.endpoint),
            (Environment::Staging, &staging.endpoint),
            (Environment::Development, &dev.endpoint),
        ];
        for (i, (env_a, a)) in endpoints.iter().enumerate() {
            for (env_b, b) in &endpoints[i + 1..] {
                if a.nginx_ip == b.nginx_ip && a.nginx_port == b.nginx_port {
                    warnings.push(format!(
                        "{} and {} both listen on {}:{}",
                        env_a, env_b, a.nginx_ip, a.nginx_port
                    ));
                }
                if a.domain == b.domain {
                    warnings.push(format!(
                        "{} and {} share the domain '{}'",
                        env_a, env_b, a.domain
                    ));
                }
            }
        }

        if self.remote.host.is_none() && self.remote.transport == TransportKind::Ssh {
            warnings.push(format!(
                "No remote.host set; pass --host or set {}",
                HOST_ENV
            ));
        }

        warnings
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

    pub(crate) const SAMPLE: &str = r#"
[project]
user = "deploy"
name = "app"
descriptive_name = "The app"
dir = "/srv/app"
inner_dir = "app"
logdir = "/srv/logs/app"
settings_path = "/home/deploy/settings/app_local_settings.py"
repo_url = "git@github.com:deploy/app.git"

[environments.production]
domain = "example.com"
nginx_ip = "10.0.0.5"
nginx_port = 80
gunicorn_loglevel = "info"
gunicorn_num_workers = 4
gunicorn_bind_ip = "127.0.0.1"
gunicorn_bind_port = 8000

[environments.staging]
domain = "staging.example.com"
nginx_ip = "10.0.0.5"
nginx_port = 81
gunicorn_loglevel = "debug"
gunicorn_num_workers = 2
gunicorn_bind_ip = "127.0.0.2"
gunicorn_bind_port = 8001

[environments.development]
domain = "development.example.com"
nginx_ip = "10.0.0.6"
nginx_port = 82
gunicorn_bind_port = 8002
"#;

    pub(crate) fn sample_config() -> DeployConfig {
        DeployConfig::parse(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample_defaults() {
        let config = sample_config();
        assert_eq!(config.project.script_name(), "run-app");
        assert_eq!(config.project.repo_type, "git");
        assert_eq!(config.logs.gunicorn, "gunicorn.log");
        assert_eq!(config.paths.nginx_dir, "/etc/nginx");
        assert_eq!(config.paths.template_dir, PathBuf::from("deploy"));
        assert_eq!(config.remote.sudo, "sudo");
        assert_eq!(config.remote.transport, TransportKind::Ssh);
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_parse_development_overrides_are_optional() {
        let config = sample_config();
        let dev = &config.environments.development.overrides;
        assert_eq!(dev.gunicorn_bind_port, Some(8002));
        assert!(dev.gunicorn_loglevel.is_none());
        assert!(dev.gunicorn_bind_ip.is_none());
        assert!(dev.gunicorn_num_workers.is_none());
    }

    #[test]
    fn test_parse_missing_staging_tunable_fails() {
        let content = SAMPLE.replace("gunicorn_loglevel = \"debug\"\n", "");
        assert!(DeployConfig::parse(&content).is_err());
    }

    #[test]
    fn test_parse_missing_development_domain_fails() {
        let content = SAMPLE.replace("domain = \"development.example.com\"\n", "");
        assert!(DeployConfig::parse(&content).is_err());
    }

    #[test]
    fn test_parse_empty_required_value_is_missing_setting() {
        let content = SAMPLE.replace("user = \"deploy\"", "user = \"\"");
        let err = DeployConfig::parse(&content).unwrap_err();
        let deploy_err = err.downcast_ref::<DeployError>().unwrap();
        assert!(matches!(
            deploy_err,
            DeployError::MissingSetting { key } if key == "project.user"
        ));
    }

    #[test]
    fn test_parse_rejects_shell_unsafe_project_name() {
        for bad in ["my app", "app;reboot", "app$(id)"] {
            let content = SAMPLE.replacen("name = \"app\"", &format!("name = \"{}\"", bad), 1);
            let err = DeployConfig::parse(&content).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<DeployError>(),
                    Some(DeployError::InvalidSetting { key, .. }) if key == "project.name"
                ),
                "{} accepted",
                bad
            );
        }
        let content = SAMPLE.replacen("name = \"app\"", "name = \"my-app_2\"", 1);
        assert!(DeployConfig::parse(&content).is_ok());
    }

    #[test]
    fn test_parse_zero_workers_rejected() {
        let content = SAMPLE.replace("gunicorn_num_workers = 4", "gunicorn_num_workers = 0");
        let err = DeployConfig::parse(&content).unwrap_err();
        assert!(err.to_string().contains("gunicorn_num_workers"));
    }

    #[test]
    fn test_parse_apps() {
        let content = format!(
            "{}\n{}",
            SAMPLE,
            r#"
[[apps]]
name = "someapp"
production = { type = "git", source = "git+ssh://host/someapp.git", dir = "/home/deploy/djapps/someapp" }
staging = { type = "git", source = "git+ssh://host/someapp.git", dir = "/home/deploy/djapps/someapp_staging" }
development = { type = "editable", source = "/srv/app_development/someapp", dir = "/srv/app_development/someapp" }
"#
        );
        let config = DeployConfig::parse(&content).unwrap();
        assert_eq!(config.apps.len(), 1);
        let app = &config.apps[0];
        assert_eq!(app.source(Environment::Production).source_type, AppSourceType::Git);
        assert_eq!(
            app.source(Environment::Development).source_type,
            AppSourceType::Editable
        );
    }

    #[test]
    fn test_load_resolves_template_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();
        let config = DeployConfig::load(&path).unwrap();
        assert_eq!(config.paths.template_dir, dir.path().join("deploy"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = DeployConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_apply_overrides_precedence() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let mut config = sample_config();
        // SAFETY: serialized by ENV_MUTEX
        unsafe {
            std::env::set_var(HOST_ENV, "env@host");
            std::env::remove_var(TRANSPORT_ENV);
            std::env::remove_var(SUDO_ENV);
        }
        config.apply_overrides(&CliOverrides::default()).unwrap();
        assert_eq!(config.remote.host.as_deref(), Some("env@host"));

        config
            .apply_overrides(&CliOverrides {
                host: Some("cli@host".to_string()),
                transport: Some(TransportKind::Local),
            })
            .unwrap();
        assert_eq!(config.remote.host.as_deref(), Some("cli@host"));
        assert_eq!(config.remote.transport, TransportKind::Local);
        unsafe {
            std::env::remove_var(HOST_ENV);
        }
    }

    #[test]
    fn test_validate_clean_sample_with_host() {
        let mut config = sample_config();
        config.remote.host = Some("deploy@10.0.0.5".to_string());
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_validate_warns_on_trailing_slash_and_shared_ports() {
        let content = SAMPLE
            .replace("dir = \"/srv/app\"", "dir = \"/srv/app/\"")
            .replace("gunicorn_bind_port = 8002\n", "");
        let mut config = DeployConfig::parse(&content).unwrap();
        config.remote.transport = TransportKind::Local;
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("trailing slash")));
        assert!(
            warnings
                .iter()
                .any(|w| w.contains("staging and development both bind gunicorn"))
        );
    }

    #[test]
    fn test_transport_kind_from_str() {
        assert_eq!("SSH".parse::<TransportKind>().unwrap(), TransportKind::Ssh);
        assert_eq!(
            "local".parse::<TransportKind>().unwrap(),
            TransportKind::Local
        );
        assert!("telnet".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_remote_template_dir() {
        let mut paths = PathsSection::default();
        assert_eq!(paths.remote_template_dir(), "/tmp/deploy");
        paths.staging_dir = "/var/tmp/".to_string();
        paths.template_dir = PathBuf::from("/work/shop/templates");
        assert_eq!(paths.remote_template_dir(), "/var/tmp/templates");
    }
}
