//! Configuration templates: rule lists, rendering and installation.
//!
//! Three templates live in the local template directory (`deploy/` by
//! default): the gunicorn launcher `run-project`, the Nginx site
//! `etc/nginx/sites-available/django-project` and the Upstart job
//! `etc/init/django-project.conf`. Default copies are compiled into the
//! binary and written out by `sitedeploy init`.

pub mod materialize;
pub mod rules;

pub use materialize::{InstallTargets, Materializer, TemplateFiles};
pub use rules::{LineRule, RenderContext};

use rust_embed::RustEmbed;

/// Default templates and starter `deploy.toml`.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/templates/"]
pub struct DefaultTemplates;

impl DefaultTemplates {
    /// Paths of the embedded template files, sorted.
    pub fn paths() -> Vec<String> {
        let mut paths: Vec<String> = Self::iter().map(|p| p.into_owned()).collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::derive;
    use crate::environment::Environment;
    use crate::settings::tests::sample_config;

    fn embedded_text(path: &str) -> String {
        let file = DefaultTemplates::get(path).unwrap();
        String::from_utf8(file.data.into_owned()).unwrap()
    }

    #[test]
    fn test_embedded_files_present() {
        let paths = DefaultTemplates::paths();
        assert!(paths.contains(&"deploy.toml".to_string()));
        assert!(paths.contains(&"deploy/run-project".to_string()));
        assert!(paths.contains(&"deploy/etc/nginx/sites-available/django-project".to_string()));
        assert!(paths.contains(&"deploy/etc/init/django-project.conf".to_string()));
    }

    #[test]
    fn test_starter_config_parses() {
        let content = embedded_text("deploy.toml");
        let config = crate::settings::DeployConfig::parse(&content).unwrap();
        assert_eq!(config.project.name, "shop");
        assert_eq!(
            config.environments.development.overrides.gunicorn_bind_port,
            Some(8002)
        );
    }

    #[test]
    fn test_default_run_script_renders_every_key_once() {
        let config = sample_config();
        let table = derive(&config);
        let ctx = RenderContext {
            params: table.get(Environment::Development),
            paths: &config.paths,
        };
        let template = embedded_text("deploy/run-project");
        let out = rules::render(&template, &rules::RUN_SCRIPT_RULES, &ctx);

        for expected in [
            "LOGFILE=/srv/logs/app_development/gunicorn.log",
            "LOGLEVEL=debug",
            "NUM_WORKERS=2",
            "BIND_ADDRESS=127.0.0.2:8002",
            "USER=deploy",
            "GROUP=deploy",
            "PROJECTDIR=/srv/app_development",
            "PROJECTENV=/home/deploy/.virtualenvs/app_development",
        ] {
            assert_eq!(out.lines().filter(|l| *l == expected).count(), 1, "{}", expected);
        }
        assert_eq!(out.lines().count(), template.lines().count());
    }

    #[test]
    fn test_default_site_renders() {
        let config = sample_config();
        let table = derive(&config);
        let ctx = RenderContext {
            params: table.get(Environment::Production),
            paths: &config.paths,
        };
        let template = embedded_text("deploy/etc/nginx/sites-available/django-project");
        let out = rules::render(&template, &rules::SITE_RULES, &ctx);

        assert!(out.contains("    listen 10.0.0.5:80;\n"));
        assert!(out.contains("server_name example.com www.example.com;"));
        assert!(out.contains("    access_log /srv/logs/app/nginx-access.log;\n"));
        assert!(out.contains("    error_log /srv/logs/app/nginx-error.log;\n"));
        assert!(out.contains("        root /srv/app;\n"));
        assert!(out.contains("        proxy_pass http://127.0.0.1:8000/;\n"));
        assert!(out.contains("proxy_set_header Host $host;"));
    }

    #[test]
    fn test_default_job_renders() {
        let config = sample_config();
        let table = derive(&config);
        let ctx = RenderContext {
            params: table.get(Environment::Staging),
            paths: &config.paths,
        };
        let template = embedded_text("deploy/etc/init/django-project.conf");
        let out = rules::render(&template, &rules::JOB_RULES, &ctx);
        assert!(out.starts_with("description \"The app_staging\"\n"));
        assert!(out.ends_with("exec /home/deploy/run-app_staging\n"));
        assert!(out.contains("respawn limit 10 5\n"));
    }
}
