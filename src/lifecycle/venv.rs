//! Per-environment virtualenvs and log directories.

use super::{Deployment, command_line};
use crate::environment::Environment;
use crate::remote::shell_quote;
use crate::ui;
use anyhow::{Context, Result};

impl Deployment<'_> {
    /// Create the log directory and virtualenv of each target and install
    /// the virtualenv packages into it.
    pub async fn setup_venvs(&self, targets: &[Environment], mirror: bool) -> Result<()> {
        let mirror = self.pip_mirror(mirror)?;
        for env in targets {
            ui::step(&format!("Creating virtualenv for {}", env));
            self.setup_venv(*env, &mirror)
                .await
                .with_context(|| format!("Creating virtualenv for {}", env))?;
        }
        Ok(())
    }

    async fn setup_venv(&self, env: Environment, mirror: &str) -> Result<()> {
        let params = self.params(env);

        // Log files are created by the project user so gunicorn and Nginx
        // can both write them.
        if !self.remote.exists(&params.logdir).await? {
            self.remote
                .run(format!("mkdir -p {}", shell_quote(&params.logdir)))
                .await?;
            for log in [
                &params.log_gunicorn,
                &params.log_nginx_access,
                &params.log_nginx_error,
            ] {
                self.remote
                    .run(format!(
                        "touch {}",
                        shell_quote(&format!("{}/{}", params.logdir, log))
                    ))
                    .await?;
            }
        }

        self.remote
            .run(format!("mkvirtualenv {}", params.name))
            .await?;

        for package in &self.config.packages.venv {
            self.remote
                .run(command_line(&[
                    &format!("workon {} && pip install", params.name),
                    package,
                    mirror,
                ]))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::remote::testing::FakeTransport;

    #[tokio::test]
    async fn test_setup_venvs_creates_logs_when_missing() {
        let harness = Harness::new();
        harness
            .deployment()
            .setup_venvs(&[Environment::Staging], false)
            .await
            .unwrap();

        let commands = harness.fake.commands();
        assert_eq!(
            commands,
            vec![
                "test -e /srv/logs/app_staging || test -L /srv/logs/app_staging",
                "mkdir -p /srv/logs/app_staging",
                "touch /srv/logs/app_staging/gunicorn.log",
                "touch /srv/logs/app_staging/nginx-access.log",
                "touch /srv/logs/app_staging/nginx-error.log",
                "mkvirtualenv app_staging",
                "workon app_staging && pip install django",
                "workon app_staging && pip install gunicorn",
            ]
        );
    }

    #[tokio::test]
    async fn test_setup_venvs_keeps_existing_logdir() {
        let harness = Harness::new();
        harness
            .fake
            .existing
            .lock()
            .unwrap()
            .push("/srv/logs/app".to_string());
        harness
            .deployment()
            .setup_venvs(&[Environment::Production], true)
            .await
            .unwrap();

        let commands = harness.fake.commands();
        assert!(!commands.iter().any(|c| c.starts_with("mkdir") || c.starts_with("touch")));
        assert!(commands.contains(
            &"workon app && pip install django --index-url=http://pypi.local/simple".to_string()
        ));
    }

    #[tokio::test]
    async fn test_setup_venvs_in_order_and_stops_on_failure() {
        let harness = Harness::with_fake(FakeTransport {
            fail_on: vec!["mkvirtualenv app_development".to_string()],
            ..Default::default()
        });
        let err = harness
            .deployment()
            .setup_venvs(&[Environment::Development, Environment::Staging], false)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("development"));
        assert!(harness.position("mkvirtualenv app_staging").is_none());
    }
}
