//! Starting and stopping Nginx and the gunicorn service.

use super::{Deployment, UpdateOptions};
use crate::environment::Environment;
use crate::ui;
use anyhow::{Context, Result};

impl Deployment<'_> {
    /// Start Nginx, then the environment's service.
    ///
    /// A service that fails to start is reported as already running.
    pub async fn start(&self, env: Environment) -> Result<()> {
        self.remote
            .sudo("service nginx start")
            .await
            .with_context(|| format!("Starting nginx for {}", env))?;

        let name = &self.params(env).name;
        let output = self.remote.sudo_soft(format!("service {} start", name)).await?;
        if !output.success() {
            ui::warning(&format!("{} already running.", name));
        }
        Ok(())
    }

    /// Stop Nginx, then the environment's service.
    pub async fn stop(&self, env: Environment) -> Result<()> {
        self.remote
            .sudo("service nginx stop")
            .await
            .with_context(|| format!("Stopping nginx for {}", env))?;

        let name = &self.params(env).name;
        let output = self.remote.sudo_soft(format!("service {} stop", name)).await?;
        if !output.success() {
            ui::warning(&format!("{} was not running.", name));
        }
        Ok(())
    }

    pub async fn restart(&self, env: Environment) -> Result<()> {
        self.stop(env).await?;
        self.start(env).await
    }

    /// Update code and apps, then restart.
    pub async fn deploy(&self, env: Environment, options: UpdateOptions) -> Result<()> {
        self.update(env, options).await?;
        self.restart(env).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::remote::testing::FakeTransport;

    #[tokio::test]
    async fn test_start_sequence() {
        let harness = Harness::new();
        harness.deployment().start(Environment::Staging).await.unwrap();
        assert_eq!(
            harness.fake.commands(),
            vec!["service nginx start", "service app_staging start"]
        );
    }

    #[tokio::test]
    async fn test_start_already_running_is_not_an_error() {
        let harness = Harness::with_fake(FakeTransport {
            fail_on: vec!["service app start".to_string()],
            ..Default::default()
        });
        harness
            .deployment()
            .start(Environment::Production)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_nginx_failure_is_hard() {
        let harness = Harness::with_fake(FakeTransport {
            fail_on: vec!["service nginx stop".to_string()],
            ..Default::default()
        });
        let err = harness
            .deployment()
            .stop(Environment::Development)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("development"));
        assert_eq!(harness.fake.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_stops_then_starts() {
        let harness = Harness::new();
        harness
            .deployment()
            .restart(Environment::Development)
            .await
            .unwrap();
        assert_eq!(
            harness.fake.commands(),
            vec![
                "service nginx stop",
                "service app_development stop",
                "service nginx start",
                "service app_development start",
            ]
        );
    }

    #[tokio::test]
    async fn test_deploy_updates_before_restart() {
        let harness = Harness::new();
        harness
            .deployment()
            .deploy(Environment::Staging, UpdateOptions::default())
            .await
            .unwrap();

        let clone = harness
            .position("git clone git@github.com:deploy/app.git /srv/app_staging")
            .unwrap();
        let apps = harness
            .position("workon app_staging && pip install git+ssh://git@host/blog.git")
            .unwrap();
        let stop = harness.position("service nginx stop").unwrap();
        let start = harness.position("service app_staging start").unwrap();
        assert!(clone < apps && apps < stop && stop < start);
    }
}
