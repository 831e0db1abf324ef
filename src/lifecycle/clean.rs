//! Removing an environment from the host.

use super::Deployment;
use crate::environment::Environment;
use crate::remote::shell_quote;
use crate::template::materialize::{InstallTargets, edit_nginx_conf, fix_venv_permission};
use crate::template::rules::NGINX_TUNING_REVERT;
use crate::ui;
use anyhow::{Context, Result};

impl Deployment<'_> {
    /// Stop and remove everything installed for each target.
    ///
    /// Removals are soft: a missing file or a stopped service is logged and
    /// the clean carries on.
    pub async fn clean(&self, targets: &[Environment], clean_nginx: bool) -> Result<()> {
        self.remote.sudo_soft("service nginx stop").await?;

        for env in targets {
            ui::step(&format!(
                "Cleaning configuration files and stopping services for {}",
                env
            ));
            self.clean_one(*env).await?;
        }

        if clean_nginx {
            edit_nginx_conf(self.remote, &self.config.paths, &NGINX_TUNING_REVERT)
                .await
                .context("Failed to restore nginx.conf")?;
        }

        fix_venv_permission(self.remote, &self.config.paths, &self.config.project.user).await
    }

    async fn clean_one(&self, env: Environment) -> Result<()> {
        let params = self.params(env);
        let installed = InstallTargets::new(params, &self.config.paths);

        let output = self
            .remote
            .sudo_soft(format!("service {} stop", params.name))
            .await?;
        if !output.success() {
            ui::warning(&format!("{} was not running.", params.name));
        }

        for app in &self.config.apps {
            self.remote
                .run_soft(format!(
                    "workon {} && pip uninstall -y {}",
                    params.name, app.name
                ))
                .await?;
        }

        self.remote
            .sudo_soft(format!("rm -rf {}", shell_quote(&params.dir)))
            .await?;
        self.remote
            .sudo_soft(format!("rm -rf {}", shell_quote(&params.logdir)))
            .await?;
        // virtualenvwrapper is only loaded for the project user.
        self.remote
            .run_soft(format!("rmvirtualenv {}", params.name))
            .await?;

        for path in [
            &installed.run_script,
            &installed.site_enabled,
            &installed.site_available,
            &installed.job,
            &installed.job_link,
        ] {
            self.remote
                .sudo_soft(format!("rm {}", shell_quote(path)))
                .await?;
        }

        tracing::info!(environment = %env, "environment cleaned");
        Ok(())
    }
}
