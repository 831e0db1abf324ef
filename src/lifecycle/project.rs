//! Project code, settings file and companion apps.

use super::{Deployment, UpdateOptions, command_line};
use crate::environment::Environment;
use crate::remote::{Privilege, shell_quote};
use crate::settings::AppSourceType;
use crate::template::rules::substitute_lines;
use crate::ui;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

static DEBUG_ON: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^DEBUG = True$").unwrap());

/// Paths left out when production is synced from staging.
const RSYNC_EXCLUDES: [&str; 6] = [
    ".git",
    ".gitignore",
    "deploy",
    "local_settings*",
    "*.pyc",
    "*.pyo",
];

impl Deployment<'_> {
    /// Bring the project checkout of `env` up to date.
    ///
    /// Production is never cloned: it is synced from the staging checkout.
    pub async fn update_project(&self, env: Environment, update_settings: bool) -> Result<()> {
        let params = self.params(env);
        let dir = shell_quote(&params.dir);

        if env.is_production() {
            let staging = &self.params(Environment::Staging).dir;
            if self.remote.exists(staging).await? {
                let excludes: Vec<String> = RSYNC_EXCLUDES
                    .iter()
                    .map(|e| format!("--exclude={}", shell_quote(e)))
                    .collect();
                self.remote
                    .run(format!(
                        "rsync -az --delete-after {} {}/ {}",
                        excludes.join(" "),
                        shell_quote(staging),
                        dir
                    ))
                    .await?;
            } else {
                ui::warning(
                    "Staging environment doesn't exist. Create it before updating production on this host.",
                );
            }
        } else if self.remote.exists(&params.dir).await? {
            self.remote.run(format!("cd {} && git pull", dir)).await?;
        } else {
            self.remote
                .run(format!(
                    "git clone {} {}",
                    shell_quote(&params.repo_url),
                    dir
                ))
                .await?;
        }

        let static_dir = format!("{}/static", params.dir);
        if !self.remote.exists(&static_dir).await? {
            self.remote
                .run(format!("mkdir -p {}", shell_quote(&static_dir)))
                .await?;
        }

        let admin_static = format!("{}/admin", static_dir);
        if !self.remote.exists(&admin_static).await? {
            let django_admin = format!(
                "{}/{}/{}/django/contrib/admin/static/admin/",
                self.config.paths.virtualenvs_dir(&params.user),
                params.name,
                self.config.paths.site_packages
            );
            self.remote
                .run(format!(
                    "ln -s {} {}",
                    shell_quote(&django_admin),
                    shell_quote(&admin_static)
                ))
                .await?;
        }

        if update_settings {
            self.put_settings_files(env).await?;
        }
        Ok(())
    }

    /// Upload the local settings file as `<dir>/<inner_dir>/local_settings.py`.
    ///
    /// Production gets `DEBUG = False`. Nothing happens until the project
    /// has been checked out.
    pub async fn put_settings_files(&self, env: Environment) -> Result<()> {
        let params = self.params(env);
        let inner = format!("{}/{}", params.dir, params.inner_dir);

        if !self.remote.exists(&inner).await? {
            tracing::warn!(dir = %inner, "project not checked out, settings not uploaded");
            return Ok(());
        }

        let mut settings = std::fs::read_to_string(&params.settings_path)
            .with_context(|| format!("Failed to read settings file: {}", params.settings_path))?;
        if env.is_production() {
            settings = substitute_lines(&settings, &[(&*DEBUG_ON, "DEBUG = False".to_string())]);
        }

        self.remote
            .write_file(
                &format!("{}/local_settings.py", inner),
                &settings,
                Privilege::User,
            )
            .await
            .with_context(|| format!("Uploading settings for {}", env))
    }

    /// Install every companion app into the virtualenv of `env`.
    pub async fn update_apps(&self, env: Environment, upgrade_apps: bool) -> Result<()> {
        let params = self.params(env);
        for app in &self.config.apps {
            let source = app.source(env);
            let option = match source.source_type {
                AppSourceType::Git if upgrade_apps => "--upgrade",
                AppSourceType::Git => "",
                AppSourceType::Editable => "-e",
            };
            self.remote
                .run(command_line(&[
                    &format!("workon {} && pip install", params.name),
                    option,
                    &shell_quote(&source.source),
                ]))
                .await
                .with_context(|| format!("Installing app {}", app.name))?;
        }
        Ok(())
    }

    /// `update_project` followed by `update_apps`.
    pub async fn update(&self, env: Environment, options: UpdateOptions) -> Result<()> {
        ui::step(&format!("Updating {}", env));
        self.update_project(env, options.update_settings)
            .await
            .with_context(|| format!("Updating project for {}", env))?;
        self.update_apps(env, options.upgrade_apps)
            .await
            .with_context(|| format!("Updating apps for {}", env))
    }

    /// Run the Django test suite inside the project's virtualenv.
    pub async fn run_tests(&self, env: Environment) -> Result<()> {
        let params = self.params(env);
        self.remote
            .run(format!(
                "cd {} && workon {} && python manage.py test",
                shell_quote(&params.dir),
                params.name
            ))
            .await
            .with_context(|| format!("Running tests for {}", env))?;
        Ok(())
    }
}
