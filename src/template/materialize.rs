//! Render the templates for each environment and install them.

use super::rules::{
    self, JOB_RULES, LineRule, NGINX_TUNING, RUN_SCRIPT_RULES, RenderContext, SITE_RULES,
};
use crate::derive::{EnvParams, EnvTable, RUN_SCRIPT_TEMPLATE, SITE_TEMPLATE};
use crate::environment::Environment;
use crate::remote::{Privilege, Remote, shell_quote};
use crate::settings::PathsSection;
use crate::ui;
use anyhow::{Context, Result};
use std::path::Path;

/// Site template path, relative to the template directory.
pub const SITE_TEMPLATE_DIR: &str = "etc/nginx/sites-available";
/// Job template path, relative to the template directory.
pub const JOB_TEMPLATE_DIR: &str = "etc/init";

/// Template copies used for one environment, relative to the uploaded template dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFiles {
    pub run_script: String,
    pub site: String,
    pub job: String,
}

impl TemplateFiles {
    /// The pristine templates.
    pub fn originals() -> Self {
        Self {
            run_script: RUN_SCRIPT_TEMPLATE.to_string(),
            site: format!("{}/{}", SITE_TEMPLATE_DIR, SITE_TEMPLATE),
            job: format!("{}/{}.conf", JOB_TEMPLATE_DIR, SITE_TEMPLATE),
        }
    }

    /// The copies for an environment; production uses the originals.
    pub fn for_env(params: &EnvParams) -> Self {
        Self {
            run_script: params.run_script_file.clone(),
            site: format!("{}/{}", SITE_TEMPLATE_DIR, params.site_file),
            job: format!("{}/{}.conf", JOB_TEMPLATE_DIR, params.site_file),
        }
    }
}

/// Where the rendered files of one environment end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTargets {
    pub run_script: String,
    pub site_available: String,
    pub site_enabled: String,
    pub job: String,
    pub job_link: String,
}

impl InstallTargets {
    pub fn new(params: &EnvParams, paths: &PathsSection) -> Self {
        Self {
            run_script: format!("{}/{}", paths.home_dir(&params.user), params.script_name),
            site_available: format!("{}/{}", paths.sites_available(), params.name),
            site_enabled: format!("{}/{}", paths.sites_enabled(), params.name),
            job: format!("{}/{}.conf", paths.init_dir, params.name),
            job_link: format!("{}/{}", paths.init_d_dir, params.name),
        }
    }
}

/// Renders and installs the launcher, site and job files.
pub struct Materializer<'a> {
    remote: &'a Remote,
    paths: &'a PathsSection,
    template_dir: &'a Path,
}

impl<'a> Materializer<'a> {
    pub fn new(remote: &'a Remote, paths: &'a PathsSection) -> Self {
        Self {
            remote,
            paths,
            template_dir: &paths.template_dir,
        }
    }

    /// Materialize every target, one after another.
    ///
    /// All template copies are made before any file is rendered: rendering
    /// rewrites files in place, so a copy taken later would carry another
    /// environment's values. A hard failure stops the run; files already
    /// installed for earlier targets stay in place.
    pub async fn materialize(&self, table: &EnvTable, targets: &[Environment]) -> Result<()> {
        if !self.template_dir.is_dir() {
            anyhow::bail!(
                "Template directory {} not found. Run 'sitedeploy init' to create it.",
                self.template_dir.display()
            );
        }

        self.tune_nginx_conf()
            .await
            .context("Failed to tune nginx.conf")?;

        let staged = self.paths.remote_template_dir();
        self.remote
            .run(format!("rm -rf {}", shell_quote(&staged)))
            .await?;
        self.remote
            .upload(self.template_dir, &self.paths.staging_dir)
            .await
            .context("Failed to upload templates")?;

        for env in targets {
            ui::step(&format!("Copying configuration files for {}", env));
            self.duplicate_templates(&staged, table.get(*env))
                .await
                .with_context(|| format!("Copying configuration files for {}", env))?;
        }

        for env in targets {
            ui::step(&format!("Setting up configuration files for {}", env));
            self.install_one(&staged, table.get(*env))
                .await
                .with_context(|| format!("Installing configuration files for {}", env))?;
        }

        fix_venv_permission(self.remote, self.paths, &table.development.user).await?;
        self.remote
            .sudo_soft(format!(
                "rm {}",
                shell_quote(&format!("{}/default", self.paths.sites_enabled()))
            ))
            .await?;
        self.remote
            .run_soft(format!("rm -rf {}", shell_quote(&staged)))
            .await?;
        Ok(())
    }

    /// Copy the pristine templates to an environment's suffixed names.
    async fn duplicate_templates(&self, staged: &str, params: &EnvParams) -> Result<()> {
        if params.environment.is_production() {
            return Ok(());
        }
        let originals = TemplateFiles::originals();
        let copies = TemplateFiles::for_env(params);
        for (from, to) in [
            (&originals.run_script, &copies.run_script),
            (&originals.site, &copies.site),
            (&originals.job, &copies.job),
        ] {
            self.remote
                .run(format!(
                    "cp {} {}",
                    shell_quote(&format!("{}/{}", staged, from)),
                    shell_quote(&format!("{}/{}", staged, to))
                ))
                .await?;
        }
        Ok(())
    }

    async fn render_in_place(&self, path: &str, rules: &[LineRule], ctx: &RenderContext<'_>) -> Result<()> {
        let text = self.remote.read_file(path, Privilege::User).await?;
        let rendered = rules::render(&text, rules, ctx);
        self.remote
            .write_file(path, &rendered, Privilege::User)
            .await
    }

    async fn install_one(&self, staged: &str, params: &EnvParams) -> Result<()> {
        let files = TemplateFiles::for_env(params);
        let targets = InstallTargets::new(params, self.paths);
        let ctx = RenderContext {
            params,
            paths: self.paths,
        };
        let staged_path = |relative: &str| format!("{}/{}", staged, relative);

        self.render_in_place(&staged_path(&files.run_script), &RUN_SCRIPT_RULES, &ctx)
            .await?;
        self.render_in_place(&staged_path(&files.site), &SITE_RULES, &ctx)
            .await?;
        self.render_in_place(&staged_path(&files.job), &JOB_RULES, &ctx)
            .await?;

        fix_venv_permission(self.remote, self.paths, &params.user).await?;

        self.remote
            .run(format!(
                "cp {} {}",
                shell_quote(&staged_path(&files.run_script)),
                shell_quote(&targets.run_script)
            ))
            .await?;
        self.remote
            .run(format!("chmod u+x {}", shell_quote(&targets.run_script)))
            .await?;
        self.remote
            .sudo(format!(
                "cp {} {}",
                shell_quote(&staged_path(&files.site)),
                shell_quote(&targets.site_available)
            ))
            .await?;
        self.remote
            .sudo(format!(
                "cp {} {}",
                shell_quote(&staged_path(&files.job)),
                shell_quote(&targets.job)
            ))
            .await?;

        self.link_once(&targets.site_available, &targets.site_enabled)
            .await?;
        self.link_once(&self.paths.upstart_job, &targets.job_link)
            .await?;

        tracing::info!(
            environment = %params.environment,
            script = %targets.run_script,
            site = %targets.site_available,
            job = %targets.job,
            "configuration files installed"
        );
        Ok(())
    }

    /// Create `link` → `target` unless `link` already exists.
    pub async fn link_once(&self, target: &str, link: &str) -> Result<bool> {
        if self.remote.exists(link).await? {
            tracing::debug!(link, "symlink already present");
            return Ok(false);
        }
        self.remote
            .sudo(format!("ln -s {} {}", shell_quote(target), shell_quote(link)))
            .await?;
        Ok(true)
    }

    async fn tune_nginx_conf(&self) -> Result<()> {
        edit_nginx_conf(self.remote, self.paths, &NGINX_TUNING).await
    }
}

/// Rewrite nginx.conf with fixed line replacements (elevated).
pub async fn edit_nginx_conf(
    remote: &Remote,
    paths: &PathsSection,
    replacements: &[(regex::Regex, &'static str)],
) -> Result<()> {
    let conf = paths.nginx_conf();
    let text = remote.read_file(&conf, Privilege::Elevated).await?;
    let edited = rules::apply_fixed(&text, replacements);
    if edited != text {
        remote
            .write_file(&conf, &edited, Privilege::Elevated)
            .await?;
    }
    Ok(())
}

/// Give the project user back ownership of the virtualenvs (soft).
pub async fn fix_venv_permission(remote: &Remote, paths: &PathsSection, user: &str) -> Result<()> {
    remote
        .sudo_soft(format!(
            "chown -R {0}:{0} {1}",
            shell_quote(user),
            shell_quote(&paths.virtualenvs_dir(user))
        ))
        .await?;
    Ok(())
}
