//! Committing local working copies before a deploy.
//!
//! Runs on the machine `sitedeploy` is invoked from, not on the target host:
//! the project and app directories of a non-production environment are the
//! developer's own checkouts.

use super::Deployment;
use crate::environment::Environment;
use crate::ui;
use anyhow::{Context, Result};
use git2::{IndexAddOption, Repository, Signature};
use std::path::Path;
use tokio::process::Command;

/// Stage every change in a working copy and commit it.
pub struct WorkingCopy {
    repo: Repository,
}

impl WorkingCopy {
    pub fn open(dir: &Path) -> Result<Self> {
        let repo = Repository::open(dir)
            .with_context(|| format!("Failed to open git repository: {}", dir.display()))?;
        Ok(Self { repo })
    }

    /// Commit all changes, untracked files included.
    ///
    /// Returns `None` when the tree is unchanged since HEAD.
    pub fn commit_all(&self, message: &str) -> Result<Option<String>> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self.head_commit();

        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                return Ok(None);
            }
        }

        let sig = self.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let commit_id = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        Ok(Some(commit_id.to_string()))
    }

    /// HEAD commit, or `None` on an unborn branch.
    fn head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    /// The user's configured identity, or a fixed one.
    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("sitedeploy", "sitedeploy@localhost")?),
        }
    }
}

/// Run `git push` in `dir`; true on success.
async fn push(dir: &Path) -> Result<bool> {
    let output = Command::new("git")
        .arg("push")
        .current_dir(dir)
        .output()
        .await
        .context("Failed to run git push")?;
    if !output.status.success() {
        tracing::warn!(
            dir = %dir.display(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "git push failed"
        );
    }
    Ok(output.status.success())
}

impl Deployment<'_> {
    /// Commit (and optionally push) every app checkout outside the project
    /// directory, then the project itself.
    ///
    /// Production is never committed. Failures in one working copy are
    /// reported and the next one is tried.
    pub async fn commit(&self, env: Environment, message: &str, push_changes: bool) -> Result<()> {
        if env.is_production() {
            ui::warning("Production is deployed from staging and is never committed.");
            return Ok(());
        }

        let project_dir = Path::new(&self.params(env).dir);
        ui::step(&format!("Commit in {}", env.as_str().to_uppercase()));

        for app in &self.config.apps {
            let app_dir = Path::new(&app.source(env).dir);
            if app_dir.starts_with(project_dir) {
                println!(
                    "The application {} is inside the project directory, no need to commit separately.",
                    app.name
                );
                continue;
            }
            println!(
                "Committing changes for application {} in {}.",
                app.name,
                app_dir.display()
            );
            commit_dir(app_dir, message, push_changes).await;
        }

        println!(
            "Committing changes in the project directory {}.",
            project_dir.display()
        );
        commit_dir(project_dir, message, push_changes).await;
        Ok(())
    }
}

async fn commit_dir(dir: &Path, message: &str, push_changes: bool) {
    let committed = WorkingCopy::open(dir).and_then(|copy| copy.commit_all(message));
    match committed {
        Ok(Some(id)) => ui::success(&format!("{} committed as {}", dir.display(), &id[..7])),
        Ok(None) => println!("Nothing to commit in {}.", dir.display()),
        Err(e) => ui::warning(&format!("{:#}", e)),
    }

    if push_changes {
        match push(dir).await {
            Ok(true) => ui::success(&format!("{} pushed", dir.display())),
            Ok(false) => ui::warning(&format!("git push failed in {}", dir.display())),
            Err(e) => ui::warning(&format!("{:#}", e)),
        }
    }
}
