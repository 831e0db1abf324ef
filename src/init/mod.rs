//! `sitedeploy init`: write a starter configuration and default templates.
//!
//! ```text
//! <project>/
//! ├── deploy.toml
//! └── deploy/
//!     ├── run-project
//!     └── etc/
//!         ├── init/django-project.conf
//!         └── nginx/sites-available/django-project
//! ```
//!
//! Existing files are never overwritten.

use crate::template::DefaultTemplates;
use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::path::{Path, PathBuf};

/// Result of initializing a project directory.
#[derive(Debug, Default)]
pub struct InitResult {
    /// Files written
    pub created: Vec<PathBuf>,
    /// Files left alone because they already existed
    pub skipped: Vec<PathBuf>,
}

/// Write `deploy.toml` and the default templates into `project_dir`.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let mut result = InitResult::default();

    for relative in DefaultTemplates::paths() {
        let target = project_dir.join(&relative);
        if target.exists() {
            result.skipped.push(target);
            continue;
        }

        let file = DefaultTemplates::get(&relative)
            .with_context(|| format!("Missing embedded template: {}", relative))?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&target, file.data.as_ref())
            .with_context(|| format!("Failed to write {}", target.display()))?;
        result.created.push(target);
    }

    Ok(result)
}
