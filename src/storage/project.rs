//! Project management
//!
//! Resolves which store a command operates on and provides access to it.
//! Stores live outside the repository, one per project, at
//! `<data_dir>/<sanitized project root>/`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, TaskStore};
use crate::domain::TaskLifecycle;
use crate::session::SessionStore;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a git repository (bits requires a project root)")]
    NotInRepo,

    #[error("Could not determine home directory; set data_dir in the config or use --store")]
    NoHomeDir,
}

/// Finds the nearest ancestor of `start` (inclusive) that contains `.git`
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Converts an absolute path into a single directory name
///
/// `/Users/me/my project` becomes `Users-me-my-project`.
pub fn sanitize_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let raw = raw.trim_start_matches('/');

    let mut result = String::with_capacity(raw.len());
    let mut in_separator = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
            in_separator = false;
        } else if !in_separator {
            result.push('-');
            in_separator = true;
        }
    }

    result.trim_matches('-').to_string()
}

/// A resolved bits store plus the configuration it was opened with
pub struct Project {
    store_dir: PathBuf,
    config: Config,
}

impl Project {
    /// Opens the store for the current directory
    ///
    /// An explicit `store_dir` is used as-is; otherwise the store is derived
    /// from the enclosing git repository and the configured data directory.
    pub fn open_with(store_dir: Option<PathBuf>, config: Config) -> Result<Self> {
        let store_dir = match store_dir {
            Some(dir) => dir,
            None => {
                let cwd = env::current_dir().context("Failed to read current directory")?;
                Self::resolve_store_dir(&cwd, &config)?
            }
        };

        Ok(Self::at(store_dir, config))
    }

    /// Creates a project handle for a known store directory
    pub fn at(store_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            store_dir: store_dir.into(),
            config,
        }
    }

    /// Derives the store directory for a working directory
    pub fn resolve_store_dir(cwd: &Path, config: &Config) -> Result<PathBuf> {
        let root = find_project_root(cwd).ok_or(ProjectError::NotInRepo)?;
        let base = config.data_dir().ok_or(ProjectError::NoHomeDir)?;
        Ok(base.join(sanitize_path(&root)))
    }

    /// Returns the store directory
    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true if the store directory exists
    pub fn is_initialized(&self) -> bool {
        self.store_dir.is_dir()
    }

    /// Creates the store directory; with `force`, wipes it first
    pub fn init(&self, force: bool) -> Result<()> {
        if force && self.store_dir.exists() {
            fs::remove_dir_all(&self.store_dir).with_context(|| {
                format!("Failed to remove store: {}", self.store_dir.display())
            })?;
        }

        fs::create_dir_all(&self.store_dir)
            .with_context(|| format!("Failed to create store: {}", self.store_dir.display()))
    }

    /// Returns the task store
    pub fn task_store(&self) -> TaskStore {
        TaskStore::new(&self.store_dir)
    }

    /// Returns the session store
    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(&self.store_dir)
    }

    /// Returns a lifecycle controller over the task store
    pub fn lifecycle(&self) -> TaskLifecycle<TaskStore> {
        TaskLifecycle::new(self.task_store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_paths() {
        assert_eq!(
            sanitize_path(Path::new("/Users/me/myproject")),
            "Users-me-myproject"
        );
        assert_eq!(
            sanitize_path(Path::new("/home/me/my project/.repo")),
            "home-me-my-project-repo"
        );
        assert_eq!(sanitize_path(Path::new("/a//b__c/")), "a-b-c");
        assert_eq!(sanitize_path(Path::new("/")), "");
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        assert_eq!(find_project_root(&sub_dir), Some(dir.path().to_path_buf()));
        assert_eq!(
            find_project_root(dir.path()),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn resolve_store_dir_uses_data_dir() {
        let repo = TempDir::new().unwrap();
        fs::create_dir_all(repo.path().join(".git")).unwrap();
        let data = TempDir::new().unwrap();

        let config = Config {
            data_dir: Some(data.path().to_path_buf()),
            ..Default::default()
        };

        let store = Project::resolve_store_dir(repo.path(), &config).unwrap();
        assert_eq!(store, data.path().join(sanitize_path(repo.path())));
    }

    #[test]
    fn resolve_store_dir_outside_repo_fails() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        // Temp dirs are not normally inside a git checkout
        if find_project_root(dir.path()).is_none() {
            let err = Project::resolve_store_dir(dir.path(), &config).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ProjectError>(),
                Some(ProjectError::NotInRepo)
            ));
        }
    }

    #[test]
    fn init_creates_and_force_wipes() {
        let dir = TempDir::new().unwrap();
        let project = Project::at(dir.path().join("store"), Config::default());

        assert!(!project.is_initialized());
        project.init(false).unwrap();
        assert!(project.is_initialized());

        let marker = project.store_dir().join("abc.md");
        fs::write(&marker, "x").unwrap();

        project.init(false).unwrap();
        assert!(marker.exists());

        project.init(true).unwrap();
        assert!(project.is_initialized());
        assert!(!marker.exists());
    }

    #[test]
    fn stores_share_the_store_dir() {
        let dir = TempDir::new().unwrap();
        let project = Project::at(dir.path(), Config::default());

        assert_eq!(project.task_store().dir(), dir.path());
        assert_eq!(project.session_store().dir(), dir.path());
    }
}
