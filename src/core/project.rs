//! Project discovery - the nearest ancestor directory containing `.ngt/`

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::Config;
use crate::core::identity::RequestPrefix;

/// Name of the project metadata directory
pub const PROJECT_DIR: &str = ".ngt";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not an ngt project (no .ngt directory found in {0} or any parent). Run 'ngt init' first")]
    NotFound(PathBuf),

    #[error("Project already initialized at {0} (use --force to reinitialize)")]
    AlreadyInitialized(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An ngt project rooted at a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Discover the project containing the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Discover the project containing `start`
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        start
            .ancestors()
            .find(|dir| dir.join(PROJECT_DIR).is_dir())
            .map(|root| Self {
                root: root.to_path_buf(),
            })
            .ok_or_else(|| ProjectError::NotFound(start.to_path_buf()))
    }

    /// Create the project layout at `root`
    pub fn init(root: &Path, force: bool) -> Result<Self, ProjectError> {
        let project = Self {
            root: root.to_path_buf(),
        };
        if project.ngt_dir().exists() && !force {
            return Err(ProjectError::AlreadyInitialized(root.to_path_buf()));
        }

        std::fs::create_dir_all(project.ngt_dir())?;
        for prefix in [RequestPrefix::Chg, RequestPrefix::Exc] {
            std::fs::create_dir_all(project.requests_dir(prefix))?;
        }

        Ok(project)
    }

    /// Open a project at a known root without discovery
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ngt_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.ngt_dir().join("config.yaml")
    }

    pub fn teams_path(&self) -> PathBuf {
        self.ngt_dir().join("teams.yaml")
    }

    /// Pattern document directory named by `config.patterns_dir`
    pub fn patterns_dir(&self, config: &Config) -> PathBuf {
        self.resolve(&config.patterns_dir)
    }

    pub fn requests_dir(&self, prefix: RequestPrefix) -> PathBuf {
        self.root.join("requests").join(prefix.dir_name())
    }

    /// Resolve a configured path relative to the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
