//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-project state directory
pub const PROJECT_DIR: &str = ".fundr";

/// Represents a fundr project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .fundr/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::create(root)
    }

    /// Initialize even if .fundr/ exists; existing data is kept
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::create(root)
    }

    fn create(root: PathBuf) -> Result<Self, ProjectError> {
        let project = Self { root };
        for dir in [project.drafts_dir(), project.schemas_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        }
        if !project.config_path().exists() {
            std::fs::write(project.config_path(), Self::default_config())
                .map_err(|e| ProjectError::IoError(e.to_string()))?;
        }
        Ok(project)
    }

    fn default_config() -> &'static str {
        r#"# fundr project configuration

# Name shown on previews (defaults to the git user or $USER)
# author: ""

# Default output format (auto, yaml, tsv, json, csv, md, id)
# default_format: auto

# Seconds to wait for a profile submission before reporting a timeout
# submit_timeout_secs: 30

# Key the wizard draft is stored under (defaults to the wizard manifest)
# draft_key: startupFormData
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .fundr state directory
    pub fn fundr_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.fundr_dir().join("config.yaml")
    }

    /// Embedded document store
    pub fn db_path(&self) -> PathBuf {
        self.fundr_dir().join("fundr.db")
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.fundr_dir().join("drafts")
    }

    /// Section schema and layout overrides
    pub fn schemas_dir(&self) -> PathBuf {
        self.fundr_dir().join("schemas")
    }

    pub fn session_path(&self) -> PathBuf {
        self.fundr_dir().join("session.json")
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not a fundr project (searched from {searched_from:?}). Run 'fundr init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("fundr project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.fundr_dir().is_dir());
        assert!(project.config_path().exists());
        assert!(project.drafts_dir().is_dir());
        assert!(project.schemas_dir().is_dir());
        assert!(!project.db_path().exists());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_project_discover_finds_fundr_dir() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_fundr_dir() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }
}
