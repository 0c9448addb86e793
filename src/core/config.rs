//! Configuration management with layered hierarchy

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::Project;

const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;

/// fundr configuration with layered hierarchy
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name shown on previews
    pub author: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// Seconds to wait for a submission
    pub submit_timeout_secs: Option<u64>,

    /// Override of the manifest's draft key
    pub draft_key: Option<String>,
}

impl Config {
    /// Load configuration from all sources for the discovered project
    pub fn load() -> Self {
        Self::load_for(Project::discover().ok().as_ref())
    }

    /// Load configuration from all sources, merging in priority order
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Global user config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read(&global_path) {
                config.merge(global);
            }
        }

        // 2. Project config (.fundr/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read(&project.config_path()) {
                config.merge(project_config);
            }
        }

        // 3. Environment variables
        config.merge(Self::from_env(|key| std::env::var(key).ok()));

        config
    }

    fn read(path: &std::path::Path) -> Option<Config> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    fn from_env(var: impl Fn(&str) -> Option<String>) -> Config {
        Config {
            author: var("FUNDR_AUTHOR"),
            default_format: var("FUNDR_FORMAT"),
            submit_timeout_secs: var("FUNDR_SUBMIT_TIMEOUT").and_then(|v| match v.parse() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!(value = %v, "FUNDR_SUBMIT_TIMEOUT is not a number of seconds");
                    None
                }
            }),
            draft_key: var("FUNDR_DRAFT_KEY"),
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "fundr")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.submit_timeout_secs.is_some() {
            self.submit_timeout_secs = other.submit_timeout_secs;
        }
        if other.draft_key.is_some() {
            self.draft_key = other.draft_key;
        }
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs.unwrap_or(DEFAULT_SUBMIT_TIMEOUT_SECS))
    }

    /// Get the author name, falling back to git config or username
    pub fn author(&self) -> String {
        if let Some(ref author) = self.author {
            return author.clone();
        }

        if let Ok(output) = std::process::Command::new("git")
            .args(["config", "user.name"])
            .output()
        {
            if output.status.success() {
                let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }
}
