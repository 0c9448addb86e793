//! Shared helper functions for CLI commands
//!
//! Opening the project, its store and the signed-in session is the same
//! dance for almost every command, so it lives here.

use clap::ValueEnum;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::backend::Backend;
use crate::core::draft::FileDraftStore;
use crate::core::session::{Session, SessionFile};
use crate::core::{Config, Project};
use crate::schema::SchemaRegistry;

/// A discovered project with its layered configuration
pub struct Workspace {
    pub project: Project,
    pub config: Config,
}

impl Workspace {
    /// Find the project from `--project` or the current directory
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let project = match &global.project {
            Some(path) => Project::discover_from(path),
            None => Project::discover(),
        }
        .map_err(|e| miette::miette!("{}", e))?;
        let config = Config::load_for(Some(&project));
        Ok(Self { project, config })
    }

    /// Embedded section schemas with this project's overrides applied
    pub fn registry(&self) -> Result<Arc<SchemaRegistry>> {
        let mut registry = SchemaRegistry::load(Some(&self.project.schemas_dir()))
            .map_err(|e| miette::miette!("{}", e))?;
        if let Some(key) = &self.config.draft_key {
            registry.set_draft_key(key.clone());
        }
        Ok(Arc::new(registry))
    }

    pub fn backend(&self) -> Result<Arc<Backend>> {
        let backend = Backend::open(&self.project.db_path()).map_err(|e| miette::miette!("{}", e))?;
        Ok(Arc::new(backend))
    }

    pub fn session_file(&self) -> SessionFile {
        SessionFile::new(self.project.session_path())
    }

    /// The saved session, or an error telling the user to log in
    pub fn session(&self, backend: &Backend) -> Result<Session> {
        self.session_file()
            .resume(backend)
            .map_err(|e| miette::miette!("{}", e))
    }

    pub fn draft_store(&self, registry: &SchemaRegistry) -> FileDraftStore {
        FileDraftStore::new(self.project.drafts_dir(), registry.draft_key())
    }

    /// `--format`, else the configured default, else `auto`
    pub fn format(&self, global: &GlobalOpts) -> OutputFormat {
        if global.format != OutputFormat::Auto {
            return global.format;
        }
        self.config
            .default_format
            .as_deref()
            .and_then(|f| OutputFormat::from_str(f, true).ok())
            .unwrap_or(OutputFormat::Auto)
    }
}

/// Read section data from a JSON or YAML file
pub fn read_data_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("Cannot read {}: {}", path.display(), e))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yml::from_str(&content)
            .map_err(|e| miette::miette!("Invalid YAML in {}: {}", path.display(), e)),
        _ => serde_json::from_str(&content)
            .map_err(|e| miette::miette!("Invalid JSON in {}: {}", path.display(), e)),
    }
}

/// Print one record in a structured format (`auto` means YAML)
pub fn print_record<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
        }
        _ => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Format whole dollars with thousands separators
pub fn format_money(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(999.0), "$999");
        assert_eq!(format_money(1_500_000.0), "$1,500,000");
        assert_eq!(format_money(-1234.0), "-$1,234");
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_read_data_file_json_and_yaml() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("team.json");
        std::fs::write(&json, r#"{"teamSize": 3}"#).unwrap();
        assert_eq!(read_data_file(&json).unwrap()["teamSize"], 3);

        let yaml = dir.path().join("team.yaml");
        std::fs::write(&yaml, "teamSize: 4\ntechStack:\n  - Rust\n").unwrap();
        let value = read_data_file(&yaml).unwrap();
        assert_eq!(value["teamSize"], 4);
        assert_eq!(value["techStack"][0], "Rust");

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{").unwrap();
        assert!(read_data_file(&broken).is_err());
    }
}
