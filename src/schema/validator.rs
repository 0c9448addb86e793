//! Section validation with field-level error reporting

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::schema::field::{join_path, pointer_to_path, FieldError, Pass};
use crate::schema::registry::{RegistryError, SchemaRegistry, Section};

/// Result of validating one section's data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Errors reported against one field path
    pub fn errors_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field_path == path)
    }

    pub fn has_error_for(&self, path: &str) -> bool {
        self.errors_for(path).next().is_some()
    }
}

/// Validates section data against the registered schemas
#[derive(Debug, Clone)]
pub struct SectionValidator {
    registry: Arc<SchemaRegistry>,
}

impl SectionValidator {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate the complete current data of a section
    pub fn validate(&self, section_id: &str, data: &Value) -> Result<ValidationResult, RegistryError> {
        let section = self
            .registry
            .get(section_id)
            .ok_or_else(|| RegistryError::UnknownSection(section_id.to_string()))?;
        Ok(validate_section(section, data))
    }
}

/// Check every declared constraint and report all violations.
///
/// The field walk runs first, in declaration order. Cross-field allocation
/// errors follow it. The compiled schema then catches constraints the walk
/// does not model; its errors are kept only for paths not yet reported and
/// not belonging to a conditional field whose toggle is off.
pub fn validate_section(section: &Section, data: &Value) -> ValidationResult {
    let mut pass = Pass::default();

    let Some(map) = data.as_object() else {
        return ValidationResult::from_errors(vec![FieldError::new(
            "",
            format!("{} data must be an object", section.title()),
        )]);
    };
    section.root().check("", map, &mut pass);

    let mut errors = pass.errors;
    errors.append(&mut pass.deferred);

    for error in section.compiled().iter_errors(data) {
        let mut path = pointer_to_path(error.instance_path.as_str());
        if let jsonschema::error::ValidationErrorKind::Required { property } = &error.kind {
            if let Some(name) = property.as_str() {
                path = join_path(&path, name);
            }
        }
        let reported = errors.iter().any(|e| e.field_path == path);
        let inactive = pass.inactive.iter().any(|p| is_within(&path, p));
        if reported || inactive {
            continue;
        }
        debug!(section = section.id(), path = %path, "schema-only violation");
        errors.push(FieldError::new(path, error.to_string()));
    }

    debug!(
        section = section.id(),
        errors = errors.len(),
        "validated section"
    );
    ValidationResult::from_errors(errors)
}

/// Whether `path` is `base` or lies underneath it
fn is_within(path: &str, base: &str) -> bool {
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

/// Validation failures rendered as a diagnostic for the CLI
#[derive(Debug, Error, Diagnostic)]
#[error("Section '{section}' is invalid: {summary}")]
#[diagnostic(
    code(fundr::schema::validation_error),
    help("Fix the listed fields and try again")
)]
pub struct ValidationReport {
    section: String,
    summary: String,

    #[related]
    violations: Vec<FieldViolation>,
}

/// A single field violation
#[derive(Debug, Error, Diagnostic)]
#[error("{path}: {message}")]
pub struct FieldViolation {
    path: String,
    message: String,
}

impl ValidationReport {
    pub fn new(section: &str, result: &ValidationResult) -> Self {
        let count = result.errors.len();
        let summary = if count == 1 {
            "1 error".to_string()
        } else {
            format!("{} errors", count)
        };
        let violations = result
            .errors
            .iter()
            .map(|e| FieldViolation {
                path: if e.field_path.is_empty() {
                    "(root)".to_string()
                } else {
                    e.field_path.clone()
                },
                message: e.message.clone(),
            })
            .collect();
        Self {
            section: section.to_string(),
            summary,
            violations,
        }
    }

    /// Get the number of violations
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }
}
