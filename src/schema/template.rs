//! Preview rendering for wizard drafts

use chrono::{DateTime, Utc};
use rust_embed::Embed;
use serde::Serialize;
use serde_json::Value;
use tera::Tera;
use thiserror::Error;

use crate::core::draft::Draft;
use crate::schema::field::{FieldKind, FieldSpec};
use crate::schema::registry::SchemaRegistry;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const PREVIEW_TEMPLATE: &str = "preview.md.tera";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    RenderError(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewGroup {
    pub label: String,
    pub rows: Vec<PreviewRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviewSection {
    pub id: String,
    pub title: String,
    pub required: bool,
    pub complete: bool,
    pub groups: Vec<PreviewGroup>,
}

/// Everything the preview template can reference
#[derive(Debug, Clone, Serialize)]
pub struct PreviewContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub author: String,
    pub generated: DateTime<Utc>,
    pub generated_date: String,
    pub completed: usize,
    pub total: usize,
    pub sections: Vec<PreviewSection>,
}

impl PreviewContext {
    /// Lay out a draft section by section, following each section's UI groups
    pub fn from_draft(registry: &SchemaRegistry, draft: &Draft, author: impl Into<String>) -> Self {
        let generated = Utc::now();
        let sections: Vec<PreviewSection> = registry
            .sections()
            .iter()
            .map(|section| {
                let data = draft.get(section.id());
                let groups = match data.and_then(Value::as_object) {
                    Some(map) => section
                        .groups()
                        .into_iter()
                        .map(|group| PreviewGroup {
                            rows: group
                                .fields
                                .iter()
                                .filter_map(|name| {
                                    let field = section.field(name)?;
                                    let value = map.get(name)?;
                                    Some(PreviewRow {
                                        label: field.label().to_string(),
                                        value: escape_cell(&format_value(field, value)),
                                    })
                                })
                                .collect(),
                            label: group.label,
                        })
                        .filter(|g| !g.rows.is_empty())
                        .collect(),
                    None => Vec::new(),
                };
                PreviewSection {
                    id: section.id().to_string(),
                    title: section.title().to_string(),
                    required: section.required(),
                    complete: data.is_some(),
                    groups,
                }
            })
            .collect();

        let company_name = registry
            .payload_mapping()
            .iter()
            .find(|(name, _)| name == "companyName")
            .and_then(|(_, pointer)| draft.to_value().pointer(pointer).cloned())
            .and_then(|v| v.as_str().map(String::from));

        Self {
            company_name,
            author: author.into(),
            generated,
            generated_date: generated.format("%Y-%m-%d").to_string(),
            completed: sections.iter().filter(|s| s.complete).count(),
            total: sections.len(),
            sections,
        }
    }
}

/// Human-readable rendering of a field value
fn format_value(field: &FieldSpec, value: &Value) -> String {
    match (&field.kind, value) {
        (FieldKind::Toggle, Value::Bool(b)) => (if *b { "Yes" } else { "No" }).to_string(),
        (FieldKind::Object(spec), Value::Object(map)) => spec
            .properties
            .iter()
            .filter_map(|f| map.get(&f.name).map(|v| format!("{}: {}", f.label(), format_value(f, v))))
            .collect::<Vec<_>>()
            .join("; "),
        (FieldKind::ObjectList { item, .. }, Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|map| {
                item.properties
                    .iter()
                    .filter_map(|f| map.get(&f.name).map(|v| format_value(f, v)))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<_>>()
            .join(" / "),
        (_, Value::Array(items)) => items.iter().map(plain).collect::<Vec<_>>().join(", "),
        (_, v) => plain(v),
    }
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Renders embedded tera templates
pub struct TemplateGenerator {
    tera: Tera,
}

impl TemplateGenerator {
    /// Create a new template generator with embedded templates
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                let template_str = std::str::from_utf8(&content.data)
                    .map_err(|e| TemplateError::RenderError(format!("{}: {}", filename, e)))?;
                tera.add_raw_template(filename, template_str)
                    .map_err(|e| TemplateError::RenderError(e.to_string()))?;
            }
        }

        Ok(Self { tera })
    }

    /// Render the markdown preview of a draft
    pub fn render_preview(&self, ctx: &PreviewContext) -> Result<String, TemplateError> {
        if !self.tera.get_template_names().any(|n| n == PREVIEW_TEMPLATE) {
            return Err(TemplateError::NotFound(PREVIEW_TEMPLATE.to_string()));
        }
        let context = tera::Context::from_serialize(ctx)
            .map_err(|e| TemplateError::RenderError(e.to_string()))?;
        self.tera
            .render(PREVIEW_TEMPLATE, &context)
            .map_err(|e| TemplateError::RenderError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(registry: &SchemaRegistry) -> Draft {
        let mut draft = Draft::for_sections(registry.ids());
        draft.commit(
            "pitch",
            json!({
                "startupName": "Acme | Co",
                "industry": "Fintech",
                "oneLiner": "Anvils delivered by drone"
            }),
        );
        draft.commit(
            "funding",
            json!({
                "previouslyRaised": true,
                "useOfFunds": { "Marketing": 60, "Research": 40 }
            }),
        );
        draft
    }

    #[test]
    fn test_context_tracks_completion() {
        let registry = SchemaRegistry::embedded().unwrap();
        let ctx = PreviewContext::from_draft(&registry, &draft(&registry), "wile");
        assert_eq!(ctx.total, 6);
        assert_eq!(ctx.completed, 2);
        assert_eq!(ctx.company_name.as_deref(), Some("Acme | Co"));
        assert!(!ctx.sections[1].complete);
        assert!(!ctx.sections[5].required);
    }

    #[test]
    fn test_preview_renders_sections() {
        let registry = SchemaRegistry::embedded().unwrap();
        let ctx = PreviewContext::from_draft(&registry, &draft(&registry), "wile");
        let generator = TemplateGenerator::new().unwrap();
        let out = generator.render_preview(&ctx).unwrap();

        assert!(out.starts_with("# Acme | Co"));
        assert!(out.contains("2 of 6 sections complete"));
        assert!(out.contains("Acme \\| Co"));
        assert!(out.contains("Marketing: 60; Research: 40"));
        assert!(out.contains("| Yes |"));
        assert!(out.contains("_Not completed yet._"));
        assert!(out.contains("Documents (optional)"));
    }
}
