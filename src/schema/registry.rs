//! Section registry - embedded wizard manifest, schemas and UI layouts

use jsonschema::{validator_for, Validator as JsonValidator};
use rust_embed::Embed;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::schema::field::{FieldSpec, ObjectSpec};

/// Embedded wizard assets
#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

const MANIFEST_FILE: &str = "wizard.json";

/// Label of the trailing group holding fields no layout group places
pub const UNGROUPED_LABEL: &str = "Other";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate section id '{0}'")]
    DuplicateSection(String),

    #[error("invalid schema for section '{section}': {message}")]
    InvalidSchema { section: String, message: String },

    #[error("invalid UI layout for section '{section}': {message}")]
    InvalidLayout { section: String, message: String },

    #[error("unknown section '{0}'")]
    UnknownSection(String),

    #[error("schema asset not found: {0}")]
    MissingAsset(String),

    #[error("invalid wizard manifest: {0}")]
    InvalidManifest(String),

    #[error("failed to parse {name}: {message}")]
    Parse { name: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A labelled group of fields from the UI layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiGroup {
    pub label: String,
    pub fields: Vec<String>,
}

/// One wizard step: schema, layout and whether submission needs it
pub struct Section {
    id: String,
    title: String,
    schema: Value,
    ui_layout: Value,
    required: bool,
    root: ObjectSpec,
    groups: Vec<UiGroup>,
    compiled: JsonValidator,
}

impl Section {
    /// Build a section, compiling its schema and reading its layout
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        schema: Value,
        ui_layout: Value,
        required: bool,
    ) -> Result<Self, RegistryError> {
        let id = id.into();
        let invalid = |message: String| RegistryError::InvalidSchema {
            section: id.clone(),
            message,
        };

        if schema.get("type").and_then(Value::as_str) != Some("object") {
            return Err(invalid("root schema must have type 'object'".to_string()));
        }
        let compiled = validator_for(&schema).map_err(|e| invalid(e.to_string()))?;
        let root = ObjectSpec::from_schema(&schema).map_err(invalid)?;
        let groups = layout_groups(&ui_layout).map_err(|message| RegistryError::InvalidLayout {
            section: id.clone(),
            message,
        })?;

        Ok(Self {
            id,
            title: title.into(),
            schema,
            ui_layout,
            required,
            root,
            groups,
            compiled,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn ui_layout(&self) -> &Value {
        &self.ui_layout
    }

    pub fn required(&self) -> bool {
        self.required
    }

    /// Root object of the section's field tree
    pub fn root(&self) -> &ObjectSpec {
        &self.root
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.root.field(name)
    }

    pub(crate) fn compiled(&self) -> &JsonValidator {
        &self.compiled
    }

    /// Field groups in layout order, restricted to declared fields.
    /// Fields the layout never mentions land in a trailing group.
    pub fn groups(&self) -> Vec<UiGroup> {
        let mut placed: Vec<&str> = Vec::new();
        let mut groups: Vec<UiGroup> = Vec::new();

        for group in &self.groups {
            let fields: Vec<String> = group
                .fields
                .iter()
                .filter(|f| self.root.field(f).is_some() && !placed.contains(&f.as_str()))
                .cloned()
                .collect();
            placed.extend(group.fields.iter().map(String::as_str));
            if !fields.is_empty() {
                groups.push(UiGroup {
                    label: group.label.clone(),
                    fields,
                });
            }
        }

        let rest: Vec<String> = self
            .root
            .properties
            .iter()
            .filter(|f| !placed.contains(&f.name.as_str()))
            .map(|f| f.name.clone())
            .collect();
        if !rest.is_empty() {
            let label = if groups.is_empty() {
                self.title.clone()
            } else {
                UNGROUPED_LABEL.to_string()
            };
            groups.push(UiGroup { label, fields: rest });
        }
        groups
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("required", &self.required)
            .field("fields", &self.root.properties.len())
            .finish()
    }
}

/// Collect `Category`/`Group` labels and their `Control` scopes
fn layout_groups(layout: &Value) -> Result<Vec<UiGroup>, String> {
    let mut groups = Vec::new();
    if layout.is_null() {
        return Ok(groups);
    }
    if !layout.is_object() {
        return Err("layout must be an object".to_string());
    }

    let mut loose = Vec::new();
    collect_layout(layout, &mut groups, &mut loose)?;
    if !loose.is_empty() {
        let label = layout
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(UNGROUPED_LABEL)
            .to_string();
        groups.insert(0, UiGroup { label, fields: loose });
    }
    Ok(groups)
}

fn collect_layout(
    node: &Value,
    groups: &mut Vec<UiGroup>,
    loose: &mut Vec<String>,
) -> Result<(), String> {
    match node.get("type").and_then(Value::as_str) {
        Some("Control") => {
            let scope = node
                .get("scope")
                .and_then(Value::as_str)
                .ok_or("Control without a scope")?;
            loose.push(scope_field(scope)?);
        }
        Some("Category") | Some("Group") => {
            let label = node
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or(UNGROUPED_LABEL)
                .to_string();
            let mut fields = Vec::new();
            let mut nested = Vec::new();
            for child in children(node) {
                collect_layout(child, &mut nested, &mut fields)?;
            }
            groups.push(UiGroup { label, fields });
            groups.extend(nested);
        }
        _ => {
            for child in children(node) {
                collect_layout(child, groups, loose)?;
            }
        }
    }
    Ok(())
}

fn children(node: &Value) -> impl Iterator<Item = &Value> {
    node.get("elements")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// `#/properties/useOfFunds` -> `useOfFunds`
fn scope_field(scope: &str) -> Result<String, String> {
    scope
        .strip_prefix("#/properties/")
        .and_then(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .map(|name| name.replace("~1", "/").replace("~0", "~"))
        .ok_or_else(|| format!("unsupported control scope '{}'", scope))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    draft_key: String,
    sections: Vec<ManifestSection>,
    #[serde(default)]
    payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ManifestSection {
    id: String,
    title: String,
    #[serde(default = "default_required")]
    required: bool,
}

fn default_required() -> bool {
    true
}

/// Ordered set of wizard sections plus the submission payload mapping
#[derive(Debug)]
pub struct SchemaRegistry {
    sections: Vec<Section>,
    draft_key: String,
    payload: Vec<(String, String)>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new(draft_key: impl Into<String>) -> Self {
        Self {
            sections: Vec::new(),
            draft_key: draft_key.into(),
            payload: Vec::new(),
        }
    }

    /// Load the embedded wizard definition
    pub fn embedded() -> Result<Self, RegistryError> {
        Self::load(None)
    }

    /// Load the embedded wizard definition, preferring same-named files
    /// found under `overrides`
    pub fn load(overrides: Option<&Path>) -> Result<Self, RegistryError> {
        let overrides = match overrides {
            Some(dir) if dir.is_dir() => read_overrides(dir)?,
            _ => HashMap::new(),
        };
        let asset = |name: &str, embedded_path: &str| -> Result<Option<Value>, RegistryError> {
            let text = match overrides.get(name) {
                Some(text) => {
                    debug!(asset = name, "using project schema override");
                    text.clone()
                }
                None => match EmbeddedSchemas::get(embedded_path) {
                    Some(file) => String::from_utf8_lossy(&file.data).into_owned(),
                    None => return Ok(None),
                },
            };
            serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| RegistryError::Parse {
                    name: name.to_string(),
                    message: e.to_string(),
                })
        };

        let manifest_value = asset(MANIFEST_FILE, MANIFEST_FILE)?
            .ok_or_else(|| RegistryError::MissingAsset(MANIFEST_FILE.to_string()))?;
        let manifest: Manifest = serde_json::from_value(manifest_value)
            .map_err(|e| RegistryError::InvalidManifest(e.to_string()))?;

        let mut registry = Self::new(manifest.draft_key);
        for entry in manifest.sections {
            let schema_name = format!("{}.schema.json", entry.id);
            let ui_name = format!("{}.ui.json", entry.id);
            let schema = asset(&schema_name, &format!("sections/{}", schema_name))?
                .ok_or_else(|| RegistryError::MissingAsset(schema_name.clone()))?;
            let ui = asset(&ui_name, &format!("sections/{}", ui_name))?.unwrap_or(Value::Null);
            registry.register(Section::new(entry.id, entry.title, schema, ui, entry.required)?)?;
        }

        for (name, pointer) in manifest.payload {
            let pointer = pointer.as_str().ok_or_else(|| {
                RegistryError::InvalidManifest(format!("payload field '{}' must map to a JSON pointer", name))
            })?;
            registry.map_payload(name, pointer);
        }

        debug!(
            sections = registry.len(),
            draft_key = %registry.draft_key,
            "loaded wizard definition"
        );
        Ok(registry)
    }

    /// Append a section; ids are unique and order is registration order
    pub fn register(&mut self, section: Section) -> Result<(), RegistryError> {
        if self.index_of(section.id()).is_some() {
            return Err(RegistryError::DuplicateSection(section.id().to_string()));
        }
        self.sections.push(section);
        Ok(())
    }

    /// Map a flattened payload field to a JSON pointer into the draft
    pub fn map_payload(&mut self, field: impl Into<String>, pointer: impl Into<String>) {
        self.payload.push((field.into(), pointer.into()));
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    pub fn section_at(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn draft_key(&self) -> &str {
        &self.draft_key
    }

    pub fn set_draft_key(&mut self, key: impl Into<String>) {
        self.draft_key = key.into();
    }

    /// Flattened payload fields and the draft pointers they read from
    pub fn payload_mapping(&self) -> &[(String, String)] {
        &self.payload
    }
}

fn read_overrides(dir: &Path) -> Result<HashMap<String, String>, RegistryError> {
    let mut found = HashMap::new();
    for entry in WalkDir::new(dir).max_depth(2).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != MANIFEST_FILE && !name.ends_with(".schema.json") && !name.ends_with(".ui.json") {
            continue;
        }
        let text = std::fs::read_to_string(entry.path()).map_err(|source| RegistryError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        found.insert(name, text);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn simple_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string" },
                "c": { "type": "string" }
            }
        })
    }

    #[test]
    fn test_embedded_sections_in_order() {
        let registry = SchemaRegistry::embedded().unwrap();
        let ids: Vec<&str> = registry.ids().collect();
        assert_eq!(ids, vec!["pitch", "team", "traction", "funding", "founder", "documents"]);
        assert_eq!(registry.draft_key(), "startupFormData");
        assert!(registry.get("pitch").unwrap().required());
        assert!(!registry.get("documents").unwrap().required());
    }

    #[test]
    fn test_embedded_payload_mapping() {
        let registry = SchemaRegistry::embedded().unwrap();
        let fields: Vec<&str> = registry.payload_mapping().iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields[0], "companyName");
        assert!(fields.contains(&"fundingNeeded"));
    }

    #[test]
    fn test_schema_declaration_order_is_kept() {
        let registry = SchemaRegistry::embedded().unwrap();
        let pitch = registry.get("pitch").unwrap();
        assert_eq!(pitch.root().properties[0].name, "startupName");
    }

    #[test]
    fn test_duplicate_section_rejected() {
        let mut registry = SchemaRegistry::new("k");
        registry
            .register(Section::new("a", "A", simple_schema(), Value::Null, true).unwrap())
            .unwrap();
        let err = registry
            .register(Section::new("a", "A again", simple_schema(), Value::Null, true).unwrap())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSection(id) if id == "a"));
    }

    #[test]
    fn test_malformed_schema_rejected() {
        let bad = json!({ "type": "object", "properties": { "a": { "type": "string", "pattern": "(" } } });
        let err = Section::new("a", "A", bad, Value::Null, true).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));

        let not_object = json!({ "type": "string" });
        assert!(Section::new("a", "A", not_object, Value::Null, true).is_err());
    }

    #[test]
    fn test_groups_follow_layout_with_trailing_rest() {
        let layout = json!({
            "type": "Categorization",
            "elements": [
                { "type": "Category", "label": "First", "elements": [
                    { "type": "Control", "scope": "#/properties/b" },
                    { "type": "Control", "scope": "#/properties/missing" }
                ] }
            ]
        });
        let section = Section::new("s", "S", simple_schema(), layout, true).unwrap();
        let groups = section.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], UiGroup { label: "First".into(), fields: vec!["b".into()] });
        assert_eq!(groups[1].label, UNGROUPED_LABEL);
        assert_eq!(groups[1].fields, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_no_layout_uses_section_title() {
        let section = Section::new("s", "Section S", simple_schema(), Value::Null, true).unwrap();
        let groups = section.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Section S");
    }

    #[test]
    fn test_project_override_replaces_embedded_schema() {
        let dir = tempdir().unwrap();
        let schema = json!({
            "type": "object",
            "properties": { "documentsNote": { "type": "string" } }
        });
        std::fs::write(
            dir.path().join("documents.schema.json"),
            serde_json::to_string(&schema).unwrap(),
        )
        .unwrap();

        let registry = SchemaRegistry::load(Some(dir.path())).unwrap();
        let docs = registry.get("documents").unwrap();
        assert!(docs.field("documentsNote").is_some());
        assert!(docs.field("pitchDeck").is_none());
        assert!(registry.get("pitch").unwrap().field("oneLiner").is_some());
    }
}
