//! Field kinds extracted from a section's JSON Schema
//!
//! Every property of a section schema maps onto one of a closed set of
//! field kinds. Each kind knows how to check a value against the constraints
//! it declares; rendering lives in [`crate::schema::render`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pseudo-field that carries the cross-field allocation error
pub const ALLOCATION_TOTAL_FIELD: &str = "_allocationTotal";

const ALLOCATION_EPSILON: f64 = 1e-9;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field_path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

/// Custom messages declared through the `errorMessage` keyword
#[derive(Debug, Clone, Default)]
pub struct Messages {
    all: Option<String>,
    by_keyword: Map<String, Value>,
}

impl Messages {
    fn from_schema(schema: &Value) -> Self {
        match schema.get("errorMessage") {
            Some(Value::String(s)) => Self {
                all: Some(s.clone()),
                by_keyword: Map::new(),
            },
            Some(Value::Object(map)) => Self {
                all: None,
                by_keyword: map.clone(),
            },
            _ => Self::default(),
        }
    }

    /// Message for a violated keyword, falling back to the generated default
    pub fn pick(&self, keyword: &str, default: impl FnOnce() -> String) -> String {
        if let Some(msg) = self.by_keyword.get(keyword).and_then(Value::as_str) {
            return msg.to_string();
        }
        self.all.clone().unwrap_or_else(default)
    }

    /// Per-child message from `errorMessage.required.<field>`
    fn required_for(&self, field: &str) -> Option<String> {
        self.by_keyword
            .get("required")
            .and_then(|r| r.get(field))
            .and_then(Value::as_str)
            .map(String::from)
    }
}

/// Item-count constraints shared by the list kinds
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemBounds {
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique: bool,
}

impl ItemBounds {
    fn from_schema(schema: &Value) -> Self {
        Self {
            min_items: schema.get("minItems").and_then(Value::as_u64),
            max_items: schema.get("maxItems").and_then(Value::as_u64),
            unique: schema
                .get("uniqueItems")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    fn check(&self, items: &[Value], path: &str, messages: &Messages, pass: &mut Pass) {
        let len = items.len() as u64;
        if let Some(min) = self.min_items {
            if len < min {
                pass.error(
                    path,
                    messages.pick("minItems", || {
                        format!("Must contain at least {} item(s)", min)
                    }),
                );
            }
        }
        if let Some(max) = self.max_items {
            if len > max {
                pass.error(
                    path,
                    messages.pick("maxItems", || {
                        format!("Cannot contain more than {} item(s)", max)
                    }),
                );
            }
        }
        if self.unique && has_duplicates(items) {
            pass.error(
                path,
                messages.pick("uniqueItems", || "Items must be unique".to_string()),
            );
        }
    }
}

fn has_duplicates(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, a)| items[i + 1..].iter().any(|b| a == b))
}

/// Recognised string formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Date,
}

/// Constraints on a text value
#[derive(Debug, Clone, Default)]
pub struct TextRules {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Regex>,
    pub format: Option<TextFormat>,
}

impl TextRules {
    fn from_schema(schema: &Value) -> Result<Self, String> {
        let pattern = match schema.get("pattern").and_then(Value::as_str) {
            Some(p) => Some(Regex::new(p).map_err(|e| format!("invalid pattern '{}': {}", p, e))?),
            None => None,
        };
        let format = match schema.get("format").and_then(Value::as_str) {
            Some("date") => Some(TextFormat::Date),
            _ => None,
        };
        Ok(Self {
            min_length: schema.get("minLength").and_then(Value::as_u64),
            max_length: schema.get("maxLength").and_then(Value::as_u64),
            pattern,
            format,
        })
    }

    fn check(&self, s: &str, path: &str, messages: &Messages, pass: &mut Pass) {
        let len = s.chars().count() as u64;
        if let Some(min) = self.min_length {
            if len < min {
                pass.error(
                    path,
                    messages.pick("minLength", || {
                        format!("Must be at least {} characters long", min)
                    }),
                );
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                pass.error(
                    path,
                    messages.pick("maxLength", || format!("Cannot exceed {} characters", max)),
                );
            }
        }
        if let Some(ref re) = self.pattern {
            if !re.is_match(s) {
                pass.error(
                    path,
                    messages.pick("pattern", || {
                        format!("Does not match the expected format ({})", re.as_str())
                    }),
                );
            }
        }
        if self.format == Some(TextFormat::Date)
            && chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err()
        {
            pass.error(
                path,
                messages.pick("format", || "Must be a date in YYYY-MM-DD format".to_string()),
            );
        }
    }
}

/// Constraints on a numeric value
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRules {
    pub integer: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// The closed set of field kinds a section schema can declare
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text(TextRules),
    Number(NumberRules),
    Toggle,
    Select { options: Vec<Value> },
    MultiSelect { options: Vec<Value>, bounds: ItemBounds },
    TextList { item: Box<FieldSpec>, bounds: ItemBounds },
    Object(ObjectSpec),
    ObjectList { item: ObjectSpec, bounds: ItemBounds },
    /// Shapes the wizard does not model; left to the compiled JSON Schema
    Other,
}

/// One named property of a section or nested object
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub kind: FieldKind,
    messages: Messages,
}

impl FieldSpec {
    pub fn from_schema(name: &str, schema: &Value) -> Result<Self, String> {
        Ok(Self {
            name: name.to_string(),
            title: schema.get("title").and_then(Value::as_str).map(String::from),
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            default: schema.get("default").cloned(),
            kind: FieldKind::from_schema(schema).map_err(|e| format!("{}: {}", name, e))?,
            messages: Messages::from_schema(schema),
        })
    }

    /// Human-facing label: the title when declared, else the property name
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn check(&self, path: &str, value: &Value, pass: &mut Pass) {
        match &self.kind {
            FieldKind::Text(rules) => match value.as_str() {
                Some(s) => rules.check(s, path, &self.messages, pass),
                None => self.type_error(path, "text", pass),
            },
            FieldKind::Number(rules) => self.check_number(rules, path, value, pass),
            FieldKind::Toggle => {
                if !value.is_boolean() {
                    self.type_error(path, "true or false", pass);
                }
            }
            FieldKind::Select { options } => {
                if !options.contains(value) {
                    pass.error(path, self.messages.pick("enum", || enum_message(options)));
                }
            }
            FieldKind::MultiSelect { options, bounds } => match value.as_array() {
                Some(items) => {
                    bounds.check(items, path, &self.messages, pass);
                    for (i, item) in items.iter().enumerate() {
                        if !options.contains(item) {
                            pass.error(
                                &index_path(path, i),
                                self.messages.pick("enum", || enum_message(options)),
                            );
                        }
                    }
                }
                None => self.type_error(path, "a list", pass),
            },
            FieldKind::TextList { item, bounds } => match value.as_array() {
                Some(items) => {
                    bounds.check(items, path, &self.messages, pass);
                    for (i, v) in items.iter().enumerate() {
                        item.check(&index_path(path, i), v, pass);
                    }
                }
                None => self.type_error(path, "a list", pass),
            },
            FieldKind::Object(spec) => match value.as_object() {
                Some(map) => spec.check(path, map, pass),
                None => self.type_error(path, "an object", pass),
            },
            FieldKind::ObjectList { item, bounds } => match value.as_array() {
                Some(items) => {
                    bounds.check(items, path, &self.messages, pass);
                    for (i, v) in items.iter().enumerate() {
                        let item_path = index_path(path, i);
                        match v.as_object() {
                            Some(map) => item.check(&item_path, map, pass),
                            None => pass.error(&item_path, "Expected an object"),
                        }
                    }
                }
                None => self.type_error(path, "a list", pass),
            },
            FieldKind::Other => {}
        }
    }

    fn check_number(&self, rules: &NumberRules, path: &str, value: &Value, pass: &mut Pass) {
        let Some(n) = value.as_f64() else {
            let expected = if rules.integer { "a whole number" } else { "a number" };
            self.type_error(path, expected, pass);
            return;
        };
        if rules.integer && n.fract() != 0.0 {
            self.type_error(path, "a whole number", pass);
            return;
        }
        if let Some(min) = rules.minimum {
            if n < min {
                pass.error(path, self.messages.pick("minimum", || format!("Must be at least {}", min)));
            }
        }
        if let Some(max) = rules.maximum {
            if n > max {
                pass.error(path, self.messages.pick("maximum", || format!("Must be at most {}", max)));
            }
        }
    }

    fn type_error(&self, path: &str, expected: &str, pass: &mut Pass) {
        pass.error(
            path,
            self.messages.pick("type", || format!("Expected {}", expected)),
        );
    }

    fn required_message(&self) -> String {
        self.messages
            .pick("required", || format!("{} is required", self.label()))
    }
}

impl FieldKind {
    fn from_schema(schema: &Value) -> Result<Self, String> {
        let ty = schema.get("type").and_then(Value::as_str);

        if ty != Some("array") {
            if let Some(options) = schema.get("enum").and_then(Value::as_array) {
                return Ok(FieldKind::Select {
                    options: options.clone(),
                });
            }
        }

        let kind = match ty {
            Some("string") => FieldKind::Text(TextRules::from_schema(schema)?),
            Some(t @ ("integer" | "number")) => FieldKind::Number(NumberRules {
                integer: t == "integer",
                minimum: schema.get("minimum").and_then(Value::as_f64),
                maximum: schema.get("maximum").and_then(Value::as_f64),
            }),
            Some("boolean") => FieldKind::Toggle,
            Some("object") => FieldKind::Object(ObjectSpec::from_schema(schema)?),
            Some("array") => {
                let items = schema.get("items").unwrap_or(&Value::Null);
                let bounds = ItemBounds::from_schema(schema);
                if let Some(options) = items.get("enum").and_then(Value::as_array) {
                    FieldKind::MultiSelect {
                        options: options.clone(),
                        bounds,
                    }
                } else {
                    match items.get("type").and_then(Value::as_str) {
                        Some("object") => FieldKind::ObjectList {
                            item: ObjectSpec::from_schema(items)?,
                            bounds,
                        },
                        Some("string") => FieldKind::TextList {
                            item: Box::new(FieldSpec::from_schema("item", items)?),
                            bounds,
                        },
                        _ => FieldKind::Other,
                    }
                }
            }
            _ => FieldKind::Other,
        };
        Ok(kind)
    }
}

/// A nested object: ordered properties plus object-level rules
#[derive(Debug, Clone, Default)]
pub struct ObjectSpec {
    pub properties: Vec<FieldSpec>,
    pub required: Vec<String>,
    /// `(field, toggle)`: field is required only while toggle is true
    pub required_when: Vec<(String, String)>,
    /// Declared total for a percentage-allocation control set
    pub allocation_total: Option<f64>,
    pub title: Option<String>,
    messages: Messages,
}

impl ObjectSpec {
    pub fn from_schema(schema: &Value) -> Result<Self, String> {
        let mut properties = Vec::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                properties.push(FieldSpec::from_schema(name, prop)?);
            }
        }

        let required = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let required_when = schema
            .get("x-requiredWhen")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(field, toggle)| {
                        toggle.as_str().map(|t| (field.clone(), t.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let allocation_total = match schema.get("x-allocation") {
            Some(alloc) => Some(
                alloc
                    .get("total")
                    .and_then(Value::as_f64)
                    .ok_or("x-allocation requires a numeric 'total'")?,
            ),
            None => None,
        };

        Ok(Self {
            properties,
            required,
            required_when,
            allocation_total,
            title: schema.get("title").and_then(Value::as_str).map(String::from),
            messages: Messages::from_schema(schema),
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.properties.iter().find(|f| f.name == name)
    }

    /// The toggle controlling a conditionally-required field, if any
    pub fn toggle_for(&self, field: &str) -> Option<&str> {
        self.required_when
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, t)| t.as_str())
    }

    /// Whether a field currently applies, given the sibling values
    pub fn is_active(&self, field: &str, map: &Map<String, Value>) -> bool {
        match self.toggle_for(field) {
            Some(toggle) => map.get(toggle).and_then(Value::as_bool).unwrap_or(false),
            None => true,
        }
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.toggle_for(field).is_some() || self.required.iter().any(|r| r == field)
    }

    pub(crate) fn check(&self, parent: &str, map: &Map<String, Value>, pass: &mut Pass) {
        for field in &self.properties {
            let path = join_path(parent, &field.name);
            if !self.is_active(&field.name, map) {
                pass.inactive.push(path);
                continue;
            }
            match map.get(&field.name) {
                Some(value) => field.check(&path, value, pass),
                None if self.is_required(&field.name) => {
                    let msg = self
                        .messages
                        .required_for(&field.name)
                        .unwrap_or_else(|| field.required_message());
                    pass.error(&path, msg);
                }
                None => {}
            }
        }

        // Required names that have no declared property
        for name in &self.required {
            if self.field(name).is_none() && !map.contains_key(name) {
                let msg = self
                    .messages
                    .required_for(name)
                    .unwrap_or_else(|| format!("{} is required", name));
                pass.error(&join_path(parent, name), msg);
            }
        }

        if let Some(total) = self.allocation_total {
            let sum = self.allocation_sum(map);
            if (sum - total).abs() > ALLOCATION_EPSILON {
                let label = self.title.as_deref().unwrap_or("Allocation");
                pass.deferred.push(FieldError::new(
                    ALLOCATION_TOTAL_FIELD,
                    format!(
                        "{} must total exactly {}% (currently {}%)",
                        label, total, sum
                    ),
                ));
            }
        }
    }

    /// Sum of the numeric category values (declared categories only, when declared)
    pub fn allocation_sum(&self, map: &Map<String, Value>) -> f64 {
        if self.properties.is_empty() {
            map.values().filter_map(Value::as_f64).sum()
        } else {
            self.properties
                .iter()
                .filter_map(|f| map.get(&f.name).and_then(Value::as_f64))
                .sum()
        }
    }
}

/// Accumulator for one validation pass
#[derive(Debug, Default)]
pub(crate) struct Pass {
    pub errors: Vec<FieldError>,
    /// Cross-field errors reported after all per-field checks
    pub deferred: Vec<FieldError>,
    /// Paths of conditional fields whose toggle is off
    pub inactive: Vec<String>,
}

impl Pass {
    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(path, message));
    }
}

fn enum_message(options: &[Value]) -> String {
    let opts: Vec<String> = options
        .iter()
        .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
        .collect();
    format!("Must be one of: {}", opts.join(", "))
}

/// `parent.child`, or just `child` at the root
pub fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

/// `parent[index]`
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

/// Convert a JSON pointer (`/founders/0/email`) to a field path (`founders[0].email`)
pub fn pointer_to_path(pointer: &str) -> String {
    let mut path = String::new();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        match segment.parse::<usize>() {
            Ok(i) => path = index_path(&path, i),
            Err(_) => path = join_path(&path, &segment),
        }
    }
    path
}
