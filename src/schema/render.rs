//! Schema-driven prompting for wizard sections
//!
//! Each field kind renders through a [`Prompter`], so the same section
//! definition drives the dialoguer terminal front-end and scripted input.

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect, Select};
use miette::{IntoDiagnostic, Result};
use serde_json::{Map, Number, Value};

use crate::schema::field::{FieldKind, FieldSpec, ObjectSpec};
use crate::schema::registry::Section;

const NONE_OPTION: &str = "(none)";

/// Source of user answers
pub trait Prompter {
    /// Free text; `initial` pre-fills the input
    fn text(&mut self, label: &str, initial: Option<&str>, allow_empty: bool) -> Result<String>;

    /// Index of one chosen option
    fn select(&mut self, label: &str, options: &[String], initial: usize) -> Result<usize>;

    /// Indices of the chosen options
    fn multi_select(&mut self, label: &str, options: &[String], selected: &[bool])
        -> Result<Vec<usize>>;

    fn confirm(&mut self, label: &str, initial: bool) -> Result<bool>;

    /// Group or section heading
    fn heading(&mut self, _text: &str) {}

    /// Feedback about a rejected answer
    fn notice(&mut self, _text: &str) {}
}

/// Interactive terminal prompts
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn text(&mut self, label: &str, initial: Option<&str>, allow_empty: bool) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(label)
            .allow_empty(allow_empty);
        if let Some(initial) = initial {
            input = input.with_initial_text(initial);
        }
        input.interact_text().into_diagnostic()
    }

    fn select(&mut self, label: &str, options: &[String], initial: usize) -> Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(label)
            .items(options)
            .default(initial)
            .interact()
            .into_diagnostic()
    }

    fn multi_select(
        &mut self,
        label: &str,
        options: &[String],
        selected: &[bool],
    ) -> Result<Vec<usize>> {
        MultiSelect::with_theme(&self.theme)
            .with_prompt(label)
            .items(options)
            .defaults(selected)
            .interact()
            .into_diagnostic()
    }

    fn confirm(&mut self, label: &str, initial: bool) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(label)
            .default(initial)
            .interact()
            .into_diagnostic()
    }

    fn heading(&mut self, text: &str) {
        println!();
        println!("{} {}", style("◆").cyan(), style(text).bold());
        println!("{}", style("─".repeat(50)).dim());
    }

    fn notice(&mut self, text: &str) {
        println!("{} {}", style("!").yellow(), text);
    }
}

/// Prompt for every field of a section, grouped by its layout.
///
/// `current` pre-fills answers. Conditional fields whose toggle is off are
/// skipped and dropped from the result. The result keeps declaration order.
pub fn render_section(
    section: &Section,
    current: Option<&Value>,
    prompter: &mut dyn Prompter,
) -> Result<Value> {
    let empty = Map::new();
    let current = current.and_then(Value::as_object).unwrap_or(&empty);
    let root = section.root();
    let mut answers = Map::new();

    for group in section.groups() {
        prompter.heading(&group.label);
        for name in &group.fields {
            let Some(field) = root.field(name) else {
                continue;
            };
            if !root.is_active(name, &answers) {
                continue;
            }
            if let Some(value) = field.render(prompter, current.get(name), root.is_required(name))? {
                answers.insert(name.clone(), value);
            }
        }
    }

    Ok(Value::Object(in_declaration_order(root, answers)))
}

fn in_declaration_order(spec: &ObjectSpec, mut answers: Map<String, Value>) -> Map<String, Value> {
    let mut ordered = Map::new();
    for field in &spec.properties {
        if let Some(value) = answers.remove(&field.name) {
            ordered.insert(field.name.clone(), value);
        }
    }
    ordered.extend(answers);
    ordered
}

impl FieldSpec {
    /// Prompt for this field; `None` leaves it unset
    pub fn render(
        &self,
        prompter: &mut dyn Prompter,
        current: Option<&Value>,
        required: bool,
    ) -> Result<Option<Value>> {
        let current = current.or(self.default.as_ref());
        let label = self.prompt_label(required);

        match &self.kind {
            FieldKind::Text(_) => {
                let answer = prompter.text(&label, current.and_then(Value::as_str), !required)?;
                Ok(non_empty(answer).map(Value::String))
            }
            FieldKind::Number(rules) => loop {
                let initial = current.map(Value::to_string);
                let answer = prompter.text(&label, initial.as_deref(), !required)?;
                let Some(answer) = non_empty(answer) else {
                    return Ok(None);
                };
                match parse_number(&answer, rules.integer) {
                    Some(n) => return Ok(Some(Value::Number(n))),
                    None if rules.integer => prompter.notice("Enter a whole number"),
                    None => prompter.notice("Enter a number"),
                }
            },
            FieldKind::Toggle => {
                let initial = current.and_then(Value::as_bool).unwrap_or(false);
                Ok(Some(Value::Bool(prompter.confirm(&label, initial)?)))
            }
            FieldKind::Select { options } => {
                let mut items: Vec<String> = options.iter().map(display_value).collect();
                let offset = if required {
                    0
                } else {
                    items.insert(0, NONE_OPTION.to_string());
                    1
                };
                let initial = current
                    .and_then(|c| options.iter().position(|o| o == c))
                    .map(|i| i + offset)
                    .unwrap_or(0);
                let chosen = prompter.select(&label, &items, initial)?;
                if chosen < offset {
                    return Ok(None);
                }
                Ok(options.get(chosen - offset).cloned())
            }
            FieldKind::MultiSelect { options, .. } => {
                let items: Vec<String> = options.iter().map(display_value).collect();
                let chosen_before: Vec<&Value> = current
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().collect())
                    .unwrap_or_default();
                let selected: Vec<bool> = options.iter().map(|o| chosen_before.contains(&o)).collect();
                let chosen = prompter.multi_select(&label, &items, &selected)?;
                let values: Vec<Value> = chosen.iter().filter_map(|i| options.get(*i).cloned()).collect();
                if values.is_empty() && !required {
                    return Ok(None);
                }
                Ok(Some(Value::Array(values)))
            }
            FieldKind::TextList { .. } => {
                let initial = current.and_then(Value::as_array).map(|arr| {
                    arr.iter().map(display_value).collect::<Vec<_>>().join(", ")
                });
                let answer = prompter.text(
                    &format!("{} (comma-separated)", label),
                    initial.as_deref(),
                    !required,
                )?;
                let items: Vec<Value> = answer
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect();
                if items.is_empty() && !required {
                    return Ok(None);
                }
                Ok(Some(Value::Array(items)))
            }
            FieldKind::Object(spec) => {
                prompter.heading(self.label());
                let value = spec.render(prompter, current)?;
                if value.is_empty() && !required {
                    return Ok(None);
                }
                Ok(Some(Value::Object(value)))
            }
            FieldKind::ObjectList { item, .. } => {
                let existing: &[Value] = current
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                let count = loop {
                    let answer = prompter.text(
                        &format!("How many {}?", self.label()),
                        Some(&existing.len().to_string()),
                        false,
                    )?;
                    match answer.trim().parse::<usize>() {
                        Ok(n) => break n,
                        Err(_) => prompter.notice("Enter a whole number"),
                    }
                };
                let mut items = Vec::with_capacity(count);
                for i in 0..count {
                    prompter.heading(&format!("{} #{}", self.label(), i + 1));
                    items.push(Value::Object(item.render(prompter, existing.get(i))?));
                }
                if items.is_empty() && !required {
                    return Ok(None);
                }
                Ok(Some(Value::Array(items)))
            }
            FieldKind::Other => loop {
                let initial = current.map(Value::to_string);
                let answer = prompter.text(&format!("{} (JSON)", label), initial.as_deref(), !required)?;
                let Some(answer) = non_empty(answer) else {
                    return Ok(None);
                };
                match serde_json::from_str(&answer) {
                    Ok(value) => return Ok(Some(value)),
                    Err(e) => prompter.notice(&format!("Invalid JSON: {}", e)),
                }
            },
        }
    }

    fn prompt_label(&self, required: bool) -> String {
        let mut label = self.label().to_string();
        if let Some(ref desc) = self.description {
            label = format!("{} ({})", label, style(desc).dim());
        }
        if required {
            label.push_str(" *");
        }
        label
    }
}

impl ObjectSpec {
    /// Prompt for every active property of a nested object
    pub fn render(
        &self,
        prompter: &mut dyn Prompter,
        current: Option<&Value>,
    ) -> Result<Map<String, Value>> {
        let empty = Map::new();
        let current = current.and_then(Value::as_object).unwrap_or(&empty);
        let mut answers = Map::new();
        for field in &self.properties {
            if !self.is_active(&field.name, &answers) {
                continue;
            }
            let required = self.is_required(&field.name);
            if let Some(value) = field.render(prompter, current.get(&field.name), required)? {
                answers.insert(field.name.clone(), value);
            }
        }
        Ok(answers)
    }
}

fn non_empty(answer: String) -> Option<String> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_number(s: &str, integer: bool) -> Option<Number> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    if integer {
        return None;
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

fn display_value(v: &Value) -> String {
    v.as_str().map(String::from).unwrap_or_else(|| v.to_string())
}
