//! `fundr schema` command - Inspect wizard sections
//!
//! Shows the sections the wizard walks through and the fields each one asks
//! for, so profile data can be prepared in files for `fundr wizard fill`.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{print_record, truncate_str, Workspace};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::schema::{FieldKind, FieldSpec, SchemaRegistry, Section};

#[derive(Subcommand, Debug)]
pub enum SchemaCommands {
    /// List the wizard sections in order
    List,

    /// Show the fields of one section
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Section id (pitch, team, traction, ...)
    pub section: String,

    /// Print the UI layout instead of the field summary
    #[arg(long, conflicts_with = "raw")]
    pub ui: bool,

    /// Print the raw JSON schema
    #[arg(long)]
    pub raw: bool,
}

const SECTION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("index", "#", 4),
    ColumnDef::new("id", "ID", 12),
    ColumnDef::new("title", "TITLE", 28),
    ColumnDef::new("required", "REQUIRED", 10),
    ColumnDef::new("fields", "FIELDS", 8),
];

pub fn run(cmd: SchemaCommands, global: &GlobalOpts) -> Result<()> {
    // Outside a project the embedded schemas are still useful
    let (registry, format) = match Workspace::open(global) {
        Ok(ws) => (ws.registry()?, ws.format(global)),
        Err(_) => (
            std::sync::Arc::new(SchemaRegistry::embedded().map_err(|e| miette::miette!("{}", e))?),
            global.format,
        ),
    };

    match cmd {
        SchemaCommands::List => list_sections(&registry, format, global.quiet),
        SchemaCommands::Show(args) => {
            let section = registry.get(&args.section).ok_or_else(|| {
                miette::miette!(
                    help = format!("Available sections: {}", registry.ids().collect::<Vec<_>>().join(", ")),
                    "Unknown section '{}'",
                    args.section
                )
            })?;
            if args.raw {
                println!("{}", serde_json::to_string_pretty(section.schema()).into_diagnostic()?);
                return Ok(());
            }
            if args.ui {
                println!("{}", serde_json::to_string_pretty(section.ui_layout()).into_diagnostic()?);
                return Ok(());
            }
            show_section(section, format)
        }
    }
}

fn list_sections(registry: &SchemaRegistry, format: OutputFormat, quiet: bool) -> Result<()> {
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        let summary: Vec<_> = registry
            .sections()
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id(),
                    "title": s.title(),
                    "required": s.required(),
                    "fields": s.root().properties.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect();
        return print_record(&summary, format);
    }

    let rows: Vec<TableRow> = registry
        .sections()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            TableRow::new(s.id())
                .cell("index", CellValue::Number(i as i64 + 1))
                .cell("id", CellValue::Id(s.id().to_string()))
                .cell("title", CellValue::Text(s.title().to_string()))
                .cell("required", CellValue::Check(s.required()))
                .cell("fields", CellValue::Number(s.root().properties.len() as i64))
        })
        .collect();
    TableFormatter::new(SECTION_COLUMNS, "section")
        .quiet(quiet)
        .output(&rows, format)
}

fn show_section(section: &Section, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_record(section.schema(), format);
    }

    println!("{} {}", style(section.title()).bold(), style(format!("({})", section.id())).dim());
    if let Some(desc) = section.schema().get("description").and_then(|d| d.as_str()) {
        println!("{}", desc);
    }
    if !section.required() {
        println!("{}", style("Optional section").dim());
    }

    let root = section.root();
    for group in section.groups() {
        println!();
        println!("{}", style(&group.label).cyan().bold());
        println!("  {:<24} {:<16} {:<12} {}", "NAME", "TYPE", "REQ", "DESCRIPTION");
        for name in &group.fields {
            let Some(field) = root.field(name) else {
                continue;
            };
            let required = if root.is_required(name) {
                "yes".to_string()
            } else if let Some(toggle) = root.toggle_for(name) {
                format!("if {}", toggle)
            } else {
                String::new()
            };
            println!(
                "  {:<24} {:<16} {:<12} {}",
                field.name,
                kind_label(&field.kind),
                required,
                truncate_str(describe(field).as_str(), 60)
            );
        }
    }

    println!();
    println!("Use --raw for the full JSON schema or --ui for the layout");
    Ok(())
}

fn describe(field: &FieldSpec) -> String {
    let mut text = field.description.clone().unwrap_or_else(|| field.label().to_string());
    if let FieldKind::Select { options } | FieldKind::MultiSelect { options, .. } = &field.kind {
        let values: Vec<String> = options
            .iter()
            .map(|o| o.as_str().map(String::from).unwrap_or_else(|| o.to_string()))
            .collect();
        text = format!("{} [{}]", text, values.join(", "));
    }
    text
}

fn kind_label(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text(_) => "text",
        FieldKind::Number(rules) if rules.integer => "integer",
        FieldKind::Number(_) => "number",
        FieldKind::Toggle => "toggle",
        FieldKind::Select { .. } => "select",
        FieldKind::MultiSelect { .. } => "multi-select",
        FieldKind::TextList { .. } => "text[]",
        FieldKind::Object(spec) if spec.allocation_total.is_some() => "allocation",
        FieldKind::Object(_) => "object",
        FieldKind::ObjectList { .. } => "object[]",
        FieldKind::Other => "any",
    }
}
