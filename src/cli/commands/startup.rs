//! `fundr startup` command - Browse submitted startup profiles

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{format_money, print_record, Workspace};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::{RecordId, RecordPrefix};
use crate::entities::Startup;

#[derive(Subcommand, Debug)]
pub enum StartupCommands {
    /// List all startups (investors)
    List,

    /// Show one startup profile
    Show {
        /// Startup ID (STU-...)
        id: String,
    },
}

const STARTUP_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("company", "COMPANY", 28),
    ColumnDef::new("team", "TEAM", 6),
    ColumnDef::new("funding", "FUNDING", 14),
    ColumnDef::new("created", "CREATED", 12),
];

pub fn run(cmd: StartupCommands, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let session = ws.session(&backend)?;
    let format = ws.format(global);

    match cmd {
        StartupCommands::List => {
            let startups = backend
                .list_startups(&session)
                .map_err(|e| miette::miette!("{}", e))?;
            if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
                return print_record(&startups, format);
            }
            let rows: Vec<TableRow> = startups.iter().map(startup_row).collect();
            TableFormatter::new(STARTUP_COLUMNS, "startup")
                .quiet(global.quiet)
                .output(&rows, format)
        }
        StartupCommands::Show { id } => {
            let id = RecordId::parse_as(&id, RecordPrefix::Stu).map_err(|e| miette::miette!("{}", e))?;
            let startup = backend
                .get_startup(&session, &id)
                .map_err(|e| miette::miette!("{}", e))?;
            match format {
                OutputFormat::Auto | OutputFormat::Tsv | OutputFormat::Md => {
                    print_summary(&startup);
                    Ok(())
                }
                OutputFormat::Id => {
                    println!("{}", startup.id);
                    Ok(())
                }
                other => print_record(&startup, other),
            }
        }
    }
}

fn startup_row(s: &Startup) -> TableRow {
    TableRow::new(s.id.to_string())
        .cell("id", CellValue::Id(s.id.to_string()))
        .cell("company", CellValue::Text(s.company_name.clone()))
        .cell(
            "team",
            s.team_size
                .map(|n| CellValue::Number(i64::from(n)))
                .unwrap_or(CellValue::Empty),
        )
        .cell("funding", CellValue::Money(s.funding_needed))
        .cell("created", CellValue::Date(s.created))
}

fn print_summary(s: &Startup) {
    println!("{}", style(&s.company_name).bold());
    if let Some(desc) = &s.description {
        println!("{}", desc);
    }
    println!();
    println!("  ID:        {}", style(&s.id).cyan());
    println!("  Founder:   {}", s.founder);
    if let Some(size) = s.team_size {
        println!("  Team size: {}", size);
    }
    if let Some(amount) = s.funding_needed {
        println!("  Seeking:   {}", format_money(amount));
    }
    if !s.tech_stack.is_empty() {
        println!("  Stack:     {}", s.tech_stack.join(", "));
    }
    if !s.milestones.is_empty() {
        println!();
        println!("{}", style("Milestones").bold());
        for m in &s.milestones {
            println!(
                "  {} {}",
                style(m.date.as_deref().unwrap_or("----------")).dim(),
                m.title
            );
        }
    }
    if !s.documents.is_empty() {
        println!();
        println!("{}", style("Documents").bold());
        for (kind, reference) in &s.documents {
            println!("  {:<24} {}", kind, reference);
        }
    }
    println!();
    println!("Use -f yaml for the full profile");
}
