//! `fundr request` command - Funding requests between founders and investors

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{print_record, truncate_str, Workspace};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::backend::RequestView;
use crate::core::identity::{RecordId, RecordPrefix};
use crate::entities::FundingStatus;

#[derive(Subcommand, Debug)]
pub enum RequestCommands {
    /// Ask an investor to fund your startup (founders)
    New {
        /// Investor user ID (USR-...)
        investor: String,
    },

    /// List funding requests you sent or received
    List {
        /// Only show requests in this status
        #[arg(long, short = 's')]
        status: Option<FundingStatus>,
    },

    /// Show a request addressed to you (investors)
    Show {
        /// Request ID (FRQ-...)
        id: String,
    },

    /// Move a request to a new status (investors)
    Status {
        /// Request ID (FRQ-...)
        id: String,

        /// New status: pending, verified, in_meeting, in_discussion, funded, rejected
        status: FundingStatus,

        /// Replace the review notes
        #[arg(long)]
        notes: Option<String>,

        /// Meeting time (RFC 3339, or "YYYY-MM-DD HH:MM" in local time)
        #[arg(long, value_parser = parse_meeting)]
        meeting: Option<DateTime<Utc>>,
    },

    /// Count requests by status (investors)
    Stats,
}

const REQUEST_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("company", "COMPANY", 24),
    ColumnDef::new("founder", "FOUNDER", 20),
    ColumnDef::new("investor", "INVESTOR", 20),
    ColumnDef::new("status", "STATUS", 14),
    ColumnDef::new("meeting", "MEETING", 17),
    ColumnDef::new("updated", "UPDATED", 12),
];

pub fn run(cmd: RequestCommands, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let session = ws.session(&backend)?;
    let format = ws.format(global);

    match cmd {
        RequestCommands::New { investor } => {
            let investor = parse_record(&investor, RecordPrefix::Usr)?;
            let request = backend
                .create_request(&session, &investor)
                .map_err(|e| miette::miette!("{}", e))?;
            match format {
                OutputFormat::Id => println!("{}", request.id),
                OutputFormat::Json | OutputFormat::Yaml => return print_record(&request, format),
                _ => {
                    println!(
                        "{} Sent funding request {}",
                        style("✓").green(),
                        style(&request.id).cyan()
                    );
                    println!("  Status: {}", request.status);
                }
            }
            Ok(())
        }
        RequestCommands::List { status } => {
            let requests = backend
                .list_requests(&session, status)
                .map_err(|e| miette::miette!("{}", e))?;
            if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
                return print_record(&requests, format);
            }
            let rows: Vec<TableRow> = requests.iter().map(request_row).collect();
            TableFormatter::new(REQUEST_COLUMNS, "request")
                .quiet(global.quiet)
                .output(&rows, format)
        }
        RequestCommands::Show { id } => {
            let id = parse_record(&id, RecordPrefix::Frq)?;
            let view = backend
                .get_request(&session, &id)
                .map_err(|e| miette::miette!("{}", e))?;
            match format {
                OutputFormat::Auto | OutputFormat::Tsv | OutputFormat::Md => {
                    print_view(&view);
                    Ok(())
                }
                OutputFormat::Id => {
                    println!("{}", view.request.id);
                    Ok(())
                }
                other => print_record(&view, other),
            }
        }
        RequestCommands::Status {
            id,
            status,
            notes,
            meeting,
        } => {
            let id = parse_record(&id, RecordPrefix::Frq)?;
            let request = backend
                .update_status(&session, &id, status, notes, meeting)
                .map_err(|e| miette::miette!("{}", e))?;
            match format {
                OutputFormat::Json | OutputFormat::Yaml => print_record(&request, format),
                _ => {
                    if !global.quiet {
                        println!(
                            "{} {} is now {}",
                            style("✓").green(),
                            style(&request.id).cyan(),
                            style(request.status).bold()
                        );
                    }
                    Ok(())
                }
            }
        }
        RequestCommands::Stats => {
            let counts = backend
                .status_counts(&session)
                .map_err(|e| miette::miette!("{}", e))?;
            if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
                return print_record(&counts, format);
            }
            for status in FundingStatus::all() {
                println!("{:<14} {}", status.as_str(), counts.get(*status));
            }
            println!("{:<14} {}", "total", style(counts.total()).bold());
            Ok(())
        }
    }
}

fn parse_record(s: &str, prefix: RecordPrefix) -> Result<RecordId> {
    RecordId::parse_as(s, prefix).map_err(|e| miette::miette!("{}", e))
}

/// Accept RFC 3339 or a local "YYYY-MM-DD HH:MM"
fn parse_meeting(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("Invalid meeting time '{}' (use RFC 3339 or YYYY-MM-DD HH:MM)", s))
}

fn request_row(view: &RequestView) -> TableRow {
    let r = &view.request;
    TableRow::new(r.id.to_string())
        .cell("id", CellValue::Id(r.id.to_string()))
        .cell("company", CellValue::Text(view.company_name.clone()))
        .cell("founder", CellValue::Text(view.founder_name.clone()))
        .cell("investor", CellValue::Text(view.investor_name.clone()))
        .cell("status", CellValue::Status(r.status))
        .cell(
            "meeting",
            r.meeting_schedule
                .map(CellValue::DateTime)
                .unwrap_or(CellValue::Empty),
        )
        .cell("updated", CellValue::Date(r.updated))
}

fn print_view(view: &RequestView) {
    let r = &view.request;
    println!("{}", style(&view.company_name).bold());
    println!();
    println!("  ID:       {}", style(&r.id).cyan());
    println!("  Startup:  {}", r.startup);
    println!("  Founder:  {} <{}>", view.founder_name, view.founder_email);
    println!("  Status:   {}", style(r.status).bold());
    if let Some(meeting) = r.meeting_schedule {
        println!(
            "  Meeting:  {}",
            meeting.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    println!("  Created:  {}", r.created.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    println!("  Updated:  {}", r.updated.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    if let Some(notes) = &r.notes {
        println!();
        println!("{}", style("Notes").bold());
        println!("  {}", truncate_str(notes, 2000));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meeting_rfc3339() {
        let dt = parse_meeting("2026-03-01T15:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-01T15:30:00+00:00");
    }

    #[test]
    fn test_parse_meeting_local_form() {
        assert!(parse_meeting("2026-03-01 15:30").is_ok());
    }

    #[test]
    fn test_parse_meeting_rejects_garbage() {
        let err = parse_meeting("next tuesday").unwrap_err();
        assert!(err.contains("next tuesday"));
    }
}
