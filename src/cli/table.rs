//! Table formatting utilities for CLI list commands
//!
//! Every list command describes its columns once and hands typed cells to
//! [`TableFormatter`], which renders TSV for the terminal, CSV, markdown or
//! bare IDs.

use chrono::{DateTime, Local, Utc};
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{format_money, truncate_str};
use crate::cli::OutputFormat;
use crate::entities::{FundingStatus, Role};

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Record ID (cyan)
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Funding status with color coding
    Status(FundingStatus),
    Role(Role),
    /// DateTime displayed as date only
    Date(DateTime<Utc>),
    /// DateTime displayed with time
    DateTime(DateTime<Utc>),
    Number(i64),
    /// Whole-dollar amount
    Money(Option<f64>),
    /// Yes/no marker (green check or dim dash)
    Check(bool),
    Empty,
}

impl CellValue {
    /// Format for TSV output (with colors if terminal)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => format!("{:<width$}", style(id).cyan(), width = width),
            CellValue::Text(s) => {
                format!("{:<width$}", truncate_str(s, width.saturating_sub(2)), width = width)
            }
            CellValue::Status(status) => {
                let s = status.to_string();
                let styled = match status {
                    FundingStatus::Pending => style(s).dim(),
                    FundingStatus::Verified => style(s).white(),
                    FundingStatus::InMeeting | FundingStatus::InDiscussion => style(s).yellow(),
                    FundingStatus::Funded => style(s).green().bold(),
                    FundingStatus::Rejected => style(s).red(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Check(true) => format!("{:<width$}", style("✓").green(), width = width),
            CellValue::Check(false) => format!("{:<width$}", style("-").dim(), width = width),
            CellValue::Number(_) | CellValue::Money(_) => {
                format!("{:>width$}", self.plain(), width = width)
            }
            _ => format!("{:<width$}", self.plain(), width = width),
        }
    }

    /// Uncolored value for CSV, markdown and ID output
    pub fn plain(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) => s.clone(),
            CellValue::Status(status) => status.to_string(),
            CellValue::Role(role) => role.to_string(),
            CellValue::Date(dt) => dt.with_timezone(&Local).format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Money(Some(amount)) => format_money(*amount),
            CellValue::Money(None) | CellValue::Empty => "-".to_string(),
            CellValue::Check(b) => if *b { "yes" } else { "no" }.to_string(),
        }
    }

    /// Display width of the content, for column sizing
    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Check(_) => 1,
            _ => self.plain().chars().count(),
        }
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// A row of cell values for table output
pub struct TableRow {
    pub id: String,
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: Vec::new(),
        }
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Renders rows in the requested format
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            show_summary: true,
        }
    }

    /// Drop the "N found" footer (for `--quiet`)
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.show_summary = !quiet;
        self
    }

    pub fn output(&self, rows: &[TableRow], format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Csv => self.output_csv(rows),
            OutputFormat::Md => {
                println!("{}", self.markdown(rows));
                Ok(())
            }
            OutputFormat::Id => {
                for row in rows {
                    println!("{}", row.id);
                }
                Ok(())
            }
            _ => {
                self.output_tsv(rows);
                Ok(())
            }
        }
    }

    fn widths(&self, rows: &[TableRow]) -> Vec<usize> {
        self.columns
            .iter()
            .map(|col| {
                let content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(CellValue::display_width)
                    .max()
                    .unwrap_or(0);
                col.header.len().max(content + 2).min(col.width)
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow]) {
        let widths = self.widths(rows);
        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        println!("{}", header.join(" "));
        let total: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total));

        for row in rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .zip(&widths)
                .map(|(col, w)| match row.get(col.key) {
                    Some(value) => value.format_tsv(*w),
                    None => CellValue::Empty.format_tsv(*w),
                })
                .collect();
            println!("{}", cells.join(" "));
        }

        if self.show_summary {
            println!();
            println!("{} {}(s) found.", style(rows.len()).cyan(), self.entity_name);
        }
    }

    fn output_csv(&self, rows: &[TableRow]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer
            .write_record(self.columns.iter().map(|c| c.key))
            .into_diagnostic()?;
        for row in rows {
            writer
                .write_record(self.columns.iter().map(|col| match row.get(col.key) {
                    Some(CellValue::Empty) | Some(CellValue::Money(None)) | None => String::new(),
                    Some(value) => value.plain(),
                }))
                .into_diagnostic()?;
        }
        writer.flush().into_diagnostic()
    }

    /// Markdown table of the rows
    pub fn markdown(&self, rows: &[TableRow]) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
        for row in rows {
            builder.push_record(self.columns.iter().map(|col| {
                row.get(col.key)
                    .map(CellValue::plain)
                    .unwrap_or_else(|| "-".to_string())
                    .replace('|', "\\|")
            }));
        }
        builder.build().with(Style::markdown()).to_string()
    }
}
