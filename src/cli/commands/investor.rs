//! `fundr investor` command - Find investors to ask for funding

use clap::Subcommand;
use miette::Result;

use crate::cli::helpers::{print_record, Workspace};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum InvestorCommands {
    /// List registered investors (founders)
    List,
}

const INVESTOR_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("id", "ID", 32),
    ColumnDef::new("name", "NAME", 24),
    ColumnDef::new("email", "EMAIL", 32),
    ColumnDef::new("joined", "JOINED", 12),
];

pub fn run(cmd: InvestorCommands, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let session = ws.session(&backend)?;
    let format = ws.format(global);

    match cmd {
        InvestorCommands::List => {
            let investors = backend
                .list_investors(&session)
                .map_err(|e| miette::miette!("{}", e))?;
            if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
                return print_record(&investors, format);
            }
            let rows: Vec<TableRow> = investors
                .iter()
                .map(|u| {
                    TableRow::new(u.id.to_string())
                        .cell("id", CellValue::Id(u.id.to_string()))
                        .cell("name", CellValue::Text(u.name.clone()))
                        .cell("email", CellValue::Text(u.email.clone()))
                        .cell("joined", CellValue::Date(u.created))
                })
                .collect();
            TableFormatter::new(INVESTOR_COLUMNS, "investor")
                .quiet(global.quiet)
                .output(&rows, format)
        }
    }
}
