//! `fundr validate` command - Check section data without touching the draft

use console::style;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::helpers::{print_record, read_data_file, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::schema::{SchemaRegistry, SectionValidator, ValidationReport};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Section id (pitch, team, traction, ...)
    pub section: String,

    /// JSON or YAML file with the section data
    pub file: PathBuf,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let (registry, format) = match Workspace::open(global) {
        Ok(ws) => (ws.registry()?, ws.format(global)),
        Err(_) => (
            Arc::new(SchemaRegistry::embedded().map_err(|e| miette::miette!("{}", e))?),
            global.format,
        ),
    };
    let data = read_data_file(&args.file)?;

    let validator = SectionValidator::new(registry);
    let result = validator
        .validate(&args.section, &data)
        .map_err(|e| miette::miette!("{}", e))?;

    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        print_record(&result, format)?;
        if !result.valid {
            return Err(miette::miette!("{} error(s) in '{}'", result.errors.len(), args.section));
        }
        return Ok(());
    }

    if !result.valid {
        return Err(ValidationReport::new(&args.section, &result).into());
    }
    if !global.quiet {
        println!(
            "{} {} is valid",
            style("✓").green(),
            style(args.file.display()).cyan()
        );
    }
    Ok(())
}
