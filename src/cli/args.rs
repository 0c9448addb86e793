//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    auth::AuthCommands, completions::CompletionsArgs, init::InitArgs,
    investor::InvestorCommands, request::RequestCommands, schema::SchemaCommands,
    startup::StartupCommands, validate::ValidateArgs, wizard::WizardCommands,
};

#[derive(Parser)]
#[command(name = "fundr")]
#[command(author, version, about = "Founder/investor funding toolkit")]
#[command(long_about = "Build a startup profile through a schema-driven wizard, submit it, and manage funding requests between founders and investors.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .fundr/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new fundr project
    Init(InitArgs),

    /// Register, log in and out
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Startup profile wizard
    #[command(subcommand)]
    Wizard(WizardCommands),

    /// Inspect section schemas
    #[command(subcommand)]
    Schema(SchemaCommands),

    /// Validate section data from a file
    Validate(ValidateArgs),

    /// Browse submitted startups (investors)
    #[command(subcommand)]
    Startup(StartupCommands),

    /// Browse investors (founders)
    #[command(subcommand)]
    Investor(InvestorCommands),

    /// Funding requests
    #[command(subcommand)]
    Request(RequestCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
