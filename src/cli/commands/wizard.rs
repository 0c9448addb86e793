//! `fundr wizard` command - Build and submit the startup profile
//!
//! Every invocation resumes the stored draft, so the wizard can be filled
//! interactively in one sitting or section by section from files.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::helpers::{print_record, read_data_file, Workspace};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::backend::ProfileSubmitter;
use crate::core::submission::SubmissionReceipt;
use crate::entities::Role;
use crate::schema::{
    render_section, Advance, PreviewContext, Prompter, SchemaRegistry, TemplateGenerator,
    TerminalPrompter, ValidationReport, WizardController, WizardError, WizardState,
};

#[derive(Subcommand, Debug)]
pub enum WizardCommands {
    /// Fill in the profile interactively
    Run,

    /// Show progress through the sections
    Status,

    /// Save a section from a JSON/YAML file and advance past it
    Fill(FillArgs),

    /// Render the assembled profile as markdown
    Preview(PreviewArgs),

    /// Submit a complete draft (retry after a failed submission)
    Submit,

    /// Discard the draft and start over
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct FillArgs {
    /// Section id (pitch, team, traction, ...)
    pub section: String,

    /// JSON or YAML file with the section data
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct PreviewArgs {
    /// Write the preview to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

const STATUS_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("index", "#", 4),
    ColumnDef::new("id", "SECTION", 12),
    ColumnDef::new("title", "TITLE", 28),
    ColumnDef::new("required", "REQUIRED", 10),
    ColumnDef::new("complete", "COMPLETE", 10),
    ColumnDef::new("current", "CURRENT", 9),
];

pub fn run(cmd: WizardCommands, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let (registry, controller) = open_controller(&ws)?;

    match cmd {
        WizardCommands::Run => run_interactive(&controller),
        WizardCommands::Status => run_status(&controller, ws.format(global), global.quiet),
        WizardCommands::Fill(args) => run_fill(&controller, args, global),
        WizardCommands::Preview(args) => run_preview(&ws, &registry, &controller.state(), args),
        WizardCommands::Submit => {
            let receipt = controller.submit().map_err(wizard_error)?;
            report_submitted(&receipt);
            Ok(())
        }
        WizardCommands::Reset { yes } => run_reset(&controller, yes, global),
    }
}

/// Resume the founder's stored draft
fn open_controller(ws: &Workspace) -> Result<(Arc<SchemaRegistry>, WizardController)> {
    let registry = ws.registry()?;
    let backend = ws.backend()?;
    let session = ws.session(&backend)?;
    session
        .require(Role::Founder)
        .map_err(|e| miette::miette!("{}", e))?;

    let store = Arc::new(ws.draft_store(&registry));
    let target = Arc::new(ProfileSubmitter::new(backend, session));
    let controller = WizardController::resume(Arc::clone(&registry), store, target)
        .with_submit_timeout(ws.config.submit_timeout());
    Ok((registry, controller))
}

fn wizard_error(e: WizardError) -> miette::Report {
    match e {
        WizardError::Incomplete(incomplete) => miette::miette!(
            help = "Fill the missing sections with 'fundr wizard fill <section> <file>'",
            "{} (missing: {})",
            incomplete,
            incomplete.missing.join(", ")
        ),
        WizardError::Submit(failure) => miette::miette!(
            help = "Your draft is saved. Run 'fundr wizard submit' to try again",
            "{}",
            failure
        ),
        other => miette::miette!("{}", other),
    }
}

fn report_submitted(receipt: &SubmissionReceipt) {
    println!(
        "{} Profile submitted: {}",
        style("✓").green(),
        style(&receipt.id).cyan()
    );
    if let Some(message) = &receipt.message {
        println!("  {}", message);
    }
}

fn run_fill(controller: &WizardController, args: FillArgs, global: &GlobalOpts) -> Result<()> {
    let registry = controller.registry();
    let index = registry.index_of(&args.section).ok_or_else(|| {
        miette::miette!(
            help = format!("Available sections: {}", registry.ids().collect::<Vec<_>>().join(", ")),
            "Unknown section '{}'",
            args.section
        )
    })?;
    let data = read_data_file(&args.file)?;

    if index != controller.current_index() {
        controller.jump_to(&args.section).map_err(wizard_error)?;
    }
    controller.update_current(data).map_err(wizard_error)?;

    match controller.advance().map_err(wizard_error)? {
        Advance::Refused(result) => Err(ValidationReport::new(&args.section, &result).into()),
        Advance::Moved { to, .. } => {
            if !global.quiet {
                let title = registry.section_at(index).map(|s| s.title()).unwrap_or_default();
                println!(
                    "{} Saved {} ({}/{})",
                    style("✓").green(),
                    style(title).bold(),
                    index + 1,
                    registry.len()
                );
                if let Some(next) = registry.section_at(to) {
                    println!("  Next: {} ({})", next.title(), style(next.id()).cyan());
                }
            }
            Ok(())
        }
        Advance::Submitted(receipt) => {
            report_submitted(&receipt);
            Ok(())
        }
    }
}

fn run_status(controller: &WizardController, format: OutputFormat, quiet: bool) -> Result<()> {
    let state = controller.state();
    if matches!(format, OutputFormat::Json | OutputFormat::Yaml) {
        return print_record(&state, format);
    }

    let registry = controller.registry();
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
                .cell("complete", CellValue::Check(state.draft.is_complete(s.id())))
                .cell("current", CellValue::Check(i == state.current_section_index))
        })
        .collect();
    TableFormatter::new(STATUS_COLUMNS, "section")
        .quiet(true)
        .output(&rows, format)?;

    if !quiet && !matches!(format, OutputFormat::Csv | OutputFormat::Id) {
        println!();
        println!(
            "{} of {} sections complete",
            style(state.draft.completed_count()).cyan(),
            registry.len()
        );
    }
    Ok(())
}

fn run_preview(
    ws: &Workspace,
    registry: &SchemaRegistry,
    state: &WizardState,
    args: PreviewArgs,
) -> Result<()> {
    let ctx = PreviewContext::from_draft(registry, &state.draft, ws.config.author());
    let generator = TemplateGenerator::new().map_err(|e| miette::miette!("{}", e))?;
    let rendered = generator
        .render_preview(&ctx)
        .map_err(|e| miette::miette!("{}", e))?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered).into_diagnostic()?;
            println!(
                "{} Wrote preview to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn run_reset(controller: &WizardController, yes: bool, global: &GlobalOpts) -> Result<()> {
    if !yes {
        let confirmed = TerminalPrompter::new().confirm("Discard the saved draft and start over?", false)?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }
    controller.reset().map_err(wizard_error)?;
    if !global.quiet {
        println!("{} Draft discarded", style("✓").green());
    }
    Ok(())
}

/// Printed when leaving the interactive wizard after a refusal
const QUIT_NOTICE: &str = "Completed sections are saved. Unsaved changes to this section are discarded. \
     Run 'fundr wizard run' to continue.";

/// What to do after a section fails validation
enum AfterRefusal {
    Edit,
    Back,
    Jump,
    Quit,
}

fn run_interactive(controller: &WizardController) -> Result<()> {
    let mut prompter = TerminalPrompter::new();
    let registry = controller.registry();
    let total = registry.len();

    loop {
        let section = controller.current_section().map_err(wizard_error)?;
        let index = controller.current_index();
        println!();
        println!(
            "{} {}",
            style(format!("Step {}/{}", index + 1, total)).dim(),
            style(section.title()).bold()
        );

        let data = render_section(section, Some(&controller.current_data()), &mut prompter)?;
        controller.update_current(data).map_err(wizard_error)?;

        match controller.advance() {
            Ok(Advance::Moved { .. }) => {
                println!("{} Saved {}", style("✓").green(), section.title());
            }
            Ok(Advance::Submitted(receipt)) => {
                report_submitted(&receipt);
                return Ok(());
            }
            Ok(Advance::Refused(result)) => {
                for error in &result.errors {
                    prompter.notice(&format!("{}: {}", error.field_path, error.message));
                }
                match ask_after_refusal(&mut prompter, controller)? {
                    AfterRefusal::Edit => {}
                    AfterRefusal::Back => {
                        controller.retreat().map_err(wizard_error)?;
                    }
                    AfterRefusal::Jump => {
                        let reachable = controller
                            .state()
                            .highest_validated
                            .map_or(0, |h| h + 1);
                        let options: Vec<String> = registry
                            .sections()
                            .iter()
                            .take(reachable)
                            .map(|s| s.title().to_string())
                            .collect();
                        let choice = prompter.select("Jump to", &options, 0)?;
                        if let Some(target) = registry.section_at(choice) {
                            controller.jump_to(target.id()).map_err(wizard_error)?;
                        }
                    }
                    AfterRefusal::Quit => {
                        println!("{}", QUIT_NOTICE);
                        return Ok(());
                    }
                }
            }
            Err(WizardError::Incomplete(incomplete)) => {
                prompter.notice(&incomplete.to_string());
            }
            Err(WizardError::Submit(failure)) => {
                prompter.notice(&failure.to_string());
                loop {
                    if !prompter.confirm("Retry submission?", true)? {
                        println!("Draft saved. Run 'fundr wizard submit' to retry.");
                        return Ok(());
                    }
                    match controller.submit() {
                        Ok(receipt) => {
                            report_submitted(&receipt);
                            return Ok(());
                        }
                        Err(WizardError::Submit(failure)) => prompter.notice(&failure.to_string()),
                        Err(e) => return Err(wizard_error(e)),
                    }
                }
            }
            Err(e) => return Err(wizard_error(e)),
        }
    }
}

fn ask_after_refusal(
    prompter: &mut dyn Prompter,
    controller: &WizardController,
) -> Result<AfterRefusal> {
    let mut options = vec![("Edit this section again", AfterRefusal::Edit)];
    if controller.current_index() > 0 {
        options.push(("Go back to the previous section", AfterRefusal::Back));
    }
    if controller.state().highest_validated.is_some() {
        options.push(("Jump to a completed section", AfterRefusal::Jump));
    }
    options.push(("Quit and discard changes to this section", AfterRefusal::Quit));

    let labels: Vec<String> = options.iter().map(|(label, _)| label.to_string()).collect();
    let choice = prompter.select("What next?", &labels, 0)?;
    Ok(options
        .into_iter()
        .nth(choice)
        .map(|(_, action)| action)
        .unwrap_or(AfterRefusal::Edit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::draft::MemoryDraftStore;
    use crate::core::submission::{SubmissionPayload, SubmissionTarget, SubmitResult};
    use serde_json::json;

    struct Unused;

    impl SubmissionTarget for Unused {
        fn submit(&self, _payload: &SubmissionPayload) -> SubmitResult {
            panic!("nothing should be submitted");
        }
    }

    /// Picks the last option offered and remembers the labels
    #[derive(Default)]
    struct PickLast {
        offered: Vec<String>,
    }

    impl Prompter for PickLast {
        fn text(&mut self, label: &str, _initial: Option<&str>, _allow_empty: bool) -> Result<String> {
            panic!("unexpected text prompt '{}'", label);
        }

        fn select(&mut self, _label: &str, options: &[String], _initial: usize) -> Result<usize> {
            self.offered = options.to_vec();
            Ok(options.len() - 1)
        }

        fn multi_select(&mut self, label: &str, _options: &[String], _selected: &[bool]) -> Result<Vec<usize>> {
            panic!("unexpected multi-select '{}'", label);
        }

        fn confirm(&mut self, label: &str, _initial: bool) -> Result<bool> {
            panic!("unexpected confirm '{}'", label);
        }
    }

    #[test]
    fn test_quit_after_refusal_warns_about_discarded_edits() {
        let registry = Arc::new(SchemaRegistry::embedded().unwrap());
        let controller = WizardController::new(registry, Arc::new(MemoryDraftStore::new()), Arc::new(Unused));
        controller.update_current(json!({ "oneLiner": "Short" })).unwrap();

        let mut prompter = PickLast::default();
        let choice = ask_after_refusal(&mut prompter, &controller).unwrap();

        assert!(matches!(choice, AfterRefusal::Quit));
        let label = prompter.offered.last().unwrap();
        assert!(label.contains("discard"), "{}", label);
        assert!(!label.contains("Save"));
        assert!(QUIT_NOTICE.contains("Unsaved changes to this section are discarded"));
    }
}
