use clap::Parser;
use miette::Result;
use fundr::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Terminate quietly on a closed pipe (`fundr request list | head`)
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    fundr::logging::init(global.verbose);

    match cli.command {
        Commands::Init(args) => fundr::cli::commands::init::run(args),
        Commands::Auth(cmd) => fundr::cli::commands::auth::run(cmd, &global),
        Commands::Wizard(cmd) => fundr::cli::commands::wizard::run(cmd, &global),
        Commands::Schema(cmd) => fundr::cli::commands::schema::run(cmd, &global),
        Commands::Validate(args) => fundr::cli::commands::validate::run(args, &global),
        Commands::Startup(cmd) => fundr::cli::commands::startup::run(cmd, &global),
        Commands::Investor(cmd) => fundr::cli::commands::investor::run(cmd, &global),
        Commands::Request(cmd) => fundr::cli::commands::request::run(cmd, &global),
        Commands::Completions(args) => fundr::cli::commands::completions::run(args),
    }
}
