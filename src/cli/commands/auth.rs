//! `fundr auth` command - Accounts and sign-in

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Password};
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{print_record, Workspace};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::backend::AuthResponse;
use crate::core::session::Session;
use crate::entities::Role;

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Create an account and sign in
    Register {
        /// Email address (used to log in)
        email: String,

        /// Display name
        name: String,

        /// Which side of the marketplace you are on
        #[arg(long, short = 'r', value_enum)]
        role: Role,

        /// Password (prompted when omitted)
        #[arg(long, env = "FUNDR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with an existing account
    Login {
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "FUNDR_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and revoke the saved session
    Logout,

    /// Show the signed-in user
    Whoami,
}

pub fn run(cmd: AuthCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        AuthCommands::Register {
            email,
            name,
            role,
            password,
        } => run_register(&email, &name, role, password, global),
        AuthCommands::Login { email, password } => run_login(&email, password, global),
        AuthCommands::Logout => run_logout(global),
        AuthCommands::Whoami => run_whoami(global),
    }
}

fn password_or_prompt(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let theme = ColorfulTheme::default();
    let mut prompt = Password::with_theme(&theme).with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().into_diagnostic()
}

fn run_register(
    email: &str,
    name: &str,
    role: Role,
    password: Option<String>,
    global: &GlobalOpts,
) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let password = password_or_prompt(password, true)?;
    let auth = backend
        .register(email, &password, name, role)
        .map_err(|e| miette::miette!("{}", e))?;
    save_and_report(&ws, &backend, auth, "Registered", global)
}

fn run_login(email: &str, password: Option<String>, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let password = password_or_prompt(password, false)?;
    let auth = backend
        .login(email, &password)
        .map_err(|e| miette::miette!("{}", e))?;
    save_and_report(&ws, &backend, auth, "Logged in", global)
}

fn save_and_report(
    ws: &Workspace,
    backend: &crate::core::backend::Backend,
    auth: AuthResponse,
    verb: &str,
    global: &GlobalOpts,
) -> Result<()> {
    let file = ws.session_file();
    if let Some(previous) = file.token() {
        // Signing in as someone else replaces the old session
        backend.logout(&previous).map_err(|e| miette::miette!("{}", e))?;
    }
    let session = Session::begin(backend, auth.token).map_err(|e| miette::miette!("{}", e))?;
    file.save(&session).into_diagnostic()?;

    if !global.quiet {
        let user = session.user();
        println!(
            "{} {} as {} ({})",
            style("✓").green(),
            verb,
            style(&user.email).cyan(),
            user.role
        );
    }
    Ok(())
}

fn run_logout(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let file = ws.session_file();

    match file.resume(&backend) {
        Ok(session) => {
            let email = session.user().email.clone();
            session.end(&backend).map_err(|e| miette::miette!("{}", e))?;
            if !global.quiet {
                println!("{} Logged out {}", style("✓").green(), style(email).cyan());
            }
        }
        Err(_) => {
            if !global.quiet {
                println!("{} Not logged in", style("!").yellow());
            }
        }
    }
    file.remove().into_diagnostic()?;
    Ok(())
}

fn run_whoami(global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open(global)?;
    let backend = ws.backend()?;
    let session = ws.session(&backend)?;
    let user = session.user();

    match ws.format(global) {
        OutputFormat::Id => println!("{}", user.id),
        OutputFormat::Json | OutputFormat::Yaml => print_record(user, ws.format(global))?,
        _ => {
            println!("{} <{}>", style(&user.name).bold(), user.email);
            println!("  Role: {}", user.role);
            println!("  ID:   {}", style(&user.id).cyan());
        }
    }
    Ok(())
}
