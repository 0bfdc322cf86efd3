pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "docusphere",
    about = "Docusphere validation workflow operator CLI",
    long_about = "Apply migrations, load demo data, inspect configuration, check readiness, and report validation progress.",
    after_help = "Examples:\n  docusphere doctor --json\n  docusphere config\n  docusphere progress vr-site-plan-c"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo users, documents and validation requests")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Report approval progress of one validation request")]
    Progress {
        #[arg(help = "Validation request id")]
        request_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Progress { request_id } => commands::progress::run(&request_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
