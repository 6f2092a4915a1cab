pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "enrollment",
    about = "Enrollment assistant operator CLI",
    long_about = "Operate the enrollment assistant: migrations, demo catalog seeding, config inspection, and readiness checks.",
    after_help = "Examples:\n  enrollment migrate\n  enrollment seed\n  enrollment doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the demo degree/course catalog (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity and catalog presence")]
    Doctor {
        #[arg(long, help = "Emit the full machine-readable report")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn doctor_accepts_json_flag() {
        let cli = Cli::try_parse_from(["enrollment", "doctor", "--json"]).expect("parse");
        assert!(matches!(cli.command, Command::Doctor { json: true }));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["enrollment", "start"]).is_err());
    }
}
