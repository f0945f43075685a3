pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "crewbot",
    about = "Crewbot operator CLI",
    long_about = "Inspect crewbot configuration, check runtime readiness, and run single bot commands offline.",
    after_help = "Examples:\n  crewbot doctor --json\n  crewbot config\n  crewbot invoke create_event name=\"Study Group\" time=5pm"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Discord token readiness, endpoints, and calendar access")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one bot command against a fresh registry and print the reply")]
    Invoke {
        #[arg(help = "Command name, e.g. hello or create_event")]
        command: String,
        #[arg(help = "Arguments as key=value pairs")]
        args: Vec<String>,
        #[arg(long, default_value = "cli-user", help = "Caller user id")]
        user_id: String,
        #[arg(long, default_value = "operator", help = "Caller display name")]
        user_name: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Invoke { command, args, user_id, user_name } => {
            commands::invoke::run(&command, &args, &user_id, &user_name)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
