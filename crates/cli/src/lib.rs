pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "skillmatch",
    about = "SkillMatch operator CLI",
    long_about = "Prepare the SkillMatch skill directory: apply migrations, load the demo fixture, and inspect effective configuration.",
    after_help = "Examples:\n  skillmatch migrate\n  skillmatch seed\n  skillmatch config --file config/skillmatch.toml"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic skill directory fixture (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config {
        #[arg(long, help = "Read this config file instead of the default search path")]
        file: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config { file } => commands::config::run(file),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
