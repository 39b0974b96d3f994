// saresp CLI - reconcile and join school assessment tables

mod exit_codes;
mod normalize;
mod pipeline;
mod stats;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::EXIT_SUCCESS;
use stats::StatsCommands;

#[derive(Parser)]
#[command(name = "saresp")]
#[command(about = "Reconcile column names and join SARESP / Simulado exports into one table")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source, run the pipeline and emit the unified table
    #[command(after_help = "\
Examples:
  saresp run pipeline.toml > unified.csv
  saresp run pipeline.toml --output unified.csv --report diagnostics.json
  saresp run pipeline.toml --json
  saresp run pipeline.toml --strict")]
    Run {
        /// Path to the pipeline TOML file
        config: PathBuf,

        /// Output the full JSON result to stdout instead of CSV
        #[arg(long)]
        json: bool,

        /// Write the unified table as CSV to this file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write summary, join stats and diagnostics as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Exit with code 6 when any rows were dropped or columns unrecognized
        #[arg(long)]
        strict: bool,
    },

    /// Validate a pipeline config without loading any data
    #[command(after_help = "\
Examples:
  saresp validate pipeline.toml")]
    Validate {
        /// Path to the pipeline TOML file
        config: PathBuf,
    },

    /// Show how a file's column headers map onto canonical names
    #[command(after_help = "\
Examples:
  saresp normalize saresp_sul1.csv
  saresp normalize export.csv --aliases extra-aliases.toml
  saresp normalize \"https://drive.google.com/file/d/<id>/view\" --json")]
    Normalize {
        /// CSV file path or URL
        file: String,

        /// TOML file with an [aliases] table layered over the built-ins
        #[arg(long)]
        aliases: Option<PathBuf>,

        /// Start from an empty alias table
        #[arg(long)]
        no_builtin: bool,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Summary statistics over a (unified) table
    #[command(subcommand)]
    Stats(StatsCommands),
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  saresp-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: saresp <command> [options]");
            eprintln!("       saresp --help for more information");
            Ok(())
        }
        Some(Commands::Run { config, json, output, report, strict }) => {
            pipeline::cmd_run(config, json, output, report, strict)
        }
        Some(Commands::Validate { config }) => pipeline::cmd_validate(config),
        Some(Commands::Normalize { file, aliases, no_builtin, json }) => {
            normalize::cmd_normalize(file, aliases, no_builtin, json)
        }
        Some(Commands::Stats(cmd)) => stats::cmd_stats(cmd),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
