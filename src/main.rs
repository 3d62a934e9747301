//! emplace-sense command line entry point.

use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::Path;

use emplace_sense::Settings;
use emplace_sense::cli::commands::{self, signatures::SignaturesArgs};
use emplace_sense::cli::{Cli, Commands};
use emplace_sense::logging;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // Init must work before any settings file exists
        Commands::Init { force } => {
            logging::init();
            commands::init::run_init(force)
        }
        Commands::Config => commands::init::run_config(&configure(cli.config.as_deref())?),
        Commands::Signatures {
            file,
            line,
            stdin,
            flags,
            json,
        } => commands::signatures::run(
            SignaturesArgs {
                file: &file,
                line,
                stdin,
                flags: &flags,
                json,
            },
            &configure(cli.config.as_deref())?,
        ),
        Commands::Dump {
            file,
            output,
            max_depth,
        } => commands::dump::run(&file, output, max_depth, &configure(cli.config.as_deref())?),
    }
}

/// Load settings from `--config` or the workspace, then start logging.
fn configure(config: Option<&Path>) -> Result<Settings> {
    let settings = match config {
        Some(path) => Settings::load_from(path).map_err(|e| anyhow!("{e}"))?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Warning: could not load settings, using defaults: {e}");
            Settings::default()
        }),
    };
    logging::init_for_settings(&settings);
    Ok(settings)
}
