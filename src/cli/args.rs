//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Constructor signature help for emplace calls
#[derive(Parser, Debug)]
#[command(
    name = "emplace-sense",
    version = env!("CARGO_PKG_VERSION"),
    about = "Constructor signature help for emplace calls",
    long_about = "Show which constructors an `emplace`/`emplace_back` call on a C++ container can reach.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  emplace-sense signatures src/main.cpp --line 42\n  emplace-sense signatures src/main.cpp --line 42 --json\n  emplace-sense dump src/main.cpp > ast.jsonl\n  emplace-sense init"
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration file
    #[command(about = "Set up .emplace-sense directory with default settings")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show constructor signatures for emplace calls on a line
    #[command(about = "List constructor signatures for emplace calls on a line")]
    Signatures {
        /// C++ source file
        file: PathBuf,

        /// 1-based line of the emplace call
        #[arg(short, long)]
        line: u32,

        /// Read file contents from stdin instead of disk (unsaved buffer)
        #[arg(long)]
        stdin: bool,

        /// Extra compiler flags, appended to the configured ones
        #[arg(short = 'f', long = "flag", allow_hyphen_values = true)]
        flags: Vec<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Parse a file and output lowered AST nodes in JSONL format
    #[command(about = "Parse file and output the lowered AST as JSON Lines")]
    Dump {
        /// File to parse
        file: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum depth to traverse
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,
    },

    /// Show current configuration
    #[command(about = "Display active settings")]
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signatures_command() {
        let cli = Cli::parse_from([
            "emplace-sense",
            "signatures",
            "main.cpp",
            "--line",
            "12",
            "--flag",
            "-Iinclude",
            "--json",
        ]);
        match cli.command {
            Commands::Signatures {
                file,
                line,
                flags,
                json,
                stdin,
            } => {
                assert_eq!(file, PathBuf::from("main.cpp"));
                assert_eq!(line, 12);
                assert_eq!(flags, vec!["-Iinclude"]);
                assert!(json);
                assert!(!stdin);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["emplace-sense", "config", "--config", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn test_line_is_required() {
        assert!(Cli::try_parse_from(["emplace-sense", "signatures", "main.cpp"]).is_err());
    }
}
