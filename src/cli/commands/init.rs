//! Init and Config commands.

use anyhow::{Context, Result, anyhow};
use console::style;

use crate::config::Settings;

/// Run init command - create configuration file in the current directory.
pub fn run_init(force: bool) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot read current directory")?;
    let path = Settings::init_config_file(&cwd, force).map_err(|e| anyhow!("{e}"))?;

    println!(
        "{} configuration file at: {}",
        style("Created").green().bold(),
        path.display()
    );
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> Result<()> {
    println!("{}", style("Current Configuration:").cyan().bold());
    println!("{}", "=".repeat(50));
    let toml_str = toml::to_string_pretty(config).context("cannot render settings as TOML")?;
    println!("{toml_str}");
    Ok(())
}
