//! `pulse config` command - print the effective configuration

use anyhow::Result;
use colored::Colorize;
use pulse_core::PulseConfig;
use std::path::Path;

pub fn config(config: &PulseConfig, path: Option<&Path>) -> Result<()> {
    let source = path.map(Path::to_path_buf).unwrap_or_else(PulseConfig::config_path);
    let origin = if source.exists() { "loaded from" } else { "defaults, no file at" };
    eprintln!("{}", format!("# {} {}", origin, source.display()).dimmed());

    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
