// src/cli.rs

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_PATH;

/// Exports every completed scan from one or more Nessus servers as .nessus,
/// .csv and .pdf reports and downloads them to a local folder.
#[derive(Parser, Debug)]
#[command(name = "nessus-harvester", version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print progress narration to the terminal.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print timing and response diagnostics too, and log at debug level.
    #[arg(short, long)]
    pub debug: bool,

    /// Nessus username; prompted for when absent.
    #[arg(short, long, env = "NESSUS_USERNAME")]
    pub username: Option<String>,

    /// Do not clear the screen and print the banner.
    #[arg(long)]
    pub no_banner: bool,
}
