//! tbsync CLI library: shared by the `tbsync` and `tbsync-launch` binaries.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

/// Parse args and dispatch. Returns the process exit code.
pub fn run_cli() -> Result<i32> {
    let cli = Cli::parse();
    tbsync_core::observability::init_tracing();

    match cli.command {
        Commands::Organize {
            config_dir,
            data_dir,
            json,
        } => {
            commands::sync::cmd_organize(config_dir, data_dir, json)?;
        }
        Commands::Download {
            config_dir,
            data_dir,
            start_date,
            page_limit,
            json,
        } => {
            commands::sync::cmd_download(config_dir, data_dir, start_date, page_limit, json)?;
        }
        Commands::Launch => return Ok(commands::launch::cmd_launch()),
        Commands::Env { json } => {
            commands::env::cmd_env(json)?;
        }
    }
    Ok(0)
}

/// Entry point of `tbsync-launch`: no argument parsing at all.
pub fn run_launcher() -> i32 {
    tbsync_core::observability::init_tracing();
    commands::launch::cmd_launch()
}
