use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// tbsync - ThingsBoard telemetry mirror and download launcher
#[derive(Parser, Debug)]
#[command(name = "tbsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror customers, gateways and devices as directories of JSON descriptors
    Organize {
        /// Directory containing config.json (default: from env or /mnt/thingsboard_data/Descargas)
        #[arg(long, value_name = "DIR")]
        config_dir: Option<PathBuf>,

        /// Output root (default: from env or ./thingsboard_data)
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// Print the summary as JSON on stdout
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Append new device telemetry to per-device CSV files
    Download {
        /// Directory containing config.json (default: from env or /mnt/thingsboard_data/Descargas)
        #[arg(long, value_name = "DIR")]
        config_dir: Option<PathBuf>,

        /// Output root (default: from env or ./thingsboard_data)
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// First day to fetch when a device has no CSV yet, YYYY-MM-DD (default: 2024-09-01)
        #[arg(long, value_name = "DATE")]
        start_date: Option<NaiveDate>,

        /// Points per key per request (default: from env or 50000)
        #[arg(long)]
        page_limit: Option<u32>,

        /// Print the summary as JSON on stdout
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run the configured download command inside the venv (same as `tbsync-launch`)
    ///
    /// Venv, working directory and command come from TBSYNC_* variables or
    /// `.env`. The command's exit code is not propagated unless
    /// TBSYNC_PROPAGATE_EXIT=1.
    Launch,

    /// Show resolved launcher and downloader configuration
    Env {
        /// Output as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}
