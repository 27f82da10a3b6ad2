//! `tbsync organize` / `tbsync download`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tbsync_core::config::DownloaderConfig;
use tbsync_thingsboard::{ClientSettings, DownloadOptions, ThingsBoardClient};

/// Load `config.json` and log in. Both failures are fatal.
fn connect(cfg: &DownloaderConfig) -> Result<ThingsBoardClient> {
    let settings = ClientSettings::load(&cfg.config_file())?;
    let client = ThingsBoardClient::connect(
        settings,
        &cfg.token_file,
        Duration::from_secs(cfg.http_timeout_secs),
    )?;
    Ok(client)
}

pub fn cmd_organize(
    config_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let cfg = DownloaderConfig::from_env().with_cli_overrides(config_dir, data_dir, None, None);
    let mut client = connect(&cfg)?;
    let summary = tbsync_thingsboard::organize(&mut client, &cfg.data_dir)
        .with_context(|| format!("Failed to organize {}", cfg.data_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        eprintln!(
            "✓ Organized {} customer(s), {} gateway(s), {} device(s) in {}",
            summary.customers,
            summary.gateways,
            summary.devices,
            cfg.data_dir.display()
        );
    }
    Ok(())
}

pub fn cmd_download(
    config_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    start_date: Option<NaiveDate>,
    page_limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let cfg = DownloaderConfig::from_env().with_cli_overrides(
        config_dir,
        data_dir,
        start_date,
        page_limit,
    );
    let mut client = connect(&cfg)?;
    let opts = DownloadOptions {
        data_dir: cfg.data_dir.clone(),
        start_date: cfg.start_date,
        page_limit: cfg.page_limit,
        end_ts: None,
    };
    let summary = tbsync_thingsboard::download(&mut client, &opts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if summary.devices_failed == 0 {
        eprintln!(
            "✓ {} row(s) appended for {}/{} device(s)",
            summary.rows_written, summary.devices_updated, summary.devices
        );
    } else {
        eprintln!(
            "⚠ {} row(s) appended for {}/{} device(s), {} failed",
            summary.rows_written,
            summary.devices_updated,
            summary.devices,
            summary.devices_failed
        );
    }
    Ok(())
}
