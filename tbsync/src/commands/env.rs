//! `tbsync env`: show the configuration each command would run with.
//!
//! Values are resolved the same way the commands resolve them: process env,
//! then `.env` in the current directory, then built-in defaults.

use anyhow::Result;
use tbsync_core::config::{DownloaderConfig, LauncherConfig};
use tbsync_launcher::env::builder::is_venv;

pub fn cmd_env(json: bool) -> Result<()> {
    let launcher = LauncherConfig::from_env();
    let downloader = DownloaderConfig::from_env();

    if json {
        let out = serde_json::json!({
            "launcher": launcher,
            "downloader": downloader,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let venv_note = if is_venv(&launcher.venv_dir) {
        ""
    } else {
        "  (not a venv)"
    };
    let script = launcher
        .script
        .as_ref()
        .map(|s| s.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("Launcher:");
    println!("  venv_dir:       {}{}", launcher.venv_dir.display(), venv_note);
    println!("  work_dir:       {}", launcher.work_dir.display());
    println!("  program:        {}", launcher.program.display());
    println!("  script:         {}", script);
    println!("  args:           {}", launcher.args.join(" "));
    println!("  propagate_exit: {}", launcher.propagate_exit_code);
    println!();
    println!("Downloader:");
    println!("  config_file:    {}", downloader.config_file().display());
    println!("  data_dir:       {}", downloader.data_dir.display());
    println!("  token_file:     {}", downloader.token_file.display());
    println!("  start_date:     {}", downloader.start_date);
    println!("  page_limit:     {}", downloader.page_limit);
    println!("  http_timeout:   {}s", downloader.http_timeout_secs);
    Ok(())
}
