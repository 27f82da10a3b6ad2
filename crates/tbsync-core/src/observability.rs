//! Observability: tracing init and the optional JSONL audit log.
//!
//! Uses `config::ObservabilityConfig` for TBSYNC_QUIET, TBSYNC_LOG_LEVEL,
//! TBSYNC_LOG_JSON and TBSYNC_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
///
/// Logs go to stderr so that stdout stays owned by the launched program.
/// `RUST_LOG` takes precedence over TBSYNC_LOG_LEVEL; TBSYNC_QUIET keeps
/// only warnings and errors.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "tbsync=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: launch_started (right before spawn)
pub fn audit_launch_started(program: &str, args: &[String], cwd: &str, venv_active: bool) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "launch_started",
            "program": program,
            "args": args,
            "cwd": cwd,
            "venv_active": venv_active,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: launch_completed. `child_exit_code` is `None` when the child never
/// ran or was killed by a signal.
pub fn audit_launch_completed(child_exit_code: Option<i32>, exit_code: i32, duration_ms: u64) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "launch_completed",
            "child_exit_code": child_exit_code,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: context_released (venv teardown)
pub fn audit_context_released(venv: &str, status: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "context_released",
            "venv": venv,
            "status": status,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: telemetry_saved (one device CSV appended)
pub fn audit_telemetry_saved(device: &str, csv_path: &str, rows: usize) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "telemetry_saved",
            "device": device,
            "csv": csv_path,
            "rows": rows,
        });
        append_jsonl(&path, &record);
    }
}
