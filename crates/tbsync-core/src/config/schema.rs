//! Config structs grouped by concern, loaded from the environment.

use super::env_keys::{downloader as dl_keys, launcher as launch_keys, observability as obv_keys};
use super::loader::{env_bool, env_optional, env_or};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

/// Default isolated runtime (Python venv) the launcher activates.
pub const DEFAULT_VENV_DIR: &str = "/mnt/thingsboard_data/venv";
/// Fixed working directory for the download run; also holds `config.json`.
pub const DEFAULT_WORK_DIR: &str = "/mnt/thingsboard_data/Descargas";
pub const DEFAULT_PROGRAM: &str = "python";
pub const DEFAULT_SCRIPT: &str = "descargar_v0.py";
pub const DEFAULT_ARGS: &[&str] = &["download"];

pub const DEFAULT_DATA_DIR: &str = "thingsboard_data";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_PAGE_LIMIT: u32 = 50_000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// First day telemetry is fetched from when no CSV exists yet.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 1).unwrap_or_default()
}

/// Launcher settings: which venv, which directory, which command.
#[derive(Debug, Clone, Serialize)]
pub struct LauncherConfig {
    pub venv_dir: PathBuf,
    pub work_dir: PathBuf,
    pub program: PathBuf,
    /// `None` when `TBSYNC_SCRIPT` is set to an empty string.
    pub script: Option<PathBuf>,
    pub args: Vec<String>,
    pub propagate_exit_code: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            venv_dir: PathBuf::from(DEFAULT_VENV_DIR),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            program: PathBuf::from(DEFAULT_PROGRAM),
            script: Some(PathBuf::from(DEFAULT_SCRIPT)),
            args: DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
            propagate_exit_code: false,
        }
    }
}

impl LauncherConfig {
    /// Load from env (including `.env`); unset keys keep the built-in defaults.
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let defaults = Self::default();
        let script = match std::env::var(launch_keys::TBSYNC_SCRIPT) {
            Ok(s) if s.trim().is_empty() => None,
            Ok(s) => Some(PathBuf::from(s.trim())),
            Err(_) => defaults.script,
        };
        let args = env_optional(launch_keys::TBSYNC_ARGS, &[])
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or(defaults.args);
        Self {
            venv_dir: env_optional(launch_keys::TBSYNC_VENV_DIR, &[])
                .map(PathBuf::from)
                .unwrap_or(defaults.venv_dir),
            work_dir: env_optional(launch_keys::TBSYNC_WORK_DIR, &[])
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            program: env_optional(launch_keys::TBSYNC_PROGRAM, &[])
                .map(PathBuf::from)
                .unwrap_or(defaults.program),
            script,
            args,
            propagate_exit_code: env_bool(launch_keys::TBSYNC_PROPAGATE_EXIT, &[], false),
        }
    }
}

/// Downloader settings: where `config.json` lives and where output goes.
#[derive(Debug, Clone, Serialize)]
pub struct DownloaderConfig {
    /// Directory holding `config.json` (server URL and credentials).
    pub config_dir: PathBuf,
    /// Root of the customer/gateway/device tree.
    pub data_dir: PathBuf,
    pub token_file: PathBuf,
    pub start_date: NaiveDate,
    pub page_limit: u32,
    pub http_timeout_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_WORK_DIR),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            start_date: default_start_date(),
            page_limit: DEFAULT_PAGE_LIMIT,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl DownloaderConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let defaults = Self::default();
        let start_date = match env_optional(dl_keys::TBSYNC_START_DATE, &[]) {
            Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").unwrap_or_else(|e| {
                tracing::warn!(value = %s, error = %e, "Invalid TBSYNC_START_DATE, using default");
                defaults.start_date
            }),
            None => defaults.start_date,
        };
        Self {
            config_dir: PathBuf::from(env_or(
                dl_keys::TBSYNC_CONFIG_DIR,
                dl_keys::CONFIG_DIR_ALIASES,
                || DEFAULT_WORK_DIR.to_string(),
            )),
            data_dir: PathBuf::from(env_or(
                dl_keys::TBSYNC_DATA_DIR,
                dl_keys::DATA_DIR_ALIASES,
                || DEFAULT_DATA_DIR.to_string(),
            )),
            token_file: PathBuf::from(env_or(dl_keys::TBSYNC_TOKEN_FILE, &[], || {
                DEFAULT_TOKEN_FILE.to_string()
            })),
            start_date,
            page_limit: env_optional(dl_keys::TBSYNC_PAGE_LIMIT, &[])
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.page_limit),
            http_timeout_secs: env_optional(dl_keys::TBSYNC_HTTP_TIMEOUT_SECS, &[])
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(defaults.http_timeout_secs),
        }
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(
        mut self,
        config_dir: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        start_date: Option<NaiveDate>,
        page_limit: Option<u32>,
    ) -> Self {
        if let Some(dir) = config_dir {
            self.config_dir = dir;
        }
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if let Some(date) = start_date {
            self.start_date = date;
        }
        if let Some(limit) = page_limit.filter(|n| *n > 0) {
            self.page_limit = limit;
        }
        self
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

/// Observability: quiet, log level, JSON logs, audit log path
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::TBSYNC_QUIET, &[], false),
                log_level: env_or(obv_keys::TBSYNC_LOG_LEVEL, &[], || "tbsync=info".to_string()),
                log_json: env_bool(obv_keys::TBSYNC_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::TBSYNC_AUDIT_LOG, &[]),
            }
        })
    }
}
