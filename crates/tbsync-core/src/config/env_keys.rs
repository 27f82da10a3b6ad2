//! Environment variable keys and aliases.
//!
//! Primary names use the `TBSYNC_*` prefix; the `THINGSBOARD_*` aliases are
//! still honored for older deployments.

/// Launcher: venv, working directory and the command to run
pub mod launcher {
    pub const TBSYNC_VENV_DIR: &str = "TBSYNC_VENV_DIR";
    pub const TBSYNC_WORK_DIR: &str = "TBSYNC_WORK_DIR";
    pub const TBSYNC_PROGRAM: &str = "TBSYNC_PROGRAM";
    /// Empty value disables the script argument.
    pub const TBSYNC_SCRIPT: &str = "TBSYNC_SCRIPT";
    /// Whitespace separated argument list.
    pub const TBSYNC_ARGS: &str = "TBSYNC_ARGS";
    pub const TBSYNC_PROPAGATE_EXIT: &str = "TBSYNC_PROPAGATE_EXIT";
}

/// Downloader: ThingsBoard config location, output tree, paging
pub mod downloader {
    pub const TBSYNC_CONFIG_DIR: &str = "TBSYNC_CONFIG_DIR";
    pub const CONFIG_DIR_ALIASES: &[&str] = &["THINGSBOARD_CONFIG_DIR"];

    pub const TBSYNC_DATA_DIR: &str = "TBSYNC_DATA_DIR";
    pub const DATA_DIR_ALIASES: &[&str] = &["THINGSBOARD_DATA_DIR"];

    pub const TBSYNC_TOKEN_FILE: &str = "TBSYNC_TOKEN_FILE";
    pub const TBSYNC_START_DATE: &str = "TBSYNC_START_DATE";
    pub const TBSYNC_PAGE_LIMIT: &str = "TBSYNC_PAGE_LIMIT";
    pub const TBSYNC_HTTP_TIMEOUT_SECS: &str = "TBSYNC_HTTP_TIMEOUT_SECS";
}

/// Logging and audit
pub mod observability {
    pub const TBSYNC_QUIET: &str = "TBSYNC_QUIET";
    pub const TBSYNC_LOG_LEVEL: &str = "TBSYNC_LOG_LEVEL";
    pub const TBSYNC_LOG_JSON: &str = "TBSYNC_LOG_JSON";
    pub const TBSYNC_AUDIT_LOG: &str = "TBSYNC_AUDIT_LOG";
}
