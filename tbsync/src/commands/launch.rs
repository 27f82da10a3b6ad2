use tbsync_core::config::LauncherConfig;
use tbsync_launcher::LaunchConfig;

/// `tbsync launch` / `tbsync-launch`. Never fails; returns the exit code.
pub fn cmd_launch() -> i32 {
    let config = LaunchConfig::from(LauncherConfig::from_env());
    let outcome = tbsync_launcher::run(&config);
    tracing::debug!(
        child = ?outcome.child,
        teardown = ?outcome.teardown,
        duration_ms = outcome.duration_ms,
        "Launch finished"
    );
    outcome.exit_code()
}
