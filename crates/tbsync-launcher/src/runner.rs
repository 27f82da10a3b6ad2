use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Instant;

use serde::Serialize;
use tbsync_core::config::LauncherConfig;
use tbsync_core::observability;

use crate::context::{RuntimeContext, TeardownStatus};

/// Everything one launch needs, passed explicitly instead of read from the
/// shell's ambient state.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchConfig {
    /// Venv to activate for the child
    pub venv_dir: PathBuf,
    /// Child working directory
    pub work_dir: PathBuf,
    /// Executable; bare names resolve venv-first
    pub program: PathBuf,
    /// Optional script passed before `args`
    pub script: Option<PathBuf>,
    pub args: Vec<String>,
    /// Return the child's exit code instead of the teardown status.
    pub propagate_exit_code: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        LauncherConfig::default().into()
    }
}

impl From<LauncherConfig> for LaunchConfig {
    fn from(cfg: LauncherConfig) -> Self {
        Self {
            venv_dir: cfg.venv_dir,
            work_dir: cfg.work_dir,
            program: cfg.program,
            script: cfg.script,
            args: cfg.args,
            propagate_exit_code: cfg.propagate_exit_code,
        }
    }
}

impl LaunchConfig {
    /// Full child argv after the program: `[script] args...`
    pub fn child_args(&self) -> Vec<String> {
        self.script
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// How the child ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    /// Terminated by a signal (Unix); carries the signal number.
    Signaled(i32),
    /// The program could not be started at all.
    SpawnFailed(String),
}

impl ChildStatus {
    fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return Self::Signaled(sig);
            }
        }
        Self::Exited(1)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(c) => Some(*c),
            _ => None,
        }
    }

    /// Shell-style status: signal kills map to 128+N, spawn failures to 127.
    pub fn shell_code(&self) -> i32 {
        match self {
            Self::Exited(c) => *c,
            Self::Signaled(sig) => 128 + sig,
            Self::SpawnFailed(_) => 127,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub child: ChildStatus,
    pub teardown: TeardownStatus,
    /// Whether the child ran in the configured work dir (false when the
    /// directory change was skipped).
    pub entered_work_dir: bool,
    pub propagate_exit_code: bool,
    pub duration_ms: u64,
}

impl LaunchOutcome {
    /// Exit code for the launcher process: the teardown step's status, or
    /// the child's when propagation is enabled.
    pub fn exit_code(&self) -> i32 {
        if self.propagate_exit_code {
            self.child.shell_code()
        } else {
            self.teardown.exit_code()
        }
    }
}

/// Activate, change directory, run, deactivate. Each step is best-effort and
/// the sequence always reaches the teardown step.
pub fn run(config: &LaunchConfig) -> LaunchOutcome {
    let start = Instant::now();

    let ctx = RuntimeContext::activate(&config.venv_dir);

    let entered_work_dir = config.work_dir.is_dir();
    if !entered_work_dir {
        tracing::error!(
            "cd: {}: No such file or directory",
            config.work_dir.display()
        );
    }
    let child_cwd = if entered_work_dir {
        config.work_dir.clone()
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    };

    let child = spawn_and_wait(&ctx, config, &child_cwd, entered_work_dir);

    let teardown = ctx.deactivate();

    let outcome = LaunchOutcome {
        child,
        teardown,
        entered_work_dir,
        propagate_exit_code: config.propagate_exit_code,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    if let ChildStatus::Exited(code) = outcome.child {
        if code != 0 {
            tracing::debug!(code, "Child exited non-zero (not propagated)");
        }
    }
    observability::audit_launch_completed(
        outcome.child.code(),
        outcome.exit_code(),
        outcome.duration_ms,
    );
    outcome
}

fn spawn_and_wait(
    ctx: &RuntimeContext,
    config: &LaunchConfig,
    child_cwd: &Path,
    set_cwd: bool,
) -> ChildStatus {
    let program = ctx.resolve_program(&config.program, child_cwd);
    let args = config.child_args();

    let mut cmd = Command::new(&program);
    cmd.args(&args);
    ctx.apply(&mut cmd);
    if set_cwd {
        cmd.current_dir(child_cwd);
    }

    tracing::debug!(
        program = %program.display(),
        args = ?args,
        cwd = %child_cwd.display(),
        venv_active = ctx.is_active(),
        "Launching"
    );
    observability::audit_launch_started(
        &program.to_string_lossy(),
        &args,
        &child_cwd.to_string_lossy(),
        ctx.is_active(),
    );

    match cmd.status() {
        Ok(status) => ChildStatus::from_exit_status(status),
        Err(e) => {
            tracing::error!("{}: {}", program.display(), e);
            ChildStatus::SpawnFailed(e.to_string())
        }
    }
}
