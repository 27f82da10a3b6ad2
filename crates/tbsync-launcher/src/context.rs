//! Scoped runtime context: venv activation as a value instead of shell state.
//!
//! `RuntimeContext::activate` computes the environment a sourced
//! `bin/activate` would produce (VIRTUAL_ENV, PATH with the venv bin dir
//! first, PYTHONHOME unset) and keeps it as an overlay. The overlay is applied
//! to a child `Command`; the launcher's own environment is never touched.
//! Releasing the context is the `deactivate` step and always happens, either
//! explicitly or on drop.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tbsync_core::observability;
use thiserror::Error;

use crate::env::builder;

/// Why a venv could not be activated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    #[error("{}: no such venv directory", .0.display())]
    NotFound(PathBuf),

    #[error("{}: not a Python venv (no pyvenv.cfg or activate script)", .0.display())]
    NotAVenv(PathBuf),

    #[error("{}: venv has no bin/ or Scripts/ directory", .0.display())]
    NoBinDir(PathBuf),
}

#[derive(Debug, Clone)]
pub enum Activation {
    Active {
        venv: PathBuf,
        bin_dir: PathBuf,
        /// PATH for the child; `None` when the venv bin dir cannot be joined
        /// into a PATH value (e.g. it contains the separator).
        path_var: Option<OsString>,
    },
    Missing(ActivationError),
}

/// Result of the teardown step. Its exit code is the launcher's exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStatus {
    /// The venv was active and has been released.
    Released,
    /// Nothing to release: activation had failed. Reported like a shell whose
    /// `deactivate` function was never defined.
    NotActive,
}

impl TeardownStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Released => 0,
            Self::NotActive => 127,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Released => "released",
            Self::NotActive => "not_active",
        }
    }
}

#[derive(Debug)]
pub struct RuntimeContext {
    activation: Activation,
    released: bool,
}

impl RuntimeContext {
    /// Activate `venv_dir`. Never fails: a missing or invalid venv is logged
    /// and yields an inactive context so the run can continue.
    pub fn activate(venv_dir: &Path) -> Self {
        let activation = match check_venv(venv_dir) {
            Ok(bin_dir) => {
                let path_var = prepend_path(&bin_dir);
                if path_var.is_none() {
                    tracing::warn!(
                        bin_dir = %bin_dir.display(),
                        "Venv bin dir cannot be added to PATH; child keeps inherited PATH"
                    );
                }
                tracing::debug!(venv = %venv_dir.display(), "Venv activated");
                Activation::Active {
                    venv: venv_dir.to_path_buf(),
                    bin_dir,
                    path_var,
                }
            }
            Err(e) => {
                tracing::error!("activate: {}", e);
                Activation::Missing(e)
            }
        };
        Self {
            activation,
            released: false,
        }
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    pub fn is_active(&self) -> bool {
        matches!(self.activation, Activation::Active { .. })
    }

    /// Variables to set (`Some`) or remove (`None`) in the child environment.
    pub fn overlay(&self) -> Vec<(OsString, Option<OsString>)> {
        match &self.activation {
            Activation::Active { venv, path_var, .. } => {
                let mut vars = vec![
                    (OsString::from("VIRTUAL_ENV"), Some(venv.clone().into_os_string())),
                    (OsString::from("PYTHONHOME"), None),
                ];
                if let Some(p) = path_var {
                    vars.push((OsString::from("PATH"), Some(p.clone())));
                }
                vars
            }
            Activation::Missing(_) => Vec::new(),
        }
    }

    /// Apply the overlay to a child command.
    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in self.overlay() {
            match value {
                Some(v) => {
                    cmd.env(key, v);
                }
                None => {
                    cmd.env_remove(key);
                }
            }
        }
    }

    /// Resolve a bare program name against the venv-first PATH. Anything with
    /// a directory part, or any name when inactive, is returned unchanged.
    pub fn resolve_program(&self, program: &Path, cwd: &Path) -> PathBuf {
        let bare = program
            .parent()
            .map_or(true, |p| p.as_os_str().is_empty());
        if !bare {
            return program.to_path_buf();
        }
        match &self.activation {
            Activation::Active {
                bin_dir, path_var, ..
            } => {
                let search = path_var.clone().unwrap_or_else(|| bin_dir.clone().into_os_string());
                which::which_in(program, Some(search), cwd).unwrap_or_else(|_| program.to_path_buf())
            }
            Activation::Missing(_) => program.to_path_buf(),
        }
    }

    /// The teardown step. Consumes the context.
    pub fn deactivate(mut self) -> TeardownStatus {
        self.release()
    }

    fn release(&mut self) -> TeardownStatus {
        self.released = true;
        let (venv, status) = match &self.activation {
            Activation::Active { venv, .. } => (venv.display().to_string(), TeardownStatus::Released),
            Activation::Missing(e) => {
                tracing::error!("deactivate: no active venv ({})", e);
                (String::new(), TeardownStatus::NotActive)
            }
        };
        observability::audit_context_released(&venv, status.as_str());
        status
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

fn check_venv(venv_dir: &Path) -> Result<PathBuf, ActivationError> {
    if !venv_dir.is_dir() {
        return Err(ActivationError::NotFound(venv_dir.to_path_buf()));
    }
    if !builder::is_venv(venv_dir) {
        return Err(ActivationError::NotAVenv(venv_dir.to_path_buf()));
    }
    builder::venv_bin_dir(venv_dir).ok_or_else(|| ActivationError::NoBinDir(venv_dir.to_path_buf()))
}

fn prepend_path(bin_dir: &Path) -> Option<OsString> {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let entries = std::iter::once(bin_dir.to_path_buf()).chain(std::env::split_paths(&current));
    std::env::join_paths(entries).ok()
}
