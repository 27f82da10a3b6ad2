//! Recognize a Python venv on disk and find its executable directory.

use std::path::{Path, PathBuf};

/// True when `env_dir` looks like a venv: `pyvenv.cfg` or an activation script.
pub fn is_venv(env_dir: &Path) -> bool {
    env_dir.join("pyvenv.cfg").is_file()
        || env_dir.join("bin").join("activate").is_file()
        || env_dir.join("Scripts").join("activate.bat").is_file()
}

/// The venv's executable directory: `bin/` on Unix layouts, `Scripts/` on Windows.
pub fn venv_bin_dir(env_dir: &Path) -> Option<PathBuf> {
    let bin = env_dir.join("bin");
    if bin.is_dir() {
        return Some(bin);
    }
    let scripts = env_dir.join("Scripts");
    if scripts.is_dir() {
        return Some(scripts);
    }
    None
}
