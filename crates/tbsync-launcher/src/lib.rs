//! Launcher: activate a venv for one child process, run it from a fixed
//! directory, release the venv.
//!
//! The launcher never mutates its own environment or working directory. The
//! venv "activation" is an overlay applied to the child `Command` only, and
//! the child's exit code is not propagated unless explicitly requested.

pub mod context;
pub mod env;
pub mod runner;

pub use context::{Activation, ActivationError, RuntimeContext, TeardownStatus};
pub use runner::{run, ChildStatus, LaunchConfig, LaunchOutcome};
