//! CLI command handlers.
//!
//!   launch: venv launcher (depends on tbsync-launcher only)
//!   sync:   organize / download against ThingsBoard
//!   env:    print resolved configuration

pub mod env;
pub mod launch;
pub mod sync;
