//! tbsync configuration layer
//!
//! Every environment variable read goes through this module; callers use the
//! structured configs instead of calling `std::env::var` directly.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool` and `.env` loading
//! - `schema`: `LauncherConfig`, `DownloaderConfig`, `ObservabilityConfig`
//! - `env_keys`: key constants (with legacy aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir};
pub use schema::{DownloaderConfig, LauncherConfig, ObservabilityConfig};
