//! `config.json`: server URL and credentials.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TbError};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub thingsboard_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ClientSettings {
    /// Read and validate `path`. A missing file, bad JSON, or a missing URL
    /// are all fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TbError::ConfigMissing(path.to_path_buf()));
        }
        tracing::info!(path = %path.display(), "Reading configuration");
        let content = std::fs::read_to_string(path).map_err(TbError::io(path))?;
        let settings: ClientSettings =
            serde_json::from_str(&content).map_err(|source| TbError::ConfigInvalid {
                path: path.to_path_buf(),
                source,
            })?;
        settings.base_url()?;
        Ok(settings)
    }

    /// Server URL without a trailing slash.
    pub fn base_url(&self) -> Result<String> {
        self.thingsboard_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or(TbError::MissingUrl)
    }
}
