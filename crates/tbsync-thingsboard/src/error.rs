use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TbError>;

/// Errors from the ThingsBoard client and the on-disk mirror.
#[derive(Debug, Error)]
pub enum TbError {
    #[error("Config file not found: {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("Failed to decode config file {}: {source}", .path.display())]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("ThingsBoard URL is not set in the config file (thingsboard_url)")]
    MissingUrl,

    #[error("Authentication failed: {status} - {body}")]
    AuthFailed { status: u16, body: String },

    #[error("{context}: {source}")]
    Request {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: {status} - {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TbError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> TbError {
        let path = path.into();
        move |source| TbError::Io { path, source }
    }

    pub(crate) fn request(context: impl Into<String>) -> impl FnOnce(reqwest::Error) -> TbError {
        let context = context.into();
        move |source| TbError::Request { context, source }
    }

    /// True for 401 responses, which trigger a single re-login.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TbError::Status { status: 401, .. })
    }
}
