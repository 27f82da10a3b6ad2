//! ThingsBoard mirror: REST client, directory tree of entity descriptors,
//! and incremental per-device telemetry CSVs.

pub mod client;
pub mod csv_store;
pub mod download;
pub mod error;
pub mod models;
pub mod organize;
pub mod settings;

pub use client::{ThingsBoardApi, ThingsBoardClient, TimeseriesQuery};
pub use download::{download, DownloadOptions, DownloadSummary};
pub use error::{Result, TbError};
pub use organize::{organize, OrganizeSummary};
pub use settings::ClientSettings;
