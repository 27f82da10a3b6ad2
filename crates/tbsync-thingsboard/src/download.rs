//! Incremental telemetry download into per-device CSV files.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tbsync_core::observability;
use tbsync_core::path_validation::SiblingNames;

use crate::client::{ThingsBoardApi, TimeseriesQuery};
use crate::csv_store;
use crate::error::{Result, TbError};
use crate::models::{Device, TelemetryTable};

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub data_dir: PathBuf,
    /// Start of the window when a device has no CSV yet (local midnight).
    pub start_date: NaiveDate,
    /// Points per key per request.
    pub page_limit: u32,
    /// Fixed end of the window; `None` means "now", taken per device.
    pub end_ts: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    pub devices: usize,
    pub devices_updated: usize,
    pub devices_failed: usize,
    pub rows_written: usize,
    /// Entities whose sanitized name was already taken by a sibling.
    pub name_collisions: usize,
}

/// Page through `[start_ts, end_ts]` until no key fills the page limit.
///
/// A failed request stops paging; rows fetched before it are kept.
pub fn fetch_telemetry(
    api: &mut dyn ThingsBoardApi,
    device: &Device,
    keys: &[String],
    start_ts: i64,
    end_ts: i64,
    limit: u32,
) -> TelemetryTable {
    let mut table = TelemetryTable::new();
    let mut start = start_ts;
    while start <= end_ts {
        let query = TimeseriesQuery {
            device_id: &device.id.id,
            keys,
            start_ts: start,
            end_ts,
            limit,
        };
        match api.timeseries(&query) {
            Ok(page) => {
                let windows = table.merge(&page);
                if windows.is_empty() {
                    tracing::debug!("No more data for {}", device.name);
                    break;
                }
                // Keys under the limit are complete for this window; the rest
                // resume after the earliest point any of them stopped at.
                let resume_after = windows
                    .values()
                    .filter(|w| w.points >= limit as usize)
                    .map(|w| w.newest)
                    .min();
                match resume_after {
                    Some(newest) if newest >= start => start = newest + 1,
                    _ => break,
                }
            }
            Err(e) => {
                tracing::error!("Telemetry download failed for device '{}': {}", device.name, e);
                break;
            }
        }
    }
    table
}

/// Download one device. Returns rows appended.
fn download_device(
    api: &mut dyn ThingsBoardApi,
    device: &Device,
    device_name: &str,
    gateway_dir: &Path,
    opts: &DownloadOptions,
) -> Result<usize> {
    let keys = api.telemetry_keys(&device.id.id);
    if keys.is_empty() {
        tracing::info!("Device '{}' has no telemetry keys, skipping", device.name);
        return Ok(0);
    }
    tracing::info!("Downloading telemetry for device {}", device.name);

    let device_dir = gateway_dir.join(device_name);
    let csv_path = csv_store::csv_path(&device_dir, device_name);

    let default_start = csv_store::start_of_day_ms(opts.start_date);
    let start_ts = csv_store::resume_start_ts(&csv_path, default_start);
    let end_ts = opts.end_ts.unwrap_or_else(|| Local::now().timestamp_millis());

    let table = fetch_telemetry(api, device, &keys, start_ts, end_ts, opts.page_limit);
    if table.is_empty() {
        tracing::info!("No telemetry for device '{}' in the requested range", device.name);
        return Ok(0);
    }

    std::fs::create_dir_all(&device_dir).map_err(TbError::io(&device_dir))?;
    let written = csv_store::append_rows(&csv_path, &keys, &table)?;
    tracing::info!(
        "Telemetry saved to '{}' ({} rows)",
        csv_path.display(),
        written
    );
    observability::audit_telemetry_saved(&device.name, &csv_path.to_string_lossy(), written);
    Ok(written)
}

/// Walk every customer → gateway → device and append new telemetry.
///
/// Per-device write failures are logged and counted; the walk continues.
pub fn download(api: &mut dyn ThingsBoardApi, opts: &DownloadOptions) -> Result<DownloadSummary> {
    tracing::info!(data_dir = %opts.data_dir.display(), "Downloading device telemetry");
    let customers = api.customers();
    let mut summary = DownloadSummary::default();

    let total = customers.len();
    let mut customer_names = SiblingNames::new();
    for (idx, customer) in customers.iter().enumerate() {
        tracing::info!("[{}/{}] Processing customer {}", idx + 1, total, customer.title);
        let customer_dir = opts.data_dir.join(customer_names.component(&customer.title));

        let gateways = api.customer_gateways(&customer.id.id);
        if gateways.is_empty() {
            tracing::info!("No gateways found for customer {}", customer.title);
            continue;
        }

        let mut gateway_names = SiblingNames::new();
        for gateway in &gateways {
            tracing::info!("Processing gateway {}", gateway.name);
            let gateway_dir = customer_dir.join(gateway_names.component(&gateway.name));

            let devices = api.gateway_devices(&gateway.id.id);
            if devices.is_empty() {
                tracing::info!("No devices found for gateway {}", gateway.name);
                continue;
            }

            let mut device_names = SiblingNames::new();
            for device in &devices {
                summary.devices += 1;
                let device_name = device_names.component(&device.name);
                match download_device(api, device, &device_name, &gateway_dir, opts) {
                    Ok(0) => {}
                    Ok(rows) => {
                        summary.devices_updated += 1;
                        summary.rows_written += rows;
                    }
                    Err(e) => {
                        tracing::error!("Failed to save telemetry for '{}': {}", device.name, e);
                        summary.devices_failed += 1;
                    }
                }
            }
            summary.name_collisions += device_names.collisions();
        }
        summary.name_collisions += gateway_names.collisions();
    }
    summary.name_collisions += customer_names.collisions();

    tracing::info!(
        devices = summary.devices,
        updated = summary.devices_updated,
        failed = summary.devices_failed,
        rows = summary.rows_written,
        name_collisions = summary.name_collisions,
        "Download finished"
    );
    Ok(summary)
}
