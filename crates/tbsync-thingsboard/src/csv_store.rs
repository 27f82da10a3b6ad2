//! Per-device telemetry CSV: resume point and append.
//!
//! Layout: `timestamp,<key1>,<key2>,...` with keys sorted and timestamps in
//! local time at second precision. Rows end in CRLF, like files written by
//! Python's `csv` module. Files are only ever appended to; the header is
//! written when the file is new or empty.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::error::{Result, TbError};
use crate::models::TelemetryTable;

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `<device_dir>/<device>_telemetry.csv`
pub fn csv_path(device_dir: &Path, device_name: &str) -> PathBuf {
    device_dir.join(format!("{}_telemetry.csv", device_name))
}

/// Render epoch milliseconds as a local `YYYY-mm-dd HH:MM:SS`.
pub fn format_ts(ts_ms: i64) -> String {
    match Local.timestamp_millis_opt(ts_ms).earliest() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => ts_ms.to_string(),
    }
}

/// Parse a local `YYYY-mm-dd HH:MM:SS` back to epoch milliseconds.
pub fn parse_ts(s: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Local midnight of `date`, in epoch milliseconds.
pub fn start_of_day_ms(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

/// The `timestamp` cell of the last data row, if any.
pub fn last_timestamp(path: &Path) -> Result<Option<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let Some(col) = reader
        .headers()?
        .iter()
        .position(|h| h == TIMESTAMP_COLUMN)
    else {
        return Ok(None);
    };

    let mut last = None;
    for record in reader.records() {
        let record = record?;
        last = record.get(col).map(str::to_string);
    }
    Ok(last)
}

/// Where the next download starts: one millisecond after the last stored
/// row, or `default_start` when there is no usable file.
pub fn resume_start_ts(path: &Path, default_start: i64) -> i64 {
    if !path.exists() {
        tracing::info!("No previous telemetry file, starting from the default date");
        return default_start;
    }
    tracing::info!(path = %path.display(), "Telemetry file found, reading last timestamp");
    match last_timestamp(path) {
        Ok(Some(ts)) => match parse_ts(&ts) {
            Some(ms) => ms + 1,
            None => {
                tracing::warn!(value = %ts, "Could not parse last timestamp, using default start date");
                default_start
            }
        },
        Ok(None) => default_start,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read telemetry file, using default start date");
            default_start
        }
    }
}

/// Append `table` to `path` with columns `timestamp` + `keys` (sorted here).
/// Missing values become empty cells. Returns the number of rows written.
pub fn append_rows(path: &Path, keys: &[String], table: &TelemetryTable) -> Result<usize> {
    let mut columns: Vec<String> = keys.to_vec();
    columns.sort();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(TbError::io(path))?;
    let is_empty = file.metadata().map_err(TbError::io(path))?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(file);

    if is_empty {
        let header = std::iter::once(TIMESTAMP_COLUMN).chain(columns.iter().map(String::as_str));
        writer.write_record(header)?;
    }

    let mut written = 0;
    for (ts, values) in table.rows() {
        let mut record = Vec::with_capacity(columns.len() + 1);
        record.push(format_ts(*ts));
        for key in &columns {
            record.push(values.get(key).cloned().unwrap_or_default());
        }
        writer.write_record(&record)?;
        written += 1;
    }
    writer.flush().map_err(TbError::io(path))?;
    Ok(written)
}
