//! ThingsBoard entities as returned by the REST API.
//!
//! Each entity keeps its full JSON (`raw`) so the on-disk descriptors are a
//! verbatim copy of what the server sent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntityId {
    pub id: String,
    #[serde(rename = "entityType", default)]
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: EntityId,
    pub title: String,
    pub raw: Value,
}

impl Customer {
    /// `None` when the entity lacks an id or a title.
    pub fn from_value(raw: Value) -> Option<Self> {
        let id: EntityId = serde_json::from_value(raw.get("id")?.clone()).ok()?;
        let title = raw.get("title")?.as_str()?.to_string();
        Some(Self { id, title, raw })
    }
}

#[derive(Debug, Clone)]
pub struct Device {
    pub id: EntityId,
    pub name: String,
    pub raw: Value,
}

impl Device {
    pub fn from_value(raw: Value) -> Option<Self> {
        let id: EntityId = serde_json::from_value(raw.get("id")?.clone()).ok()?;
        let name = raw.get("name")?.as_str()?.to_string();
        Some(Self { id, name, raw })
    }

    /// A gateway is a device flagged with `additionalInfo.gateway == true`.
    pub fn is_gateway(&self) -> bool {
        self.raw
            .get("additionalInfo")
            .and_then(|info| info.get("gateway"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// One page of a paginated listing (`/api/customers`, `/api/.../devices`).
#[derive(Debug, Clone, Deserialize)]
pub struct PageData {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(rename = "hasNext", default)]
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TsValue {
    pub ts: i64,
    pub value: Value,
}

/// Timeseries response: telemetry key → points.
pub type TimeseriesPage = BTreeMap<String, Vec<TsValue>>;

/// What one key contributed to a timeseries page. The server applies
/// `limit` per key, so each key's window ends at a different point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyWindow {
    pub points: usize,
    pub newest: i64,
}

/// Telemetry merged across pages: timestamp (ms) → key → rendered value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryTable {
    rows: BTreeMap<i64, BTreeMap<String, String>>,
}

impl TelemetryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a page. Returns, per key that carried points, how many points it
    /// had and the newest timestamp among them.
    pub fn merge(&mut self, page: &TimeseriesPage) -> BTreeMap<String, KeyWindow> {
        let mut windows = BTreeMap::new();
        for (key, points) in page {
            for point in points {
                self.rows
                    .entry(point.ts)
                    .or_default()
                    .insert(key.clone(), render_value(&point.value));
                let window = windows.entry(key.clone()).or_insert(KeyWindow {
                    points: 0,
                    newest: point.ts,
                });
                window.points += 1;
                window.newest = window.newest.max(point.ts);
            }
        }
        windows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in ascending timestamp order.
    pub fn rows(&self) -> impl Iterator<Item = (&i64, &BTreeMap<String, String>)> {
        self.rows.iter()
    }
}

/// String values are written as-is; other JSON scalars use their JSON text.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
