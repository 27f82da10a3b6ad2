use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tbsync_thingsboard::csv_store::parse_ts;
use tbsync_thingsboard::models::{Customer, Device, TimeseriesPage, TsValue};
use tbsync_thingsboard::download::fetch_telemetry;
use tbsync_thingsboard::{
    download, organize, DownloadOptions, TbError, ThingsBoardApi, TimeseriesQuery,
};
use tempfile::TempDir;

/// In-memory server: one customer, one gateway, configurable devices.
#[derive(Default)]
struct FakeTb {
    customers: Vec<Value>,
    gateways: HashMap<String, Vec<Value>>,
    devices: HashMap<String, Vec<Value>>,
    keys: HashMap<String, Vec<String>>,
    /// device id → key → (ts, value)
    series: HashMap<String, BTreeMap<String, Vec<(i64, String)>>>,
    /// Fail every timeseries call after this many successful ones.
    fail_after: Option<usize>,
    timeseries_calls: usize,
}

impl FakeTb {
    fn with_tree(device_ids: &[&str]) -> Self {
        let mut tb = FakeTb {
            customers: vec![json!({"id": {"entityType": "CUSTOMER", "id": "c1"}, "title": "Norte"})],
            ..Default::default()
        };
        tb.gateways.insert(
            "c1".into(),
            vec![json!({"id": {"id": "g1"}, "name": "gw-1", "additionalInfo": {"gateway": true}})],
        );
        tb.devices.insert(
            "g1".into(),
            device_ids
                .iter()
                .map(|id| json!({"id": {"id": id}, "name": format!("dev-{id}")}))
                .collect(),
        );
        tb
    }

    fn push(&mut self, device: &str, key: &str, ts: i64, value: &str) {
        self.keys
            .entry(device.into())
            .or_default()
            .retain(|k| k != key);
        self.keys.get_mut(device).unwrap().push(key.into());
        self.series
            .entry(device.into())
            .or_default()
            .entry(key.into())
            .or_default()
            .push((ts, value.into()));
    }
}

impl ThingsBoardApi for FakeTb {
    fn customers(&mut self) -> Vec<Customer> {
        self.customers.iter().cloned().filter_map(Customer::from_value).collect()
    }

    fn customer_gateways(&mut self, customer_id: &str) -> Vec<Device> {
        self.gateways
            .get(customer_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(Device::from_value)
            .filter(Device::is_gateway)
            .collect()
    }

    fn gateway_devices(&mut self, gateway_id: &str) -> Vec<Device> {
        self.devices
            .get(gateway_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(Device::from_value)
            .collect()
    }

    fn telemetry_keys(&mut self, device_id: &str) -> Vec<String> {
        self.keys.get(device_id).cloned().unwrap_or_default()
    }

    fn timeseries(&mut self, query: &TimeseriesQuery<'_>) -> tbsync_thingsboard::Result<TimeseriesPage> {
        if let Some(limit) = self.fail_after {
            if self.timeseries_calls >= limit {
                return Err(TbError::Status {
                    context: "Fetch telemetry".into(),
                    status: 503,
                    body: "unavailable".into(),
                });
            }
        }
        self.timeseries_calls += 1;

        let mut page = TimeseriesPage::new();
        let Some(series) = self.series.get(query.device_id) else {
            return Ok(page);
        };
        for key in query.keys {
            let mut points: Vec<_> = series
                .get(key)
                .into_iter()
                .flatten()
                .filter(|(ts, _)| *ts >= query.start_ts && *ts <= query.end_ts)
                .cloned()
                .collect();
            points.sort_by_key(|(ts, _)| *ts);
            points.truncate(query.limit as usize);
            if !points.is_empty() {
                page.insert(
                    key.clone(),
                    points
                        .into_iter()
                        .map(|(ts, v)| TsValue { ts, value: Value::String(v) })
                        .collect(),
                );
            }
        }
        Ok(page)
    }
}

fn ts(s: &str) -> i64 {
    parse_ts(s).expect("valid local timestamp")
}

fn options(data_dir: &Path, limit: u32) -> DownloadOptions {
    DownloadOptions {
        data_dir: data_dir.to_path_buf(),
        start_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        page_limit: limit,
        end_ts: Some(ts("2024-12-31 23:59:59")),
    }
}

fn csv_of(data_dir: &Path, device: &str) -> std::path::PathBuf {
    data_dir
        .join("Norte")
        .join("gw-1")
        .join(device)
        .join(format!("{device}_telemetry.csv"))
}

#[test]
fn organize_writes_descriptor_tree() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("thingsboard_data");
    let mut tb = FakeTb::with_tree(&["d1", "d2"]);

    let summary = organize(&mut tb, &data).unwrap();
    assert_eq!((summary.customers, summary.gateways, summary.devices), (1, 1, 2));

    let customer_json = fs::read_to_string(data.join("Norte").join("Norte_customer.json")).unwrap();
    assert!(customer_json.contains("\n    \"id\": {\n        \"entityType\": \"CUSTOMER\""));
    assert!(data.join("Norte/gw-1/gw-1_gateway.json").is_file());
    assert!(data.join("Norte/gw-1/dev-d1/dev-d1_device.json").is_file());
    assert!(data.join("Norte/gw-1/dev-d2/dev-d2_device.json").is_file());
}

#[test]
fn colliding_device_names_are_counted() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("thingsboard_data");
    let mut tb = FakeTb::with_tree(&[]);
    tb.devices.insert(
        "g1".into(),
        vec![
            json!({"id": {"id": "d1"}, "name": "bomba/1"}),
            json!({"id": {"id": "d2"}, "name": "bomba_1"}),
        ],
    );
    tb.push("d1", "temp", ts("2024-09-02 08:00:00"), "1");

    let organized = organize(&mut tb, &data).unwrap();
    assert_eq!(organized.devices, 2);
    assert_eq!(organized.name_collisions, 1);
    assert!(data.join("Norte/gw-1/bomba_1/bomba_1_device.json").is_file());

    let downloaded = download(&mut tb, &options(&data, 100)).unwrap();
    assert_eq!(downloaded.name_collisions, 1);
}

#[test]
fn download_pages_through_limit() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1"]);
    for (i, second) in ["00", "10", "20", "30", "40"].iter().enumerate() {
        tb.push("d1", "temp", ts(&format!("2024-09-02 08:00:{second}")), &format!("{i}"));
    }
    tb.push("d1", "hum", ts("2024-09-02 08:00:10"), "55");

    let summary = download(&mut tb, &options(tmp.path(), 2)).unwrap();
    assert_eq!(summary.rows_written, 5);
    assert_eq!(summary.devices_updated, 1);
    assert!(tb.timeseries_calls >= 3);

    let content = fs::read_to_string(csv_of(tmp.path(), "dev-d1")).unwrap();
    assert_eq!(
        content,
        "timestamp,hum,temp\r\n\
         2024-09-02 08:00:00,,0\r\n\
         2024-09-02 08:00:10,55,1\r\n\
         2024-09-02 08:00:20,,2\r\n\
         2024-09-02 08:00:30,,3\r\n\
         2024-09-02 08:00:40,,4\r\n"
    );
}

#[test]
fn keys_filling_the_limit_at_different_times_lose_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1"]);
    for (i, second) in ["00", "10", "20", "30"].iter().enumerate() {
        tb.push("d1", "temp", ts(&format!("2024-09-02 08:00:{second}")), &format!("t{i}"));
    }
    tb.push("d1", "hum", ts("2024-09-02 08:00:05"), "h0");
    tb.push("d1", "hum", ts("2024-09-02 08:00:35"), "h1");

    let summary = download(&mut tb, &options(tmp.path(), 2)).unwrap();
    assert_eq!(summary.rows_written, 6);

    let content = fs::read_to_string(csv_of(tmp.path(), "dev-d1")).unwrap();
    assert_eq!(
        content,
        "timestamp,hum,temp\r\n\
         2024-09-02 08:00:00,,t0\r\n\
         2024-09-02 08:00:05,h0,\r\n\
         2024-09-02 08:00:10,,t1\r\n\
         2024-09-02 08:00:20,,t2\r\n\
         2024-09-02 08:00:30,,t3\r\n\
         2024-09-02 08:00:35,h1,\r\n"
    );
}

#[test]
fn each_page_resumes_after_earliest_full_key() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1"]);
    for second in ["00", "01", "02", "03", "04", "05"] {
        tb.push("d1", "a", ts(&format!("2024-09-02 09:00:{second}")), "a");
    }
    for second in ["00", "02", "04", "06", "08", "10"] {
        tb.push("d1", "b", ts(&format!("2024-09-02 09:00:{second}")), "b");
    }

    let device = Device::from_value(json!({"id": {"id": "d1"}, "name": "dev-d1"})).unwrap();
    let keys = vec!["a".to_string(), "b".to_string()];
    let table = fetch_telemetry(
        &mut tb,
        &device,
        &keys,
        ts("2024-09-02 09:00:00"),
        ts("2024-09-02 10:00:00"),
        3,
    );

    let stamps: Vec<i64> = table.rows().map(|(ts, _)| *ts).collect();
    let expected: Vec<i64> = ["00", "01", "02", "03", "04", "05", "06", "08", "10"]
        .iter()
        .map(|s| ts(&format!("2024-09-02 09:00:{s}")))
        .collect();
    assert_eq!(stamps, expected);
    let at_04 = table.rows().find(|(t, _)| **t == ts("2024-09-02 09:00:04")).unwrap().1;
    assert_eq!(at_04.len(), 2);
}

#[test]
fn second_run_appends_only_new_rows() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1"]);
    tb.push("d1", "temp", ts("2024-09-05 10:00:00"), "1");
    download(&mut tb, &options(tmp.path(), 100)).unwrap();

    tb.push("d1", "temp", ts("2024-09-06 10:00:00"), "2");
    let summary = download(&mut tb, &options(tmp.path(), 100)).unwrap();
    assert_eq!(summary.rows_written, 1);

    let content = fs::read_to_string(csv_of(tmp.path(), "dev-d1")).unwrap();
    assert_eq!(
        content,
        "timestamp,temp\r\n2024-09-05 10:00:00,1\r\n2024-09-06 10:00:00,2\r\n"
    );
}

#[test]
fn data_before_start_date_is_ignored() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1"]);
    tb.push("d1", "temp", ts("2024-08-31 23:59:59"), "old");

    let summary = download(&mut tb, &options(tmp.path(), 100)).unwrap();
    assert_eq!(summary.rows_written, 0);
    assert!(!csv_of(tmp.path(), "dev-d1").exists());
}

#[test]
fn device_without_keys_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1", "d2"]);
    tb.push("d2", "temp", ts("2024-09-03 00:00:00"), "7");

    let summary = download(&mut tb, &options(tmp.path(), 100)).unwrap();
    assert_eq!(summary.devices, 2);
    assert_eq!(summary.devices_updated, 1);
    assert!(!tmp.path().join("Norte/gw-1/dev-d1").exists());
    assert!(csv_of(tmp.path(), "dev-d2").is_file());
}

#[test]
fn request_failure_keeps_rows_already_fetched() {
    let tmp = TempDir::new().unwrap();
    let mut tb = FakeTb::with_tree(&["d1"]);
    tb.push("d1", "temp", ts("2024-09-02 08:00:00"), "a");
    tb.push("d1", "temp", ts("2024-09-02 08:00:01"), "b");
    tb.push("d1", "temp", ts("2024-09-02 08:00:02"), "c");
    tb.fail_after = Some(1);

    let summary = download(&mut tb, &options(tmp.path(), 2)).unwrap();
    assert_eq!(summary.rows_written, 2);

    let content = fs::read_to_string(csv_of(tmp.path(), "dev-d1")).unwrap();
    assert_eq!(content.lines().count(), 3);
}
