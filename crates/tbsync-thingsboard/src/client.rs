//! Blocking ThingsBoard REST client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{Result, TbError};
use crate::models::{Customer, Device, PageData, TimeseriesPage};
use crate::settings::ClientSettings;

/// Page size for entity listings.
pub const LIST_PAGE_SIZE: u32 = 1000;

/// One timeseries request window.
#[derive(Debug, Clone, Copy)]
pub struct TimeseriesQuery<'a> {
    pub device_id: &'a str,
    pub keys: &'a [String],
    pub start_ts: i64,
    pub end_ts: i64,
    pub limit: u32,
}

/// Operations the organize/download passes need from a server.
///
/// Listing calls are best-effort: failures are logged and yield an empty
/// list. `timeseries` surfaces errors so the caller can stop paging.
pub trait ThingsBoardApi {
    fn customers(&mut self) -> Vec<Customer>;
    fn customer_gateways(&mut self, customer_id: &str) -> Vec<Device>;
    fn gateway_devices(&mut self, gateway_id: &str) -> Vec<Device>;
    fn telemetry_keys(&mut self, device_id: &str) -> Vec<String>;
    fn timeseries(&mut self, query: &TimeseriesQuery<'_>) -> Result<TimeseriesPage>;
}

pub struct ThingsBoardClient {
    base_url: String,
    settings: ClientSettings,
    http: Client,
    token: Option<String>,
    token_path: PathBuf,
}

impl ThingsBoardClient {
    /// Build a client without logging in.
    pub fn new(settings: ClientSettings, token_path: &Path, timeout: Duration) -> Result<Self> {
        let base_url = settings.base_url()?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TbError::request("Build HTTP client"))?;
        Ok(Self {
            base_url,
            settings,
            http,
            token: None,
            token_path: token_path.to_path_buf(),
        })
    }

    /// Build a client and log in. Authentication failure is fatal.
    pub fn connect(settings: ClientSettings, token_path: &Path, timeout: Duration) -> Result<Self> {
        let mut client = Self::new(settings, token_path, timeout)?;
        client.authenticate()?;
        Ok(client)
    }

    /// Start from an existing JWT instead of logging in first.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `POST /api/auth/login`; stores the JWT and writes it to the token file.
    pub fn authenticate(&mut self) -> Result<()> {
        let url = format!("{}/api/auth/login", self.base_url);
        tracing::info!(url = %url, "Authenticating with ThingsBoard");
        let body = json!({
            "username": self.settings.username,
            "password": self.settings.password,
        });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(TbError::request("Login request failed"))?;

        let status = resp.status();
        if status.as_u16() != 200 {
            let body = resp.text().unwrap_or_default();
            return Err(TbError::AuthFailed {
                status: status.as_u16(),
                body,
            });
        }
        let payload: Value = resp
            .json()
            .map_err(TbError::request("Failed to parse login response"))?;
        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| TbError::AuthFailed {
                status: status.as_u16(),
                body: "response has no token".to_string(),
            })?
            .to_string();

        if let Err(e) = std::fs::write(&self.token_path, json!({ "token": token }).to_string()) {
            tracing::warn!(path = %self.token_path.display(), error = %e, "Could not write token file");
        }
        tracing::info!("Authenticated, token received");
        self.token = Some(token);
        Ok(())
    }

    fn send_get<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        if self.token.is_none() {
            self.authenticate()?;
        }
        let token = self.token.clone().unwrap_or_default();
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .header("Content-Type", "application/json")
            .header("X-Authorization", format!("Bearer {}", token))
            .send()
            .map_err(TbError::request(context))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(TbError::Status {
                context: context.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>().map_err(TbError::request(context))
    }

    /// GET with one re-login on 401 (expired JWT on long runs).
    fn get_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        match self.send_get(path, query, context) {
            Err(e) if e.is_unauthorized() => {
                tracing::warn!("{}: token rejected, logging in again", context);
                self.token = None;
                self.authenticate()?;
                self.send_get(path, query, context)
            }
            other => other,
        }
    }

    /// Walk a paginated listing until `hasNext` is false.
    fn list_all(
        &mut self,
        path: &str,
        extra: &[(&str, String)],
        context: &str,
    ) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 0u32;
        loop {
            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("pageSize", LIST_PAGE_SIZE.to_string()));
            query.push(("page", page.to_string()));
            let data: PageData = self.get_json(path, &query, context)?;
            let was_empty = data.data.is_empty();
            items.extend(data.data);
            if !data.has_next || was_empty {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

fn collect_entities<T>(items: Vec<Value>, parse: fn(Value) -> Option<T>, kind: &str) -> Vec<T> {
    let total = items.len();
    let parsed: Vec<T> = items.into_iter().filter_map(parse).collect();
    if parsed.len() < total {
        tracing::warn!(
            skipped = total - parsed.len(),
            "Skipped {} entries without id or name",
            kind
        );
    }
    parsed
}

impl ThingsBoardApi for ThingsBoardClient {
    fn customers(&mut self) -> Vec<Customer> {
        tracing::info!("Fetching customers");
        match self.list_all("/api/customers", &[], "Fetch customers") {
            Ok(items) => {
                let customers = collect_entities(items, Customer::from_value, "customer");
                tracing::info!(count = customers.len(), "Customers fetched");
                customers
            }
            Err(e) => {
                tracing::error!("{}", e);
                Vec::new()
            }
        }
    }

    fn customer_gateways(&mut self, customer_id: &str) -> Vec<Device> {
        let path = format!("/api/customer/{}/devices", customer_id);
        let context = format!("Fetch gateways for customer {}", customer_id);
        match self.list_all(&path, &[], &context) {
            Ok(items) => {
                let gateways: Vec<Device> = collect_entities(items, Device::from_value, "device")
                    .into_iter()
                    .filter(Device::is_gateway)
                    .collect();
                tracing::info!(count = gateways.len(), "Gateways fetched for customer");
                gateways
            }
            Err(e) => {
                tracing::error!("{}", e);
                Vec::new()
            }
        }
    }

    fn gateway_devices(&mut self, gateway_id: &str) -> Vec<Device> {
        let context = format!("Fetch devices for gateway {}", gateway_id);
        let extra = [("gatewayId", gateway_id.to_string())];
        match self.list_all("/api/tenant/devices", &extra, &context) {
            Ok(items) => {
                let devices = collect_entities(items, Device::from_value, "device");
                tracing::info!(count = devices.len(), "Devices fetched for gateway");
                devices
            }
            Err(e) => {
                tracing::error!("{}", e);
                Vec::new()
            }
        }
    }

    fn telemetry_keys(&mut self, device_id: &str) -> Vec<String> {
        let path = format!("/api/plugins/telemetry/DEVICE/{}/keys/timeseries", device_id);
        match self.get_json::<Vec<String>>(&path, &[], "Fetch telemetry keys") {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("{}", e);
                Vec::new()
            }
        }
    }

    fn timeseries(&mut self, query: &TimeseriesQuery<'_>) -> Result<TimeseriesPage> {
        let path = format!(
            "/api/plugins/telemetry/DEVICE/{}/values/timeseries",
            query.device_id
        );
        let params = [
            ("limit", query.limit.to_string()),
            ("startTs", query.start_ts.to_string()),
            ("endTs", query.end_ts.to_string()),
            ("keys", query.keys.join(",")),
            // Ascending so that `startTs = last + 1` walks forward page by page.
            ("orderBy", "ASC".to_string()),
        ];
        self.get_json(&path, &params, "Fetch telemetry")
    }
}
