//! Mirror customers → gateways → devices as directories of JSON descriptors.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::Value;
use tbsync_core::path_validation::SiblingNames;

use crate::client::ThingsBoardApi;
use crate::error::{Result, TbError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrganizeSummary {
    pub customers: usize,
    pub gateways: usize,
    pub devices: usize,
    /// Entities whose sanitized name was already taken by a sibling.
    pub name_collisions: usize,
}

/// Pretty printer that escapes everything outside printable ASCII as
/// `\uXXXX` (UTF-16 units), so descriptors match files written by Python's
/// `json.dump(..., indent=4)`.
struct AsciiPrettyFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl<'a> AsciiPrettyFormatter<'a> {
    fn with_indent(indent: &'a [u8]) -> Self {
        Self {
            inner: PrettyFormatter::with_indent(indent),
        }
    }
}

impl Formatter for AsciiPrettyFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '\x7f' {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Write `value` with 4-space indentation and ASCII-only output.
pub(crate) fn write_pretty_json(path: &Path, value: &Value) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = AsciiPrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    fs::write(path, buf).map_err(TbError::io(path))
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(TbError::io(path))
}

/// Build `<data_dir>/<customer>/<gateway>/<device>/` with one
/// `<name>_{customer,gateway,device}.json` per level.
pub fn organize(api: &mut dyn ThingsBoardApi, data_dir: &Path) -> Result<OrganizeSummary> {
    tracing::info!(data_dir = %data_dir.display(), "Organizing customer, gateway and device directories");
    let customers = api.customers();
    ensure_dir(data_dir)?;

    let mut summary = OrganizeSummary::default();
    let total = customers.len();
    let mut customer_names = SiblingNames::new();
    for (idx, customer) in customers.iter().enumerate() {
        let customer_name = customer_names.component(&customer.title);
        tracing::info!("[{}/{}] Organizing customer {}", idx + 1, total, customer.title);
        let customer_dir = data_dir.join(&customer_name);
        ensure_dir(&customer_dir)?;
        write_pretty_json(
            &customer_dir.join(format!("{}_customer.json", customer_name)),
            &customer.raw,
        )?;
        summary.customers += 1;

        let gateways = api.customer_gateways(&customer.id.id);
        if gateways.is_empty() {
            tracing::info!("No gateways found for customer {}", customer.title);
        }
        let mut gateway_names = SiblingNames::new();
        for gateway in &gateways {
            let gateway_name = gateway_names.component(&gateway.name);
            tracing::info!("Organizing gateway {}", gateway.name);
            let gateway_dir = customer_dir.join(&gateway_name);
            ensure_dir(&gateway_dir)?;
            write_pretty_json(
                &gateway_dir.join(format!("{}_gateway.json", gateway_name)),
                &gateway.raw,
            )?;
            summary.gateways += 1;

            let devices = api.gateway_devices(&gateway.id.id);
            if devices.is_empty() {
                tracing::info!("No devices found for gateway {}", gateway.name);
            }
            let mut device_names = SiblingNames::new();
            for device in &devices {
                let device_name = device_names.component(&device.name);
                tracing::debug!("Organizing device {}", device.name);
                let device_dir = gateway_dir.join(&device_name);
                ensure_dir(&device_dir)?;
                write_pretty_json(
                    &device_dir.join(format!("{}_device.json", device_name)),
                    &device.raw,
                )?;
                summary.devices += 1;
            }
            summary.name_collisions += device_names.collisions();
        }
        summary.name_collisions += gateway_names.collisions();
    }
    summary.name_collisions += customer_names.collisions();

    tracing::info!(
        customers = summary.customers,
        gateways = summary.gateways,
        devices = summary.devices,
        name_collisions = summary.name_collisions,
        "Organize finished"
    );
    Ok(summary)
}
