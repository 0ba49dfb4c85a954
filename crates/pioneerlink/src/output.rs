use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pioneerlink_device::Measurement;
use pioneerlink_frame::{code_name, Channel, StreamItem};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MeasurementOutput<'a> {
    timestamp_ms: u64,
    #[serde(flatten)]
    measurement: &'a Measurement,
}

pub fn print_measurement(measurement: &Measurement, timestamp_ms: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MeasurementOutput {
                timestamp_ms,
                measurement,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME (ms)", "KIND", "VALUE"])
                .add_row(vec![
                    timestamp_ms.to_string(),
                    measurement.kind().to_string(),
                    measurement_summary(measurement),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "t={} {} {}",
                timestamp_ms,
                measurement.kind(),
                measurement_summary(measurement)
            );
        }
    }
}

fn measurement_summary(measurement: &Measurement) -> String {
    match measurement {
        Measurement::Depth { value } => format!("{value:.3} m"),
        Measurement::Temperature { value } => format!("{value:.2} C"),
        Measurement::Orientation(o) => format!(
            "phi={:.4} theta={:.4} psi={:.4} rad",
            o.phi, o.theta, o.psi
        ),
        Measurement::NavigationEstimate(n) => format!(
            "lat={:.8} lon={:.8} depth={:.3} m",
            n.lat.to_degrees(),
            n.lon.to_degrees(),
            n.depth
        ),
        Measurement::RawFrame(raw) => format!(
            "{} {:?} {}",
            raw.channel.name(),
            raw.direction,
            hex(&raw.bytes)
        ),
    }
}

/// One decoded item of a raw stream, ready to print.
#[derive(Debug, Serialize)]
pub struct ItemRow {
    pub offset: u64,
    pub item: &'static str,
    pub name: &'static str,
    pub fields: Value,
}

impl ItemRow {
    pub fn from_item<M: Serialize>(
        channel: Channel,
        item: &StreamItem<M>,
        name: impl Fn(&M) -> &'static str,
    ) -> Self {
        match item {
            StreamItem::Record { offset, message } => Self {
                offset: *offset,
                item: "record",
                name: name(message),
                fields: serde_json::to_value(message).unwrap_or(Value::Null),
            },
            StreamItem::Unknown { offset, code } => Self {
                offset: *offset,
                item: "unknown",
                name: code_name(channel, *code),
                fields: serde_json::json!({ "code": code }),
            },
            StreamItem::Trailing { offset, bytes } => Self {
                offset: *offset,
                item: "trailing",
                name: "",
                fields: serde_json::json!({ "bytes": bytes }),
            },
        }
    }
}

pub fn print_items(rows: &[ItemRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "ITEM", "NAME", "FIELDS"]);
            for row in rows {
                table.add_row(vec![
                    row.offset.to_string(),
                    row.item.to_string(),
                    row.name.to_string(),
                    row.fields.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "@{} {} {} {}",
                    row.offset, row.item, row.name, row.fields
                );
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
