//! Alert and log exports. Every input row becomes exactly one output row.

use chrono::{DateTime, FixedOffset, Utc};
use std::fmt::Write as _;

use crate::entity::{Sensor, TemperatureLog};
use crate::error::{AppError, AppResult};
use crate::sync::session::{display_timestamp, AlertView};

const ALERT_HEADERS: [&str; 5] = ["Time", "Sensor", "Alert type", "Temperature (°C)", "Status"];
const LOG_HEADERS: [&str; 3] = ["Time", "Sensor", "Temperature (°C)"];

/// Alert history as CSV, in the order given.
///
/// # Errors
///
/// `Internal` if the writer fails, which only happens on allocation failure.
pub fn alerts_csv(alerts: &[AlertView]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ALERT_HEADERS).map_err(csv_error)?;

    for view in alerts {
        let temperature = format!("{:.1}", view.alert.temperature);
        writer
            .write_record([
                view.time.as_str(),
                view.sensor.as_str(),
                view.alert.kind.label(),
                temperature.as_str(),
                view.alert.status.label(),
            ])
            .map_err(csv_error)?;
    }

    into_string(writer)
}

/// Temperature logs as CSV with sensor names resolved.
///
/// # Errors
///
/// `Internal` if the writer fails.
pub fn logs_csv(logs: &[TemperatureLog], sensors: &[Sensor], offset: FixedOffset) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LOG_HEADERS).map_err(csv_error)?;

    for log in logs {
        let name = sensors
            .iter()
            .find(|s| s.id == log.sensor_id)
            .map_or_else(|| Sensor::fallback_name(log.sensor_id), |s| s.name.clone());
        let time = display_timestamp(log.logged_at, offset);
        let temperature = log.temperature.to_string();
        writer
            .write_record([time.as_str(), name.as_str(), temperature.as_str()])
            .map_err(csv_error)?;
    }

    into_string(writer)
}

/// Printable HTML report of the alert history.
#[must_use]
pub fn alerts_html_report(alerts: &[AlertView], generated_at: DateTime<Utc>, offset: FixedOffset) -> String {
    let mut html = String::with_capacity(1024 + alerts.len() * 256);
    let generated = display_timestamp(generated_at, offset);
    let date = generated_at.with_timezone(&offset).format("%-d/%-m/%Y");

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Temperature alert report - {date}</title>
<style>
body {{ font-family: Arial, sans-serif; margin: 20px; }}
table {{ width: 100%; border-collapse: collapse; margin-top: 20px; }}
th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
th {{ background-color: #f2f2f2; }}
.header {{ text-align: center; margin-bottom: 30px; }}
</style>
</head>
<body>
<div class="header">
<h1>TEMPERATURE ALERT REPORT</h1>
<p>Generated: {generated}</p>
<p>Total alerts: {total}</p>
</div>
<table>
<thead>
<tr>"#,
        total = alerts.len()
    );
    for header in ALERT_HEADERS {
        let _ = write!(html, "<th>{}</th>", escape_html(header));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for view in alerts {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>",
            escape_html(&view.time),
            escape_html(&view.sensor),
            view.alert.kind.label(),
            view.alert.temperature,
            view.alert.status.label(),
        );
    }

    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}

/// Download file name for an export, stamped with the UTC date.
#[must_use]
pub fn export_file_name(stem: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!("{stem}-{}.{extension}", at.format("%Y-%m-%d"))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Internal(format!("CSV export failed: {e}"))
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> AppResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV export failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(e.to_string()))
}
