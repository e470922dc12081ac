//! Battery telemetry from the WMI battery classes.
//!
//! Queries the `root/wmi` namespace through PowerShell's `Get-CimInstance`
//! and maps the JSON output to records. The four classes line up one-to-one
//! with the four record streams: `BatteryStatus`,
//! `BatteryFullChargedCapacity`, `BatteryStaticData`, `BatteryCycleCount`.

use std::process::Command;

use serde_json::Value;
use tracing::debug;

use crate::fields;
use crate::{BatterySource, FieldRecord, RecordStream, SourceError};

const NAMESPACE: &str = "root/wmi";

const STATUS_FIELDS: &[&str] = &[
    fields::TAG,
    fields::INSTANCE_NAME,
    fields::POWER_ONLINE,
    fields::DISCHARGING,
    fields::CHARGING,
    fields::VOLTAGE,
    fields::DISCHARGE_RATE,
    fields::CHARGE_RATE,
    fields::REMAINING_CAPACITY,
    fields::ACTIVE,
    fields::CRITICAL,
];

pub struct CimSource;

impl CimSource {
    pub fn new() -> Self {
        Self
    }

    fn query(&self, class: &str, wanted: &[&str]) -> Result<Vec<FieldRecord>, SourceError> {
        let command = format!(
            "Get-CimInstance -Namespace {} -ClassName {} | Select-Object -Property * | ConvertTo-Json -Depth 3",
            NAMESPACE, class
        );

        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &command])
            .output()
            .map_err(|e| SourceError::Unavailable(format!("powershell: {}", e)))?;

        if !output.status.success() {
            return Err(SourceError::Query(format!(
                "{} query exited with {}: {}",
                class,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let rows = parse_rows(text.trim(), wanted)
            .map_err(|e| SourceError::Query(format!("{}: {}", class, e)))?;

        debug!(class, count = rows.len(), "queried CIM class");
        Ok(rows)
    }
}

impl BatterySource for CimSource {
    fn full_charge_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows = self.query(
            "BatteryFullChargedCapacity",
            &[fields::TAG, fields::INSTANCE_NAME, fields::FULL_CHARGED_CAPACITY],
        )?;
        Ok(Box::new(rows.into_iter()))
    }

    fn design_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows = self.query(
            "BatteryStaticData",
            &[fields::TAG, fields::INSTANCE_NAME, fields::DESIGNED_CAPACITY],
        )?;
        Ok(Box::new(rows.into_iter()))
    }

    fn cycle_counts(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows = self.query(
            "BatteryCycleCount",
            &[fields::TAG, fields::INSTANCE_NAME, fields::CYCLE_COUNT],
        )?;
        Ok(Box::new(rows.into_iter()))
    }

    fn status(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows = self.query("BatteryStatus", STATUS_FIELDS)?;
        Ok(Box::new(rows.into_iter().filter(|row| {
            row.uint(fields::VOLTAGE).unwrap_or(0) > 0
        })))
    }
}

/// ConvertTo-Json emits nothing for zero instances, an object for one, and
/// an array for several.
fn parse_rows(text: &str, wanted: &[&str]) -> Result<Vec<FieldRecord>, String> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let json: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let objects: Vec<&Value> = match &json {
        Value::Array(items) => items.iter().collect(),
        object => vec![object],
    };

    Ok(objects
        .into_iter()
        .map(|object| to_record(object, wanted))
        .collect())
}

fn to_record(object: &Value, wanted: &[&str]) -> FieldRecord {
    let mut row = FieldRecord::new();
    for &field in wanted {
        match object.get(field) {
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    row.set(field, v);
                }
            }
            Some(Value::Bool(b)) => row.set(field, *b),
            Some(Value::String(s)) => row.set(field, s.as_str()),
            _ => {}
        }
    }
    row
}
