//! Battery telemetry from the I/O Registry.
//!
//! Shells out to `ioreg -r -c AppleSmartBattery -d 1` and parses the
//! `"Key" = value` lines of each registry entry. Capacities are reported in
//! mAh and converted to mWh through the pack voltage.

use std::collections::BTreeMap;
use std::process::Command;

use tracing::debug;

use crate::fields;
use crate::{BatterySource, FieldRecord, RecordStream, SourceError};

pub struct IoregSource;

impl IoregSource {
    pub fn new() -> Self {
        Self
    }

    fn entries(&self) -> Result<Vec<SmartBattery>, SourceError> {
        let output = Command::new("ioreg")
            .args(["-r", "-c", "AppleSmartBattery", "-d", "1"])
            .output()
            .map_err(|e| SourceError::Unavailable(format!("ioreg: {}", e)))?;

        if !output.status.success() {
            return Err(SourceError::Query(format!(
                "ioreg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let entries = parse_ioreg(&String::from_utf8_lossy(&output.stdout));
        debug!(count = entries.len(), "enumerated ioreg batteries");
        Ok(entries)
    }
}

impl BatterySource for IoregSource {
    fn full_charge_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows: Vec<FieldRecord> = self
            .entries()?
            .into_iter()
            .filter_map(|battery| {
                let mwh = battery.full_charge_mwh()?;
                Some(
                    FieldRecord::new()
                        .with(fields::INSTANCE_NAME, battery.instance_name())
                        .with(fields::FULL_CHARGED_CAPACITY, mwh),
                )
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn design_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows: Vec<FieldRecord> = self
            .entries()?
            .into_iter()
            .filter_map(|battery| {
                let mah = battery.num("DesignCapacity")?;
                let mwh = mah_to_mwh(mah as u64, battery.voltage_mv());
                Some(
                    FieldRecord::new()
                        .with(fields::INSTANCE_NAME, battery.instance_name())
                        .with(fields::DESIGNED_CAPACITY, mwh),
                )
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn cycle_counts(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows: Vec<FieldRecord> = self
            .entries()?
            .into_iter()
            .filter_map(|battery| {
                let cycles = battery.num("CycleCount")?;
                Some(
                    FieldRecord::new()
                        .with(fields::INSTANCE_NAME, battery.instance_name())
                        .with(fields::CYCLE_COUNT, cycles as u64),
                )
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn status(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows: Vec<FieldRecord> = self
            .entries()?
            .into_iter()
            .filter_map(|battery| {
                let voltage_mv = battery.voltage_mv();
                (voltage_mv > 0).then(|| battery.status_row(voltage_mv))
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }
}

/// One AppleSmartBattery registry entry, with raw key/value lines parsed.
struct SmartBattery {
    values: BTreeMap<String, String>,
}

impl SmartBattery {
    fn num(&self, key: &str) -> Option<i64> {
        parse_number(self.values.get(key)?)
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key).map(String::as_str), Some("Yes"))
    }

    fn instance_name(&self) -> String {
        self.values
            .get("Serial")
            .or_else(|| self.values.get("BatterySerialNumber"))
            .cloned()
            .unwrap_or_else(|| "AppleSmartBattery".to_string())
    }

    fn voltage_mv(&self) -> u64 {
        self.num("Voltage").unwrap_or(0).max(0) as u64
    }

    /// Raw capacity keys are mAh; the plain keys are percentages on Apple
    /// silicon, so they only count when they exceed 100.
    fn capacity_mah(&self, raw_key: &str, key: &str) -> Option<u64> {
        if let Some(raw) = self.num(raw_key) {
            return Some(raw.max(0) as u64);
        }
        let value = self.num(key)?;
        (value > 100).then_some(value as u64)
    }

    fn full_charge_mwh(&self) -> Option<u64> {
        let mah = self.capacity_mah("AppleRawMaxCapacity", "MaxCapacity")?;
        Some(mah_to_mwh(mah, self.voltage_mv()))
    }

    fn remaining_mwh(&self) -> u64 {
        self.capacity_mah("AppleRawCurrentCapacity", "CurrentCapacity")
            .map(|mah| mah_to_mwh(mah, self.voltage_mv()))
            .unwrap_or(0)
    }

    fn status_row(&self, voltage_mv: u64) -> FieldRecord {
        let charging = self.flag("IsCharging");
        let external = self.flag("ExternalConnected");
        let discharging = !charging && !external;

        let amperage_ma = self.num("Amperage").or_else(|| self.num("InstantAmperage"));
        let rate_mw = amperage_ma
            .map(|ma| ma.unsigned_abs().saturating_mul(voltage_mv) / 1000)
            .unwrap_or(0);

        FieldRecord::new()
            .with(fields::INSTANCE_NAME, self.instance_name())
            .with(fields::POWER_ONLINE, external)
            .with(fields::CHARGING, charging)
            .with(fields::DISCHARGING, discharging)
            .with(fields::VOLTAGE, voltage_mv)
            .with(fields::DISCHARGE_RATE, if discharging { rate_mw } else { 0u64 })
            .with(fields::CHARGE_RATE, if charging { rate_mw } else { 0u64 })
            .with(fields::REMAINING_CAPACITY, self.remaining_mwh())
            .with(fields::ACTIVE, self.values.contains_key("Voltage"))
            .with(fields::CRITICAL, self.flag("AtCriticalLevel"))
    }
}

fn mah_to_mwh(mah: u64, voltage_mv: u64) -> u64 {
    mah.saturating_mul(voltage_mv) / 1000
}

/// Splits the registry dump into entries and collects each entry's
/// `"Key" = value` lines.
fn parse_ioreg(output: &str) -> Vec<SmartBattery> {
    let mut entries = Vec::new();
    let mut current: Option<BTreeMap<String, String>> = None;

    for line in output.lines() {
        let trimmed = line.trim_start_matches(['|', ' ']).trim_end();

        if trimmed.starts_with("+-o ") {
            if let Some(values) = current.take() {
                entries.push(SmartBattery { values });
            }
            current = Some(BTreeMap::new());
            continue;
        }

        let Some(values) = current.as_mut() else {
            continue;
        };
        if let Some((key, value)) = parse_key_value(trimmed) {
            values.insert(key, value);
        }
    }

    if let Some(values) = current {
        entries.push(SmartBattery { values });
    }

    entries.retain(|b| !b.values.is_empty());
    entries
}

fn parse_key_value(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix('"')?;
    let (key, rest) = rest.split_once('"')?;
    let value = rest.trim_start().strip_prefix('=')?.trim();
    Some((key.to_string(), value.trim_matches('"').to_string()))
}

/// ioreg prints negative numbers as their 64-bit two's complement.
fn parse_number(value: &str) -> Option<i64> {
    if let Ok(signed) = value.parse::<i64>() {
        return Some(signed);
    }
    value.parse::<u64>().ok().map(|v| v as i64)
}
