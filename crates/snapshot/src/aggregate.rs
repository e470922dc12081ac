//! Correlation of the four telemetry result sets into per-battery records.
//!
//! The result sets are independently ordered by their own queries; nothing
//! ties row `i` of one set to row `i` of another beyond enumeration order.
//! When every row of every non-empty set carries an instance name (or tag)
//! that is unique within its set, rows are joined by that key; otherwise the
//! join falls back to position, which is only correct when all four queries
//! enumerate batteries identically.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use joule_source::{fields, BatterySource, FieldRecord, SourceError};
use tracing::{debug, warn};

use crate::types::BatteryRecord;

/// The materialized output of one round of the four telemetry queries.
#[derive(Debug, Clone, Default)]
pub struct SourceReadings {
    pub status: Vec<FieldRecord>,
    pub full_charge: Vec<FieldRecord>,
    pub design: Vec<FieldRecord>,
    pub cycles: Vec<FieldRecord>,
}

impl SourceReadings {
    /// Drains all four queries. Any single failure fails the whole
    /// collection; no partial readings are returned.
    pub fn collect(source: &dyn BatterySource) -> Result<Self, SourceError> {
        Ok(Self {
            full_charge: source.full_charge_capacities()?.collect(),
            design: source.design_capacities()?.collect(),
            cycles: source.cycle_counts()?.collect(),
            status: source.status()?.collect(),
        })
    }

    fn result_sets(&self) -> [&[FieldRecord]; 4] {
        [&self.status, &self.full_charge, &self.design, &self.cycles]
    }
}

/// How rows of different result sets are matched to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinMode {
    InstanceName,
    Tag,
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Name(String),
    Tag(u64),
    Index(usize),
}

/// Correlates the four result sets into per-battery records, in status-query
/// order. Derived metrics are attached where their inputs exist; a zero
/// denominator leaves the metric absent rather than faulting.
pub fn correlate(readings: &SourceReadings) -> Vec<BatteryRecord> {
    let mode = join_mode(readings);
    debug!(?mode, batteries = readings.status.len(), "correlating telemetry rows");

    if mode == JoinMode::Positional {
        let [status, full, design, cycles] = readings.result_sets();
        let counts = [status.len(), full.len(), design.len(), cycles.len()];
        if counts.iter().any(|&c| c != counts[0] && c != 0) {
            warn!(
                status = counts[0],
                full_charge = counts[1],
                design = counts[2],
                cycles = counts[3],
                "row counts differ across telemetry queries; positional correlation may mismatch"
            );
        }
    }

    let full = index_values(&readings.full_charge, fields::FULL_CHARGED_CAPACITY, mode);
    let design = index_values(&readings.design, fields::DESIGNED_CAPACITY, mode);
    let cycles = index_values(&readings.cycles, fields::CYCLE_COUNT, mode);

    readings
        .status
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let key = row_key(mode, row, index);
            let mut record = base_record(row);

            let full_charge = full.get(&key).copied();
            if let (Some(full_charge), Some(design)) = (full_charge, design.get(&key).copied()) {
                record.health_percent = scaled_percent(full_charge, design);
            }
            if let Some(full_charge) = full_charge {
                record.charge_percent = scaled_percent(record.remaining_capacity_mwh, full_charge);
            }
            record.cycle_count = cycles.get(&key).map(|&c| c as u32);

            record
        })
        .collect()
}

/// Picks the strongest join key every result set can support.
fn join_mode(readings: &SourceReadings) -> JoinMode {
    let sets = readings.result_sets();
    if key_usable(&sets, |row| row.text(fields::INSTANCE_NAME)) {
        JoinMode::InstanceName
    } else if key_usable(&sets, |row| row.uint(fields::TAG)) {
        JoinMode::Tag
    } else {
        JoinMode::Positional
    }
}

/// A key is usable when every row of every set carries it and no set
/// contains it twice.
fn key_usable<'a, K: Eq + Hash>(
    sets: &[&'a [FieldRecord]; 4],
    extract: impl Fn(&'a FieldRecord) -> Option<K>,
) -> bool {
    sets.iter().all(|rows| {
        let mut seen = HashSet::new();
        rows.iter().all(|row| match extract(row) {
            Some(key) => seen.insert(key),
            None => false,
        })
    })
}

fn row_key(mode: JoinMode, row: &FieldRecord, index: usize) -> RowKey {
    match mode {
        JoinMode::InstanceName => RowKey::Name(
            row.text(fields::INSTANCE_NAME).unwrap_or_default().to_string(),
        ),
        JoinMode::Tag => RowKey::Tag(row.uint(fields::TAG).unwrap_or(0)),
        JoinMode::Positional => RowKey::Index(index),
    }
}

fn index_values(rows: &[FieldRecord], field: &str, mode: JoinMode) -> HashMap<RowKey, u64> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| Some((row_key(mode, row, index), row.uint(field)?)))
        .collect()
}

fn base_record(row: &FieldRecord) -> BatteryRecord {
    BatteryRecord {
        tag: row.uint(fields::TAG).map(|t| t as u32),
        instance_name: row.text(fields::INSTANCE_NAME).map(str::to_owned),
        power_online: row.boolean(fields::POWER_ONLINE).unwrap_or(false),
        discharging: row.boolean(fields::DISCHARGING).unwrap_or(false),
        charging: row.boolean(fields::CHARGING).unwrap_or(false),
        voltage_mv: row.uint(fields::VOLTAGE).unwrap_or(0),
        discharge_rate_mw: row.uint(fields::DISCHARGE_RATE).unwrap_or(0),
        charge_rate_mw: row.uint(fields::CHARGE_RATE).unwrap_or(0),
        remaining_capacity_mwh: row.uint(fields::REMAINING_CAPACITY).unwrap_or(0),
        active: row.boolean(fields::ACTIVE).unwrap_or(false),
        critical: row.boolean(fields::CRITICAL).unwrap_or(false),
        health_percent: None,
        charge_percent: None,
        cycle_count: None,
    }
}

/// `100 * numerator / denominator` with truncating integer division, or
/// `None` when the denominator is zero.
fn scaled_percent(numerator: u64, denominator: u64) -> Option<u32> {
    if denominator == 0 {
        return None;
    }
    Some((numerator.saturating_mul(100) / denominator) as u32)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn status_row(name: &str, remaining: u64) -> FieldRecord {
        FieldRecord::new()
            .with(fields::INSTANCE_NAME, name)
            .with(fields::VOLTAGE, 11000u64)
            .with(fields::REMAINING_CAPACITY, remaining)
            .with(fields::DISCHARGING, true)
    }

    fn capacity_row(name: &str, field: &str, value: u64) -> FieldRecord {
        FieldRecord::new()
            .with(fields::INSTANCE_NAME, name)
            .with(field, value)
    }

    #[test]
    fn health_uses_truncating_division() {
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 3000)],
            full_charge: vec![capacity_row("BAT0", fields::FULL_CHARGED_CAPACITY, 4000)],
            design: vec![capacity_row("BAT0", fields::DESIGNED_CAPACITY, 5000)],
            cycles: Vec::new(),
        };

        let records = correlate(&readings);
        assert_eq!(records[0].health_percent, Some(80));
    }

    #[test]
    fn charge_percent_from_remaining_and_full() {
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 1000)],
            full_charge: vec![capacity_row("BAT0", fields::FULL_CHARGED_CAPACITY, 4000)],
            design: vec![capacity_row("BAT0", fields::DESIGNED_CAPACITY, 5000)],
            cycles: Vec::new(),
        };

        let records = correlate(&readings);
        assert_eq!(records[0].charge_percent, Some(25));
    }

    #[test]
    fn zero_design_capacity_omits_health_without_faulting() {
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 3000)],
            full_charge: vec![capacity_row("BAT0", fields::FULL_CHARGED_CAPACITY, 4000)],
            design: vec![capacity_row("BAT0", fields::DESIGNED_CAPACITY, 0)],
            cycles: Vec::new(),
        };

        let records = correlate(&readings);
        assert_eq!(records[0].health_percent, None);
        assert_eq!(records[0].charge_percent, Some(75));
    }

    #[test]
    fn zero_full_charge_omits_charge_percent() {
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 3000)],
            full_charge: vec![capacity_row("BAT0", fields::FULL_CHARGED_CAPACITY, 0)],
            design: vec![capacity_row("BAT0", fields::DESIGNED_CAPACITY, 5000)],
            cycles: Vec::new(),
        };

        let records = correlate(&readings);
        assert_eq!(records[0].health_percent, None);
        assert_eq!(records[0].charge_percent, None);
    }

    #[test]
    fn cycle_count_without_capacities_leaves_percentages_absent() {
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 3000)],
            full_charge: Vec::new(),
            design: Vec::new(),
            cycles: vec![capacity_row("BAT0", fields::CYCLE_COUNT, 120)],
        };

        let records = correlate(&readings);
        assert_eq!(records[0].cycle_count, Some(120));
        assert_eq!(records[0].health_percent, None);
        assert_eq!(records[0].charge_percent, None);
    }

    #[test]
    fn keyed_join_survives_reordered_capacity_rows() {
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 3000), status_row("BAT1", 2000)],
            full_charge: vec![
                capacity_row("BAT1", fields::FULL_CHARGED_CAPACITY, 40000),
                capacity_row("BAT0", fields::FULL_CHARGED_CAPACITY, 50000),
            ],
            design: vec![
                capacity_row("BAT0", fields::DESIGNED_CAPACITY, 50000),
                capacity_row("BAT1", fields::DESIGNED_CAPACITY, 50000),
            ],
            cycles: vec![capacity_row("BAT1", fields::CYCLE_COUNT, 7)],
        };

        let records = correlate(&readings);
        assert_eq!(records[0].health_percent, Some(100));
        assert_eq!(records[0].cycle_count, None);
        assert_eq!(records[1].health_percent, Some(80));
        assert_eq!(records[1].cycle_count, Some(7));
    }

    #[test]
    fn duplicate_instance_names_force_positional_fallback() {
        let dup = |value| {
            FieldRecord::new()
                .with(fields::INSTANCE_NAME, "BAT")
                .with(fields::FULL_CHARGED_CAPACITY, value)
        };
        let readings = SourceReadings {
            status: vec![status_row("BAT0", 1000), status_row("BAT1", 1000)],
            full_charge: vec![dup(4000u64), dup(2000u64)],
            design: Vec::new(),
            cycles: Vec::new(),
        };

        // duplicate keys in full_charge: join must fall back to position
        let records = correlate(&readings);
        assert_eq!(records[0].charge_percent, Some(25));
        assert_eq!(records[1].charge_percent, Some(50));
    }

    #[test]
    fn tag_join_used_when_names_are_missing() {
        let tagged = |tag: u64, field: &str, value: u64| {
            FieldRecord::new().with(fields::TAG, tag).with(field, value)
        };
        let readings = SourceReadings {
            status: vec![FieldRecord::new()
                .with(fields::TAG, 2u64)
                .with(fields::VOLTAGE, 11000u64)
                .with(fields::REMAINING_CAPACITY, 900u64)],
            full_charge: vec![
                tagged(1, fields::FULL_CHARGED_CAPACITY, 5000),
                tagged(2, fields::FULL_CHARGED_CAPACITY, 3600),
            ],
            design: vec![
                tagged(1, fields::DESIGNED_CAPACITY, 5000),
                tagged(2, fields::DESIGNED_CAPACITY, 4000),
            ],
            cycles: Vec::new(),
        };

        let records = correlate(&readings);
        assert_eq!(records[0].health_percent, Some(90));
        assert_eq!(records[0].charge_percent, Some(25));
    }

    #[test]
    fn positional_mode_ignores_surplus_capacity_rows() {
        let anon = |field: &str, value: u64| FieldRecord::new().with(field, value);
        let readings = SourceReadings {
            status: vec![FieldRecord::new()
                .with(fields::VOLTAGE, 11000u64)
                .with(fields::REMAINING_CAPACITY, 2000u64)],
            full_charge: vec![
                anon(fields::FULL_CHARGED_CAPACITY, 4000),
                anon(fields::FULL_CHARGED_CAPACITY, 9999),
            ],
            design: vec![anon(fields::DESIGNED_CAPACITY, 5000)],
            cycles: Vec::new(),
        };

        let records = correlate(&readings);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].health_percent, Some(80));
        assert_eq!(records[0].charge_percent, Some(50));
    }

    #[test]
    fn base_record_carries_status_fields_verbatim() {
        let row = FieldRecord::new()
            .with(fields::TAG, 3u64)
            .with(fields::INSTANCE_NAME, "ACPI\\PNP0C0A\\1_0")
            .with(fields::POWER_ONLINE, true)
            .with(fields::CHARGING, true)
            .with(fields::DISCHARGING, false)
            .with(fields::VOLTAGE, 12100u64)
            .with(fields::DISCHARGE_RATE, 0u64)
            .with(fields::CHARGE_RATE, 24000u64)
            .with(fields::REMAINING_CAPACITY, 31000u64)
            .with(fields::ACTIVE, true)
            .with(fields::CRITICAL, false);

        let readings = SourceReadings {
            status: vec![row],
            ..Default::default()
        };

        let record = &correlate(&readings)[0];
        assert_eq!(record.tag, Some(3));
        assert_eq!(record.instance_name.as_deref(), Some("ACPI\\PNP0C0A\\1_0"));
        assert!(record.power_online);
        assert!(record.charging);
        assert!(!record.discharging);
        assert_eq!(record.voltage_mv, 12100);
        assert_eq!(record.charge_rate_mw, 24000);
        assert_eq!(record.remaining_capacity_mwh, 31000);
        assert!(record.active);
        assert!(!record.critical);
    }
}
