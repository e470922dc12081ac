//! Battery telemetry from the kernel's power-supply class.
//!
//! Each directory under `/sys/class/power_supply` whose `type` file reads
//! `Battery` is one battery; its attribute files hold µ-unit values that the
//! provider converts to the milli-units the record streams carry. Batteries
//! reporting charge in µAh instead of energy in µWh are converted through
//! their design voltage.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fields;
use crate::{BatterySource, FieldRecord, RecordStream, SourceError};

const POWER_SUPPLY_PATH: &str = "/sys/class/power_supply";

#[derive(Debug)]
pub struct SysfsSource {
    root: PathBuf,
}

impl SysfsSource {
    pub fn new() -> Result<Self, SourceError> {
        Self::at(POWER_SUPPLY_PATH)
    }

    /// Provider rooted at an arbitrary directory laid out like the
    /// power-supply class.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "{} not present",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Battery directories in a stable order, so all four queries enumerate
    /// rows identically.
    fn battery_dirs(&self) -> Result<Vec<PathBuf>, SourceError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            SourceError::Unavailable(format!("cannot read {}: {}", self.root.display(), e))
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Query(e.to_string()))?;
            let path = entry.path();
            if read_trimmed(&path.join("type")).as_deref() == Some("Battery") {
                dirs.push(path);
            }
        }
        dirs.sort();

        debug!(count = dirs.len(), "enumerated sysfs batteries");
        Ok(dirs)
    }

    fn capacity_rows(
        &self,
        energy_file: &'static str,
        charge_file: &'static str,
        field: &'static str,
    ) -> Result<RecordStream<'_>, SourceError> {
        let rows: Vec<FieldRecord> = self
            .battery_dirs()?
            .into_iter()
            .filter_map(|dir| {
                let mwh = read_energy_mwh(&dir, energy_file, charge_file)?;
                Some(
                    FieldRecord::new()
                        .with(fields::INSTANCE_NAME, dir_name(&dir))
                        .with(field, mwh),
                )
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }
}

impl BatterySource for SysfsSource {
    fn full_charge_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        self.capacity_rows("energy_full", "charge_full", fields::FULL_CHARGED_CAPACITY)
    }

    fn design_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        self.capacity_rows(
            "energy_full_design",
            "charge_full_design",
            fields::DESIGNED_CAPACITY,
        )
    }

    fn cycle_counts(&self) -> Result<RecordStream<'_>, SourceError> {
        let rows: Vec<FieldRecord> = self
            .battery_dirs()?
            .into_iter()
            .filter_map(|dir| {
                let cycles = read_u64(&dir.join("cycle_count"))?;
                Some(
                    FieldRecord::new()
                        .with(fields::INSTANCE_NAME, dir_name(&dir))
                        .with(fields::CYCLE_COUNT, cycles),
                )
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn status(&self) -> Result<RecordStream<'_>, SourceError> {
        let ac_online = mains_online(&self.root);
        let rows: Vec<FieldRecord> = self
            .battery_dirs()?
            .into_iter()
            .filter_map(|dir| {
                let row = status_row(&dir, ac_online);
                // rows without a live voltage reading are dropped
                (row.uint(fields::VOLTAGE).unwrap_or(0) > 0).then_some(row)
            })
            .collect();
        Ok(Box::new(rows.into_iter()))
    }
}

fn status_row(dir: &Path, ac_online: bool) -> FieldRecord {
    let state = read_trimmed(&dir.join("status")).unwrap_or_default();
    let charging = state.eq_ignore_ascii_case("Charging");
    let discharging = state.eq_ignore_ascii_case("Discharging");

    let voltage_mv = read_u64(&dir.join("voltage_now")).unwrap_or(0) / 1000;
    let rate_mw = read_u64(&dir.join("power_now"))
        .map(|uw| uw / 1000)
        .or_else(|| {
            // µA fallback for batteries that only expose current
            let ua = read_u64(&dir.join("current_now"))?;
            Some(ua / 1000 * voltage_mv / 1000)
        })
        .unwrap_or(0);

    let remaining_mwh = read_energy_mwh(dir, "energy_now", "charge_now").unwrap_or(0);

    let present = read_trimmed(&dir.join("present"))
        .map(|v| v == "1")
        .unwrap_or(true);
    let critical = read_trimmed(&dir.join("capacity_level"))
        .map(|v| v.eq_ignore_ascii_case("Critical"))
        .unwrap_or(false);

    FieldRecord::new()
        .with(fields::INSTANCE_NAME, dir_name(dir))
        .with(fields::POWER_ONLINE, ac_online)
        .with(fields::CHARGING, charging)
        .with(fields::DISCHARGING, discharging)
        .with(fields::VOLTAGE, voltage_mv)
        .with(fields::DISCHARGE_RATE, if discharging { rate_mw } else { 0u64 })
        .with(fields::CHARGE_RATE, if charging { rate_mw } else { 0u64 })
        .with(fields::REMAINING_CAPACITY, remaining_mwh)
        .with(fields::ACTIVE, present)
        .with(fields::CRITICAL, critical)
}

/// Energy in mWh, from the µWh file when present, else from the matching
/// µAh file scaled by design voltage.
fn read_energy_mwh(dir: &Path, energy_file: &str, charge_file: &str) -> Option<u64> {
    if let Some(uwh) = read_u64(&dir.join(energy_file)) {
        return Some(uwh / 1000);
    }

    let uah = read_u64(&dir.join(charge_file))?;
    let uv = read_u64(&dir.join("voltage_min_design"))
        .or_else(|| read_u64(&dir.join("voltage_now")))?;
    Some(uah.saturating_mul(uv) / 1_000_000_000)
}

fn mains_online(root: &Path) -> bool {
    let Ok(entries) = fs::read_dir(root) else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if read_trimmed(&path.join("type")).as_deref() == Some("Mains")
            && read_trimmed(&path.join("online")).as_deref() == Some("1")
        {
            return true;
        }
    }
    false
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_u64(path: &Path) -> Option<u64> {
    read_trimmed(path)?.parse().ok()
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Fixture {
        root: PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "joule-sysfs-{}-{}",
                name,
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        fn supply(&self, name: &str, kind: &str, files: &[(&str, &str)]) {
            let dir = self.root.join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("type"), format!("{}\n", kind)).unwrap();
            for (file, contents) in files {
                fs::write(dir.join(file), format!("{}\n", contents)).unwrap();
            }
        }

        fn source(&self) -> SysfsSource {
            SysfsSource::at(&self.root).unwrap()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn missing_root_is_unavailable() {
        let err = SysfsSource::at("/nonexistent/joule-test-root").unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[test]
    fn only_battery_directories_are_enumerated() {
        let fx = Fixture::new("enumerate");
        fx.supply("AC", "Mains", &[("online", "1")]);
        fx.supply("BAT0", "Battery", &[("energy_full", "50000000")]);
        fx.supply("BAT1", "Battery", &[("energy_full", "48000000")]);

        let rows: Vec<_> = fx.source().full_charge_capacities().unwrap().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(fields::INSTANCE_NAME), Some("BAT0"));
        assert_eq!(rows[0].uint(fields::FULL_CHARGED_CAPACITY), Some(50000));
        assert_eq!(rows[1].text(fields::INSTANCE_NAME), Some("BAT1"));
    }

    #[test]
    fn status_row_converts_micro_units_and_reads_flags() {
        let fx = Fixture::new("status");
        fx.supply("AC", "Mains", &[("online", "1")]);
        fx.supply(
            "BAT0",
            "Battery",
            &[
                ("status", "Charging"),
                ("voltage_now", "11400000"),
                ("power_now", "24500000"),
                ("energy_now", "31000000"),
                ("present", "1"),
                ("capacity_level", "Normal"),
            ],
        );

        let rows: Vec<_> = fx.source().status().unwrap().collect();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.uint(fields::VOLTAGE), Some(11400));
        assert_eq!(row.uint(fields::CHARGE_RATE), Some(24500));
        assert_eq!(row.uint(fields::DISCHARGE_RATE), Some(0));
        assert_eq!(row.uint(fields::REMAINING_CAPACITY), Some(31000));
        assert_eq!(row.boolean(fields::CHARGING), Some(true));
        assert_eq!(row.boolean(fields::DISCHARGING), Some(false));
        assert_eq!(row.boolean(fields::POWER_ONLINE), Some(true));
        assert_eq!(row.boolean(fields::ACTIVE), Some(true));
        assert_eq!(row.boolean(fields::CRITICAL), Some(false));
    }

    #[test]
    fn zero_voltage_batteries_are_filtered_from_status() {
        let fx = Fixture::new("novolt");
        fx.supply(
            "BAT0",
            "Battery",
            &[("status", "Discharging"), ("voltage_now", "0")],
        );

        let rows: Vec<_> = fx.source().status().unwrap().collect();
        assert!(rows.is_empty());
    }

    #[test]
    fn charge_units_fall_back_through_design_voltage() {
        let fx = Fixture::new("charge");
        // 4,200,000 µAh at 11.1 V design => 46,620 mWh
        fx.supply(
            "BAT0",
            "Battery",
            &[
                ("charge_full", "4200000"),
                ("voltage_min_design", "11100000"),
            ],
        );

        let rows: Vec<_> = fx.source().full_charge_capacities().unwrap().collect();
        assert_eq!(rows[0].uint(fields::FULL_CHARGED_CAPACITY), Some(46620));
    }

    #[test]
    fn batteries_without_cycle_data_are_skipped() {
        let fx = Fixture::new("cycles");
        fx.supply("BAT0", "Battery", &[]);
        fx.supply("BAT1", "Battery", &[("cycle_count", "312")]);

        let rows: Vec<_> = fx.source().cycle_counts().unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(fields::INSTANCE_NAME), Some("BAT1"));
        assert_eq!(rows[0].uint(fields::CYCLE_COUNT), Some(312));
    }
}
