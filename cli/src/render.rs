//! Plain-text rendering of a snapshot.
//!
//! One header with the machine name and capture time, then one key/value
//! block per battery with the raw status fields and units, and ASCII gauges
//! for the two derived percentages.

use std::fmt::Write;

use joule_snapshot::{BatteryRecord, Snapshot};

const GAUGE_WIDTH: usize = 20;

pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Machine Name: {}", snapshot.machine_name);
    let _ = writeln!(
        out,
        "Snapshot Time: {}",
        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out.push('\n');

    if !snapshot.has_battery_info() {
        out.push_str("No battery information available.\n");
        return out;
    }

    for (index, battery) in snapshot.batteries.iter().enumerate() {
        render_battery(&mut out, index, battery);
        out.push('\n');
    }

    out
}

fn render_battery(out: &mut String, index: usize, battery: &BatteryRecord) {
    let _ = writeln!(out, "Battery {}", index);
    let _ = writeln!(out, "-----------");

    if let Some(tag) = battery.tag {
        key_value(out, "Tag", &tag.to_string(), "");
    }
    if let Some(name) = &battery.instance_name {
        key_value(out, "Name", name, "");
    }
    key_value(out, "State", battery.charge_state().label(), "");
    key_value(out, "Power Online", yes_no(battery.power_online), "");
    key_value(out, "Discharging", yes_no(battery.discharging), "");
    key_value(out, "Charging", yes_no(battery.charging), "");
    key_value(out, "Voltage", &battery.voltage_mv.to_string(), "mV");
    key_value(
        out,
        "Discharge Rate",
        &battery.discharge_rate_mw.to_string(),
        "mW",
    );
    key_value(out, "Charge Rate", &battery.charge_rate_mw.to_string(), "mW");
    key_value(
        out,
        "Remaining Capacity",
        &battery.remaining_capacity_mwh.to_string(),
        "mWh",
    );
    key_value(out, "Active", yes_no(battery.active), "");
    key_value(out, "Critical", yes_no(battery.critical), "");

    if let Some(health) = battery.health_percent {
        let _ = writeln!(out, "Battery Health: {:>3}% {}", health, gauge(health));
    }
    if let Some(charge) = battery.charge_percent {
        let _ = writeln!(out, "Current Charge: {:>3}% {}", charge, gauge(charge));
    }
    if let Some(cycles) = battery.cycle_count {
        key_value(out, "Cycle Count", &cycles.to_string(), "");
    }
}

fn key_value(out: &mut String, key: &str, value: &str, unit: &str) {
    let _ = writeln!(out, "{}: {}{}", key, value, unit);
}

fn gauge(percent: u32) -> String {
    let filled = (percent.min(100) as usize * GAUGE_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(GAUGE_WIDTH - filled))
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}
