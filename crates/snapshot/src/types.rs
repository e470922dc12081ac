//! Aggregated snapshot types handed to renderers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Charging state derived from a record's status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    /// Battery is actively charging
    Charging,
    /// Battery is discharging (on battery power)
    Discharging,
    /// External power connected but the battery is neither charging nor
    /// discharging
    Idle,
    /// State cannot be determined
    #[default]
    Unknown,
}

impl ChargeState {
    /// Returns a human-readable label for the charge state.
    pub fn label(&self) -> &'static str {
        match self {
            ChargeState::Charging => "Charging",
            ChargeState::Discharging => "On Battery",
            ChargeState::Idle => "Idle",
            ChargeState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One battery's slice of a snapshot: the status fields verbatim plus the
/// derived metrics, which are absent when their inputs are unknown or would
/// divide by zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BatteryRecord {
    pub tag: Option<u32>,
    pub instance_name: Option<String>,
    pub power_online: bool,
    pub discharging: bool,
    pub charging: bool,
    pub voltage_mv: u64,
    pub discharge_rate_mw: u64,
    pub charge_rate_mw: u64,
    pub remaining_capacity_mwh: u64,
    pub active: bool,
    pub critical: bool,

    /// `100 * full_charge / design`, truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_percent: Option<u32>,

    /// `100 * remaining / full_charge`, truncated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_percent: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<u32>,
}

impl BatteryRecord {
    pub fn charge_state(&self) -> ChargeState {
        if self.charging {
            ChargeState::Charging
        } else if self.discharging {
            ChargeState::Discharging
        } else if self.power_online {
            ChargeState::Idle
        } else {
            ChargeState::Unknown
        }
    }
}

/// The immutable result of one refresh cycle.
///
/// Batteries appear in status-query order. A snapshot with an empty battery
/// list means the host reported no batteries — a failed refresh never
/// produces a snapshot at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub machine_name: String,
    pub captured_at: DateTime<Utc>,
    pub batteries: Vec<BatteryRecord>,
}

impl Snapshot {
    /// False when the status query returned no rows ("no battery
    /// information available").
    pub fn has_battery_info(&self) -> bool {
        !self.batteries.is_empty()
    }
}
