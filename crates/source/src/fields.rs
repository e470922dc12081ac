//! Canonical field names used across the four telemetry queries.
//!
//! Providers attach these names to the rows they build; the aggregator reads
//! them back. `INSTANCE_NAME` and `TAG` double as correlation keys when a
//! provider supplies them on every result kind.

pub const TAG: &str = "Tag";
pub const INSTANCE_NAME: &str = "InstanceName";

// Status query
pub const POWER_ONLINE: &str = "PowerOnline";
pub const DISCHARGING: &str = "Discharging";
pub const CHARGING: &str = "Charging";
pub const VOLTAGE: &str = "Voltage";
pub const DISCHARGE_RATE: &str = "DischargeRate";
pub const CHARGE_RATE: &str = "ChargeRate";
pub const REMAINING_CAPACITY: &str = "RemainingCapacity";
pub const ACTIVE: &str = "Active";
pub const CRITICAL: &str = "Critical";

// Capacity and wear queries
pub const FULL_CHARGED_CAPACITY: &str = "FullChargedCapacity";
pub const DESIGNED_CAPACITY: &str = "DesignedCapacity";
pub const CYCLE_COUNT: &str = "CycleCount";
