//! Snapshot aggregation for joule.
//!
//! Correlates the four telemetry result sets from a
//! [`joule_source::BatterySource`] — status, full-charge capacity, design
//! capacity, cycle count — into one ordered, immutable [`Snapshot`], deriving
//! battery health and current charge percentages along the way.
//!
//! [`RefreshEngine`] wraps the aggregation in a refresh cycle: it guards
//! against overlapping triggers, bounds the provider round-trip with a
//! timeout, and atomically publishes each completed snapshot so readers
//! always see either the previous result or the new one, never a partial.

mod aggregate;
mod engine;
mod types;

pub use aggregate::{correlate, SourceReadings};
pub use engine::{RefreshEngine, RefreshError, DEFAULT_FETCH_TIMEOUT};
pub use types::{BatteryRecord, ChargeState, Snapshot};
