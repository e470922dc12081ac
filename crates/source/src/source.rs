use crate::{FieldRecord, SourceError};

/// A lazy, finite, non-restartable sequence of rows from one query.
pub type RecordStream<'a> = Box<dyn Iterator<Item = FieldRecord> + Send + 'a>;

/// Read access to a host's battery telemetry provider.
///
/// The four operations are idempotent reads with no side effects on host
/// state. Each returns one row per battery, in the order the provider
/// enumerates them; a provider must enumerate batteries in the same order
/// for all four queries. Rows should carry [`crate::fields::INSTANCE_NAME`]
/// (or [`crate::fields::TAG`]) wherever the platform exposes one, so results
/// can be joined by identity instead of position.
pub trait BatterySource {
    /// Rows exposing [`crate::fields::FULL_CHARGED_CAPACITY`] in mWh.
    fn full_charge_capacities(&self) -> Result<RecordStream<'_>, SourceError>;

    /// Rows exposing [`crate::fields::DESIGNED_CAPACITY`] in mWh.
    fn design_capacities(&self) -> Result<RecordStream<'_>, SourceError>;

    /// Rows exposing [`crate::fields::CYCLE_COUNT`].
    fn cycle_counts(&self) -> Result<RecordStream<'_>, SourceError>;

    /// Per-battery status rows, filtered to those reporting a positive
    /// voltage: tag, instance name, power-online, charging/discharging
    /// flags, voltage (mV), charge/discharge rates (mW), remaining capacity
    /// (mWh), active and critical flags.
    fn status(&self) -> Result<RecordStream<'_>, SourceError>;
}

impl<S: BatterySource + ?Sized> BatterySource for Box<S> {
    fn full_charge_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        (**self).full_charge_capacities()
    }

    fn design_capacities(&self) -> Result<RecordStream<'_>, SourceError> {
        (**self).design_capacities()
    }

    fn cycle_counts(&self) -> Result<RecordStream<'_>, SourceError> {
        (**self).cycle_counts()
    }

    fn status(&self) -> Result<RecordStream<'_>, SourceError> {
        (**self).status()
    }
}
