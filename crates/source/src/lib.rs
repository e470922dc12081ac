//! Battery telemetry sources for joule.
//!
//! A source answers four read-only queries against the host's battery
//! provider — status, full-charge capacity, design capacity, and cycle
//! count — each as an ordered stream of [`FieldRecord`] rows, one row per
//! battery. The aggregator in `joule-snapshot` correlates the four result
//! sets into a single snapshot; this crate only knows how to fetch them.
//!
//! # Example
//!
//! ```ignore
//! use joule_source::{system_source, BatterySource};
//!
//! let source = system_source()?;
//! for row in source.status()? {
//!     println!("{:?}", row);
//! }
//! ```

mod error;
mod record;
mod source;

pub mod fields;

pub use error::SourceError;
pub use record::{FieldRecord, FieldValue};
pub use source::{BatterySource, RecordStream};

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

/// Returns the battery telemetry source for the current platform.
pub fn system_source() -> Result<Box<dyn BatterySource + Send + Sync>, SourceError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::SysfsSource::new()?))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::IoregSource::new()))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::CimSource::new()))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(SourceError::Unavailable(
            "no battery telemetry source for this platform".to_string(),
        ))
    }
}
