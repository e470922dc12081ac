//! Refresh cycle driver: gather, correlate, publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use joule_source::{BatterySource, SourceError};
use sysinfo::System;
use thiserror::Error;
use tracing::{debug, warn};

use crate::aggregate::{correlate, SourceReadings};
use crate::types::Snapshot;

/// Upper bound on one provider round-trip (all four queries).
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A trigger arrived while a refresh was still running. The trigger is
    /// dropped, not queued; the caller retries on its next tick.
    #[error("refresh already in progress")]
    InFlight,
}

struct Published {
    snapshot: Snapshot,
    at: Instant,
}

/// Runs refresh cycles against a telemetry source and holds the latest
/// successfully published [`Snapshot`].
///
/// A refresh either completes and replaces the published snapshot wholesale,
/// or fails and leaves it untouched — readers never see a partial result.
pub struct RefreshEngine {
    source: Arc<dyn BatterySource + Send + Sync>,
    fetch_timeout: Duration,
    machine_name: String,
    in_flight: AtomicBool,
    published: RwLock<Option<Published>>,
}

impl RefreshEngine {
    pub fn new(source: Arc<dyn BatterySource + Send + Sync>) -> Self {
        Self::with_timeout(source, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(
        source: Arc<dyn BatterySource + Send + Sync>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            fetch_timeout,
            machine_name: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            in_flight: AtomicBool::new(false),
            published: RwLock::new(None),
        }
    }

    /// Runs one full refresh cycle: fetches the four result sets, correlates
    /// them, and publishes the snapshot. Returns the snapshot it published.
    pub fn refresh(&self) -> Result<Snapshot, RefreshError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("refresh trigger coalesced; previous cycle still running");
            return Err(RefreshError::InFlight);
        }

        let result = self.run_cycle();
        self.in_flight.store(false, Ordering::Release);
        result
    }

    /// Latest successfully published snapshot, if any refresh has succeeded.
    pub fn latest(&self) -> Option<Snapshot> {
        self.published
            .read()
            .expect("snapshot cell poisoned")
            .as_ref()
            .map(|p| p.snapshot.clone())
    }

    /// Age of the latest snapshot, for stale-vs-never-succeeded reporting.
    pub fn age(&self) -> Option<Duration> {
        self.published
            .read()
            .expect("snapshot cell poisoned")
            .as_ref()
            .map(|p| p.at.elapsed())
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    fn run_cycle(&self) -> Result<Snapshot, RefreshError> {
        let captured_at = Utc::now();
        let readings = self.gather()?;
        let batteries = correlate(&readings);

        let mut snapshot = Snapshot {
            machine_name: self.machine_name.clone(),
            captured_at,
            batteries,
        };
        self.publish(&mut snapshot);
        Ok(snapshot)
    }

    /// Runs the four queries on a worker thread so a stalled provider cannot
    /// wedge the refresh cycle past the timeout.
    fn gather(&self) -> Result<SourceReadings, SourceError> {
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        thread::spawn(move || {
            let _ = tx.send(SourceReadings::collect(source.as_ref()));
        });

        match rx.recv_timeout(self.fetch_timeout) {
            Ok(result) => result,
            Err(_) => {
                // The abandoned worker finishes into a closed channel.
                warn!(timeout = ?self.fetch_timeout, "telemetry queries timed out");
                Err(SourceError::Unavailable(format!(
                    "telemetry queries timed out after {:?}",
                    self.fetch_timeout
                )))
            }
        }
    }

    fn publish(&self, snapshot: &mut Snapshot) {
        let mut slot = self.published.write().expect("snapshot cell poisoned");

        if let Some(previous) = slot.as_ref() {
            // wall clock stepped backwards; keep capture times non-decreasing
            if snapshot.captured_at < previous.snapshot.captured_at {
                snapshot.captured_at = previous.snapshot.captured_at;
            }
        }

        *slot = Some(Published {
            snapshot: snapshot.clone(),
            at: Instant::now(),
        });
    }
}
