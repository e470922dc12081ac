use thiserror::Error;

/// Failures a telemetry query can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The provider is absent, unreachable, or timed out. Retryable on the
    /// next scheduled trigger.
    #[error("battery data source unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the query or returned output it should not
    /// have. Not recoverable without a code change.
    #[error("battery query failed: {0}")]
    Query(String),
}
