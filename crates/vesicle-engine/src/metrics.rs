//! Per-invocation performance metrics.
//!
//! [`InvokeMetrics`] captures timing for a single group invocation. The
//! model keeps the metrics of the most recent successful invocation.

/// Timing collected during one `invoke_group` call.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InvokeMetrics {
    /// Wall-clock time for the whole invocation, in microseconds.
    pub total_us: u64,
    /// Per-member launch times: `(update name, microseconds)`.
    pub member_us: Vec<(String, u64)>,
    /// Time spent committing staged buffers to the store, in microseconds.
    pub commit_us: u64,
    /// Number of variables committed.
    pub committed_vars: usize,
}
