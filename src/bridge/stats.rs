use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Monotonic per-package counters maintained by the poller and the reply
/// drainer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageStats {
    /// Reviews inside the poll window that were inspected, including
    /// unchanged ones.
    pub total_processed: u64,
    /// Reviews seen for the first time.
    pub new_reviews: u64,
    /// Reviews re-seen with a strictly newer modification time.
    pub updated_reviews: u64,
    /// Developer replies accepted by the server.
    pub replies_sent: u64,
    /// Failed poll attempts, failed review dispatches and abandoned replies.
    pub errors: u64,
    /// When the last poll was attempted, successful or not.
    pub last_poll_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of the engine's counters.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// Counters per package, including packages that were unregistered.
    pub packages: HashMap<String, PackageStats>,
    /// Replies currently waiting for the next drain.
    pub reply_queue_depth: usize,
}
