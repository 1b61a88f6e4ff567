use std::time::Duration;

// Default URLs
pub static DEFAULT_AUTH_URL: &str = "https://oauth2.googleapis.com";
pub static DEFAULT_API_URL: &str = "https://androidpublisher.googleapis.com";

/// Minimum spacing between any two outgoing calls from a single client.
pub(crate) const MIN_CALL_SPACING: Duration = Duration::from_millis(100);

/// Hold applied after a rate-limited response that carries no `Retry-After`.
pub(crate) const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// The server returns at most this many reviews per page.
pub(crate) const MAX_PAGE_SIZE: usize = 100;

/// Reviews older than this are invisible to both listing and replying.
pub(crate) const MAX_LOOKBACK_DAYS: u32 = 7;
