//! Durable index of the reviews the bridge has already seen.
//!
//! The store is what makes "we have not seen this review before" a
//! well-defined question: the upstream API only exposes a seven-day window,
//! so without persistent state every restart would re-announce old reviews.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

mod sqlite;

pub use sqlite::SqliteReviewStore;

/// A review sighting as remembered across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReview {
    pub review_id: String,
    pub package_name: String,
    pub last_modified_at: DateTime<Utc>,
    pub has_reply: bool,
}

/// Persistence seam for review sightings.
///
/// Implementations must support point reads, point writes and bulk iteration
/// by package. Entries are created on first sighting and overwritten on later
/// sightings; the engine never deletes them (retention is an external
/// concern).
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Looks up a single review by id.
    async fn get(&self, review_id: &str) -> Result<Option<StoredReview>, StoreError>;

    /// Creates or overwrites the entry for a review.
    async fn upsert(&self, entry: &StoredReview) -> Result<(), StoreError>;

    /// Returns every remembered review of a package.
    async fn for_package(&self, package_name: &str) -> Result<Vec<StoredReview>, StoreError>;
}

/// Failures raised by a [`ReviewStore`] backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage connection error: {0}")]
    Connection(String),
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for crate::Error {
    fn from(e: StoreError) -> Self {
        crate::Error::Other(e.into())
    }
}
