//! Interfaces through which the engine talks to the Matrix side of the bridge.
//!
//! The engine never imports Matrix glue directly; the surrounding bridge
//! injects an implementation of [`MatrixSink`] at construction time. The
//! inverse direction (operators authoring replies in Matrix) enters through
//! [`Supervisor::queue_reply`](crate::bridge::Supervisor::queue_reply).

use async_trait::async_trait;

/// Downstream half of the bridge: everything the engine pushes towards Matrix.
#[async_trait]
pub trait MatrixSink: Send + Sync {
    /// Surfaces a new or updated review in the room bridged to its package.
    ///
    /// Failures are counted against the package and the review is skipped;
    /// they are never fatal to the poll.
    async fn deliver_review(&self, review_id: &str, package_name: &str) -> Result<(), SinkError>;

    /// Provisions the virtual user representing a reviewer.
    ///
    /// Idempotent; invoked once per review, on its first sighting.
    async fn ensure_virtual_user(
        &self,
        review_id: &str,
        author_name: &str,
    ) -> Result<(), SinkError>;

    /// Reports the final outcome of a queued reply to its origin room.
    ///
    /// Best-effort: failures are logged and never retried.
    async fn notify_reply_result(
        &self,
        origin_room_id: &str,
        success: bool,
        error_text: Option<&str>,
    ) -> Result<(), SinkError>;
}

/// Failure surfaced by a [`MatrixSink`] implementation.
#[derive(thiserror::Error, Debug)]
#[error("matrix sink error: {0}")]
pub struct SinkError(pub String);

impl From<SinkError> for crate::Error {
    fn from(e: SinkError) -> Self {
        crate::Error::Other(e.into())
    }
}
