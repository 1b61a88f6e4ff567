//! The bridge engine: per-package review pollers, the reply queue and the
//! supervisor that owns their lifecycles.
//!
//! Reviews flow inbound from Play through the pollers into the store and the
//! injected [`MatrixSink`]; replies flow outbound from
//! [`Supervisor::queue_reply`] through the reply queue back to Play, with a
//! final outcome notification per reply.

use crate::error::Error;
use std::{future::Future, time::Duration};

mod matrix;
mod poller;
mod registry;
mod reply_queue;
mod stats;
mod supervisor;

pub use matrix::{MatrixSink, SinkError};
pub use registry::{ApplicationRegistration, ApplicationRegistrationBuilder};
pub use reply_queue::PendingReply;
pub use stats::{PackageStats, StatsSnapshot};
pub use supervisor::{Supervisor, SupervisorBuilder};

/// Applies the caller-supplied deadline to a gateway call.
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Other(anyhow::anyhow!(
            "request deadline of {}ms exceeded",
            deadline.as_millis()
        ))),
    }
}
