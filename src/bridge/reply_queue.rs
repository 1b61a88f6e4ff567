use crate::{
    bridge::{matrix::MatrixSink, registry::Registry, with_deadline},
    client::PlayClient,
    error::{Error, ErrorKind},
};
use chrono::{DateTime, Utc};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

/// A reply is attempted at most this many times: one initial try plus three
/// retries.
pub(crate) const MAX_REPLY_ATTEMPTS: u32 = 4;

/// A developer reply waiting to be posted to Play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub package_name: String,
    pub review_id: String,
    pub reply_text: String,
    pub origin_room_id: String,
    pub origin_event_id: String,
    pub sender_id: String,
    pub first_queued_at: DateTime<Utc>,
    /// Failed dispatches so far. The reply is abandoned at
    /// [`MAX_REPLY_ATTEMPTS`].
    pub attempts: u32,
}

/// Process-wide FIFO of pending replies.
///
/// Deliberately volatile: a crash forfeits unsent replies, and the operator
/// re-issues the Matrix message. Persisting the queue would buy an
/// exactly-once posting problem the upstream API offers no help with.
pub(crate) struct ReplyQueue {
    entries: Mutex<VecDeque<PendingReply>>,
    /// Earliest instant any entry may next reach the gateway. Set from 429
    /// retry hints and shared by the whole queue.
    hold_until: Mutex<Option<Instant>>,
}

impl ReplyQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            hold_until: Mutex::new(None),
        }
    }

    pub(crate) fn enqueue(&self, reply: PendingReply) {
        self.entries.lock().unwrap().push_back(reply);
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Atomically empties the queue into a local batch.
    fn snapshot(&self) -> VecDeque<PendingReply> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    /// Hands an unprocessed remainder back, ahead of anything enqueued since.
    fn requeue_front(&self, remainder: VecDeque<PendingReply>) {
        let mut entries = self.entries.lock().unwrap();
        for reply in remainder.into_iter().rev() {
            entries.push_front(reply);
        }
    }

    fn hold(&self) -> Option<Instant> {
        *self.hold_until.lock().unwrap()
    }

    fn set_hold(&self, until: Instant) {
        let mut hold = self.hold_until.lock().unwrap();
        if hold.map_or(true, |current| until > current) {
            *hold = Some(until);
        }
    }
}

/// Shared dependencies of the drainer task.
#[derive(Clone)]
pub(crate) struct DrainerContext {
    pub(crate) client: PlayClient,
    pub(crate) sink: Arc<dyn MatrixSink>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) queue: Arc<ReplyQueue>,
    pub(crate) request_timeout: Duration,
}

/// Handle to the running drainer task.
pub(crate) struct DrainerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DrainerHandle {
    /// Signals shutdown and waits for the final drain pass to finish.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "reply drainer did not shut down cleanly");
        }
    }
}

/// Starts the periodic drainer task.
pub(crate) fn spawn(ctx: DrainerContext, drain_interval: Duration) -> DrainerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(drain_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }
            drain_pass(&ctx, Some(&shutdown_rx)).await;
        }

        // Replies queued moments before shutdown still get one attempt.
        drain_pass(&ctx, None).await;
        tracing::debug!("reply drainer stopped");
    });

    DrainerHandle {
        shutdown: shutdown_tx,
        task,
    }
}

/// Processes one snapshot of the queue, entry by entry.
///
/// Cancellation is observed between entries, never mid-entry; a cancelled
/// pass hands the unprocessed remainder back to the queue in order, where
/// the final shutdown pass picks it up.
async fn drain_pass(ctx: &DrainerContext, cancel: Option<&watch::Receiver<bool>>) {
    let mut batch = ctx.queue.snapshot();
    if batch.is_empty() {
        return;
    }

    tracing::debug!(batch_size = batch.len(), "draining pending replies");

    while let Some(reply) = batch.pop_front() {
        if cancel.map_or(false, |rx| *rx.borrow()) {
            batch.push_front(reply);
            ctx.queue.requeue_front(batch);
            return;
        }
        process_reply(ctx, reply).await;
    }
}

/// Attempts one reply and settles its fate: success notification, another
/// round in the queue, or abandonment with a failure notification.
async fn process_reply(ctx: &DrainerContext, mut reply: PendingReply) {
    // Honor a pending rate-limit hold before touching the gateway.
    if let Some(until) = ctx.queue.hold() {
        let now = Instant::now();
        if until > now {
            tokio::time::sleep(until - now).await;
        }
    }

    let outcome = with_deadline(
        ctx.request_timeout,
        ctx.client
            .reviews
            .reply(&reply.package_name, &reply.review_id, &reply.reply_text),
    )
    .await;

    match outcome {
        Ok(()) => {
            ctx.registry
                .update_stats(&reply.package_name, |stats| stats.replies_sent += 1);
            tracing::info!(
                review_id = %reply.review_id,
                package_name = %reply.package_name,
                "developer reply posted"
            );
            notify(ctx, &reply.origin_room_id, true, None).await;
        }
        Err(err) => {
            reply.attempts += 1;

            if let Error::ApiError(api_error) = &err {
                if let Some(retry_after) = api_error.retry_after {
                    ctx.queue.set_hold(Instant::now() + retry_after);
                }
            }

            // A vanished review cannot be replied to; don't burn retries on it.
            let budget = match err.kind() {
                ErrorKind::NotFound | ErrorKind::Validation => 1,
                _ => MAX_REPLY_ATTEMPTS,
            };

            if reply.attempts < budget {
                tracing::debug!(
                    review_id = %reply.review_id,
                    attempts = reply.attempts,
                    error = %err,
                    "reply failed; queued for retry"
                );
                reply.first_queued_at = Utc::now();
                ctx.queue.enqueue(reply);
            } else {
                tracing::warn!(
                    review_id = %reply.review_id,
                    attempts = reply.attempts,
                    error = %err,
                    "reply abandoned"
                );
                ctx.registry
                    .update_stats(&reply.package_name, |stats| stats.errors += 1);
                let error_text = format!("{}: {}", err.kind(), err);
                notify(ctx, &reply.origin_room_id, false, Some(&error_text)).await;
            }
        }
    }
}

async fn notify(ctx: &DrainerContext, origin_room_id: &str, success: bool, error_text: Option<&str>) {
    if let Err(err) = ctx
        .sink
        .notify_reply_result(origin_room_id, success, error_text)
        .await
    {
        tracing::warn!(
            %origin_room_id,
            error = %err,
            "failed to report reply outcome to Matrix"
        );
    }
}
