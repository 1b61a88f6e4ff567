use crate::{
    apis::reviews::Review,
    bridge::{
        matrix::MatrixSink,
        registry::{ApplicationRegistration, Registry},
        with_deadline,
    },
    client::PlayClient,
    common::MAX_PAGE_SIZE,
    error::{Error, ErrorKind},
    store::{ReviewStore, StoredReview},
};
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

/// Shared dependencies of every poller task.
#[derive(Clone)]
pub(crate) struct PollerContext {
    pub(crate) client: PlayClient,
    pub(crate) store: Arc<dyn ReviewStore>,
    pub(crate) sink: Arc<dyn MatrixSink>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) request_timeout: Duration,
}

/// Handle to a running poller task.
pub(crate) struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signals shutdown and waits for the current tick, if any, to finish.
    ///
    /// Cancellation is cooperative: an in-flight gateway call completes (or
    /// hits its deadline) and the task exits without advancing the watermark.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "poller task did not shut down cleanly");
        }
    }
}

/// Starts the periodic poll task for one registered package.
pub(crate) fn spawn(
    ctx: PollerContext,
    package_name: String,
    poll_interval: Duration,
) -> PollerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        // The first tick fires immediately. A tick that lands while the
        // previous one is still running is coalesced, never overlapped.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }
            if let Err(err) = poll_tick(&ctx, &package_name, &shutdown_rx).await {
                tracing::warn!(%package_name, error = %err, "review poll failed");
            }
        }

        tracing::debug!(%package_name, "poller stopped");
    });

    PollerHandle {
        shutdown: shutdown_tx,
        task,
    }
}

/// A single poll: fetch the window since the watermark, classify every
/// review against the store and dispatch new/updated ones to Matrix.
async fn poll_tick(
    ctx: &PollerContext,
    package_name: &str,
    shutdown: &watch::Receiver<bool>,
) -> Result<(), Error> {
    let tick_start = Utc::now();
    let (registration, watermark) = match ctx.registry.registration_and_watermark(package_name) {
        Some(state) => state,
        None => return Ok(()),
    };

    ctx.registry
        .update_stats(package_name, |stats| stats.last_poll_at = Some(tick_start));

    let window = match fetch_window(ctx, &registration, watermark).await {
        Ok(window) => window,
        Err(err) => {
            // Rate limits are absorbed: the next tick simply retries.
            if err.kind() != ErrorKind::RateLimit {
                ctx.registry
                    .update_stats(package_name, |stats| stats.errors += 1);
            }
            // The watermark stays put so the next tick re-covers this window.
            return Err(err);
        }
    };

    let mut processed = 0u64;
    let mut new_reviews = 0u64;
    let mut updated_reviews = 0u64;
    let mut errors = 0u64;
    let mut cancelled = false;

    for review in &window {
        if *shutdown.borrow() {
            cancelled = true;
            break;
        }
        processed += 1;
        match process_review(ctx, review).await {
            Ok(Classification::New) => new_reviews += 1,
            Ok(Classification::Updated) => updated_reviews += 1,
            Ok(Classification::Unchanged) => {}
            // A failed dispatch only aborts this review; the poll continues.
            Err(err) => {
                errors += 1;
                tracing::warn!(
                    %package_name,
                    review_id = %review.review_id,
                    error = %err,
                    "failed to dispatch review"
                );
            }
        }
    }

    ctx.registry.update_stats(package_name, |stats| {
        stats.total_processed += processed;
        stats.new_reviews += new_reviews;
        stats.updated_reviews += updated_reviews;
        stats.errors += errors;
    });

    if cancelled || *shutdown.borrow() {
        return Ok(());
    }

    // Advance to the poll's start time, not its end: reviews modified while
    // the poll was running must be re-covered by the next tick.
    ctx.registry.advance_watermark(package_name, tick_start);
    Ok(())
}

/// Walks review pages newest-first until the window is exhausted.
///
/// Pages are ordered by modification time, so the first review older than
/// the watermark proves no further matches exist. The comparison keeping
/// reviews is closed (`>=`): second-granularity timestamps can coincide
/// exactly with the previous tick's start.
async fn fetch_window(
    ctx: &PollerContext,
    registration: &ApplicationRegistration,
    watermark: DateTime<Utc>,
) -> Result<Vec<Review>, Error> {
    let mut collected: Vec<Review> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let remaining = registration
            .max_reviews_per_poll
            .saturating_sub(collected.len());
        if remaining == 0 {
            break;
        }

        let page = with_deadline(
            ctx.request_timeout,
            ctx.client.reviews.list(
                &registration.package_name,
                remaining.min(MAX_PAGE_SIZE),
                page_token.as_deref(),
                None,
            ),
        )
        .await?;

        let mut crossed_watermark = false;
        for review in page.reviews {
            if review.review_id.is_empty() {
                tracing::warn!(
                    package_name = %registration.package_name,
                    "dropping review with an empty id"
                );
                continue;
            }
            if review.last_modified_at < watermark {
                crossed_watermark = true;
                continue;
            }
            if collected.len() < registration.max_reviews_per_poll {
                collected.push(review);
            }
        }

        if crossed_watermark {
            break;
        }
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(collected)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    New,
    Updated,
    Unchanged,
}

fn classify(stored: Option<&StoredReview>, incoming: &Review) -> Classification {
    match stored {
        None => Classification::New,
        Some(known) if known.last_modified_at < incoming.last_modified_at => {
            Classification::Updated
        }
        Some(_) => Classification::Unchanged,
    }
}

/// Classifies one review and, when it is new or updated, records it and
/// hands it to the Matrix side.
async fn process_review(ctx: &PollerContext, review: &Review) -> Result<Classification, Error> {
    let stored = ctx.store.get(&review.review_id).await?;
    let classification = classify(stored.as_ref(), review);

    if classification == Classification::Unchanged {
        return Ok(Classification::Unchanged);
    }

    ctx.store
        .upsert(&StoredReview {
            review_id: review.review_id.clone(),
            package_name: review.package_name.clone(),
            last_modified_at: review.last_modified_at,
            has_reply: review.has_reply,
        })
        .await?;

    if classification == Classification::New {
        // The virtual reviewer identity must exist before its first message.
        ctx.sink
            .ensure_virtual_user(&review.review_id, &review.author_name)
            .await?;
    }

    ctx.sink
        .deliver_review(&review.review_id, &review.package_name)
        .await?;

    tracing::debug!(
        review_id = %review.review_id,
        package_name = %review.package_name,
        ?classification,
        "review dispatched"
    );

    Ok(classification)
}
