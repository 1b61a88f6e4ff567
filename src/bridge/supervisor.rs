use crate::{
    bridge::{
        matrix::MatrixSink,
        poller::{self, PollerContext},
        registry::{ApplicationRegistration, Registry},
        reply_queue::{self, DrainerContext, DrainerHandle, PendingReply, ReplyQueue},
        stats::StatsSnapshot,
        with_deadline,
    },
    client::PlayClient,
    common::MAX_LOOKBACK_DAYS,
    error::Error,
    store::ReviewStore,
};
use chrono::Utc;
use std::{
    fmt::{Debug, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// Lifecycle surface of the bridge engine.
///
/// The supervisor owns every timer in the engine: one poller per registered
/// package plus the reply drainer. All other components are driven by it.
///
/// ```rust,no_run
/// # use playbridge::{PlayClient, Supervisor, apis::auth::Credentials};
/// # use playbridge::bridge::{ApplicationRegistration, MatrixSink};
/// # use playbridge::store::SqliteReviewStore;
/// # use std::sync::Arc;
/// #
/// # async fn run(sink: Arc<dyn MatrixSink>) -> Result<(), playbridge::Error> {
/// let client = PlayClient::new(Credentials::RefreshToken {
///     client_id: "some-client-id".into(),
///     client_secret: "some-client-secret".to_string().into(),
///     refresh_token: "some-refresh-token".to_string().into(),
/// });
/// let store = Arc::new(SqliteReviewStore::connect("sqlite://reviews.db").await?);
///
/// let supervisor = Supervisor::builder(client, store, sink).build();
/// supervisor
///     .register(ApplicationRegistration::builder("com.example.app", "!reviews:example.org").build())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Supervisor {
    client: PlayClient,
    store: Arc<dyn ReviewStore>,
    sink: Arc<dyn MatrixSink>,
    registry: Arc<Registry>,
    queue: Arc<ReplyQueue>,
    drainer: Mutex<Option<DrainerHandle>>,
    paused: AtomicBool,
    request_timeout: Duration,
}

impl Supervisor {
    /// Returns a new builder to configure a [`Supervisor`].
    pub fn builder(
        client: PlayClient,
        store: Arc<dyn ReviewStore>,
        sink: Arc<dyn MatrixSink>,
    ) -> SupervisorBuilder {
        SupervisorBuilder {
            client,
            store,
            sink,
            drain_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Registers an application and starts polling its reviews.
    ///
    /// Credentials and package access are verified first; a failed probe
    /// aborts the registration with the underlying error. While the engine
    /// is paused the poller spawn is deferred to the next [`resume()`].
    ///
    /// [`resume()`]: Supervisor::resume
    pub async fn register(&self, registration: ApplicationRegistration) -> Result<(), Error> {
        if registration.package_name.is_empty() {
            return Err(Error::Validation("package name must not be empty".to_string()));
        }
        if registration.poll_interval.is_zero() {
            return Err(Error::Validation("poll interval must not be zero".to_string()));
        }
        if self.registry.is_active(&registration.package_name) {
            return Err(Error::Validation(format!(
                "package {} is already registered",
                registration.package_name
            )));
        }

        with_deadline(
            self.request_timeout,
            self.client
                .reviews
                .test_connection(&registration.package_name),
        )
        .await?;

        // Looking back further than the visibility window only wastes calls
        let lookback_days = registration.lookback_days.min(MAX_LOOKBACK_DAYS);
        let watermark = Utc::now() - chrono::Duration::days(i64::from(lookback_days));
        self.registry.insert(registration.clone(), watermark);

        if !self.paused.load(Ordering::SeqCst) {
            self.start_poller(&registration);
        }

        tracing::info!(
            package_name = %registration.package_name,
            matrix_room_id = %registration.matrix_room_id,
            "application registered"
        );
        Ok(())
    }

    /// Stops polling a package. Collected statistics are retained.
    pub async fn unregister(&self, package_name: &str) -> Result<(), Error> {
        match self.registry.deactivate(package_name) {
            None => Err(Error::Validation(format!(
                "package {} is not registered",
                package_name
            ))),
            Some(handle) => {
                if let Some(handle) = handle {
                    handle.stop().await;
                }
                tracing::info!(%package_name, "application unregistered");
                Ok(())
            }
        }
    }

    /// Stops all poll timers, e.g. for maintenance.
    ///
    /// Replies already queued keep draining while paused.
    pub async fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        for (package_name, handle) in self.registry.take_all_pollers() {
            handle.stop().await;
            tracing::debug!(%package_name, "poller paused");
        }
        tracing::info!("review polling paused");
    }

    /// Restarts polling for every registered package from its retained
    /// watermark.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        for registration in self.registry.active_without_poller() {
            self.start_poller(&registration);
        }
        tracing::info!("review polling resumed");
    }

    /// Returns a consistent view of all per-package counters plus the
    /// current reply queue depth.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            packages: self.registry.snapshot_stats(),
            reply_queue_depth: self.queue.depth(),
        }
    }

    /// Validates and enqueues a developer reply authored in Matrix.
    ///
    /// Non-blocking: the reply is attempted by the next drain pass, and its
    /// outcome is reported back to `origin_room_id` through the sink.
    pub fn queue_reply(
        &self,
        package_name: &str,
        review_id: &str,
        reply_text: &str,
        origin_event_id: &str,
        origin_room_id: &str,
        sender_id: &str,
    ) -> Result<(), Error> {
        if review_id.is_empty() {
            return Err(Error::Validation("review id must not be empty".to_string()));
        }
        if reply_text.trim().is_empty() {
            return Err(Error::Validation("reply text must not be empty".to_string()));
        }

        self.queue.enqueue(PendingReply {
            package_name: package_name.to_string(),
            review_id: review_id.to_string(),
            reply_text: reply_text.to_string(),
            origin_room_id: origin_room_id.to_string(),
            origin_event_id: origin_event_id.to_string(),
            sender_id: sender_id.to_string(),
            first_queued_at: Utc::now(),
            attempts: 0,
        });

        tracing::debug!(%package_name, %review_id, "reply queued");
        Ok(())
    }

    /// Stops all pollers, drains pending replies one final time and stops
    /// the drainer.
    pub async fn shutdown(&self) {
        self.pause().await;
        let drainer = self.drainer.lock().unwrap().take();
        if let Some(drainer) = drainer {
            drainer.stop().await;
        }
        tracing::info!("bridge engine stopped");
    }

    fn start_poller(&self, registration: &ApplicationRegistration) {
        let handle = poller::spawn(
            PollerContext {
                client: self.client.clone(),
                store: self.store.clone(),
                sink: self.sink.clone(),
                registry: self.registry.clone(),
                request_timeout: self.request_timeout,
            },
            registration.package_name.clone(),
            registration.poll_interval,
        );
        self.registry.set_poller(&registration.package_name, handle);
    }
}

impl Debug for Supervisor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("paused", &self.paused)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    client: PlayClient,
    store: Arc<dyn ReviewStore>,
    sink: Arc<dyn MatrixSink>,
    drain_interval: Duration,
    request_timeout: Duration,
}

impl SupervisorBuilder {
    /// Sets the cadence of the reply drainer. Mostly useful in tests.
    pub fn with_drain_interval(mut self, drain_interval: Duration) -> Self {
        self.drain_interval = drain_interval;
        self
    }

    /// Sets the per-call deadline applied to every gateway request.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Consumes the builder, starts the reply drainer and returns the
    /// supervisor.
    pub fn build(self) -> Supervisor {
        let registry = Arc::new(Registry::new());
        let queue = Arc::new(ReplyQueue::new());

        let drainer = reply_queue::spawn(
            DrainerContext {
                client: self.client.clone(),
                sink: self.sink.clone(),
                registry: registry.clone(),
                queue: queue.clone(),
                request_timeout: self.request_timeout,
            },
            self.drain_interval,
        );

        Supervisor {
            client: self.client,
            store: self.store,
            sink: self.sink,
            registry,
            queue,
            drainer: Mutex::new(Some(drainer)),
            paused: AtomicBool::new(false),
            request_timeout: self.request_timeout,
        }
    }
}

impl Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("drain_interval", &self.drain_interval)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
