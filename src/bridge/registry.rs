use crate::{
    bridge::{poller::PollerHandle, stats::PackageStats},
    common::MAX_LOOKBACK_DAYS,
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

/// A bridged application: where its reviews go and how it is polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRegistration {
    /// Reverse-DNS name of the application on Play.
    pub package_name: String,
    /// Matrix room the application's reviews are bridged into.
    pub matrix_room_id: String,
    /// Cadence of the review poll timer.
    pub poll_interval: Duration,
    /// Upper bound on reviews inspected in a single poll, across pages.
    pub max_reviews_per_poll: usize,
    /// How far back the first poll looks. Capped at the upstream seven-day
    /// visibility window.
    pub lookback_days: u32,
}

impl ApplicationRegistration {
    /// Returns a new builder with the default polling configuration.
    pub fn builder(
        package_name: impl Into<String>,
        matrix_room_id: impl Into<String>,
    ) -> ApplicationRegistrationBuilder {
        ApplicationRegistrationBuilder {
            package_name: package_name.into(),
            matrix_room_id: matrix_room_id.into(),
            poll_interval: Duration::from_secs(300),
            max_reviews_per_poll: 100,
            lookback_days: MAX_LOOKBACK_DAYS,
        }
    }
}

/// Builder for an [`ApplicationRegistration`].
#[derive(Debug, Clone)]
pub struct ApplicationRegistrationBuilder {
    package_name: String,
    matrix_room_id: String,
    poll_interval: Duration,
    max_reviews_per_poll: usize,
    lookback_days: u32,
}

impl ApplicationRegistrationBuilder {
    /// Sets the cadence of the review poll timer.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the upper bound on reviews inspected in a single poll.
    pub fn with_max_reviews_per_poll(mut self, max_reviews_per_poll: usize) -> Self {
        self.max_reviews_per_poll = max_reviews_per_poll;
        self
    }

    /// Sets how far back the first poll looks. Values above seven days are
    /// capped: older reviews are invisible upstream anyway.
    pub fn with_lookback_days(mut self, lookback_days: u32) -> Self {
        self.lookback_days = lookback_days;
        self
    }

    /// Consumes the builder and builds the registration.
    pub fn build(self) -> ApplicationRegistration {
        ApplicationRegistration {
            package_name: self.package_name,
            matrix_room_id: self.matrix_room_id,
            poll_interval: self.poll_interval,
            max_reviews_per_poll: self.max_reviews_per_poll,
            lookback_days: self.lookback_days.min(MAX_LOOKBACK_DAYS),
        }
    }
}

/// Per-package engine state.
pub(crate) struct PackageEntry {
    pub(crate) registration: ApplicationRegistration,
    pub(crate) watermark: DateTime<Utc>,
    pub(crate) stats: PackageStats,
    pub(crate) poller: Option<PollerHandle>,
    /// Cleared on unregistration; the stats stay behind.
    pub(crate) active: bool,
}

/// Single registry for all per-package state.
///
/// Keeping registration, watermark, stats and the poller handle under one
/// lock removes cross-structure races during register/unregister. The lock is
/// never held across an await point.
pub(crate) struct Registry {
    inner: Mutex<HashMap<String, PackageEntry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn is_active(&self, package_name: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .get(package_name)
            .map_or(false, |entry| entry.active)
    }

    /// Registers (or re-registers) a package with fresh stats and the given
    /// initial watermark.
    pub(crate) fn insert(&self, registration: ApplicationRegistration, watermark: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        inner.insert(
            registration.package_name.clone(),
            PackageEntry {
                registration,
                watermark,
                stats: PackageStats::default(),
                poller: None,
                active: true,
            },
        );
    }

    pub(crate) fn set_poller(&self, package_name: &str, handle: PollerHandle) {
        if let Some(entry) = self.inner.lock().unwrap().get_mut(package_name) {
            entry.poller = Some(handle);
        }
    }

    /// Takes every running poller handle, leaving the registrations in place.
    pub(crate) fn take_all_pollers(&self) -> Vec<(String, PollerHandle)> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .iter_mut()
            .filter_map(|(package, entry)| {
                entry.poller.take().map(|handle| (package.clone(), handle))
            })
            .collect()
    }

    /// Marks a package inactive and takes its poller handle.
    ///
    /// Returns `None` if the package is not actively registered.
    pub(crate) fn deactivate(&self, package_name: &str) -> Option<Option<PollerHandle>> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.get_mut(package_name)?;
        if !entry.active {
            return None;
        }
        entry.active = false;
        Some(entry.poller.take())
    }

    pub(crate) fn registration_and_watermark(
        &self,
        package_name: &str,
    ) -> Option<(ApplicationRegistration, DateTime<Utc>)> {
        self.inner
            .lock()
            .unwrap()
            .get(package_name)
            .map(|entry| (entry.registration.clone(), entry.watermark))
    }

    pub(crate) fn advance_watermark(&self, package_name: &str, to: DateTime<Utc>) {
        if let Some(entry) = self.inner.lock().unwrap().get_mut(package_name) {
            entry.watermark = to;
        }
    }

    pub(crate) fn update_stats(
        &self,
        package_name: &str,
        update: impl FnOnce(&mut PackageStats),
    ) {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(package_name) {
            Some(entry) => update(&mut entry.stats),
            None => tracing::debug!(%package_name, "dropping stats update for unknown package"),
        }
    }

    /// Active registrations that currently have no running poller.
    pub(crate) fn active_without_poller(&self) -> Vec<ApplicationRegistration> {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.active && entry.poller.is_none())
            .map(|entry| entry.registration.clone())
            .collect()
    }

    pub(crate) fn snapshot_stats(&self) -> HashMap<String, PackageStats> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(package, entry)| (package.clone(), entry.stats.clone()))
            .collect()
    }
}
