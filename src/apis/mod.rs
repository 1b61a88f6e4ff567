//! Clients for the Google Play Android Publisher APIs.

use crate::{
    authenticator::Authenticator,
    client::Environment,
    error::{ApiError, Error, ErrorKind},
};
use reqwest_middleware::ClientWithMiddleware;
use std::{
    fmt::{Debug, Formatter},
    sync::atomic::{AtomicBool, Ordering},
};

pub mod auth;
pub mod reviews;

pub(crate) struct PlayClientInner {
    pub(crate) client: ClientWithMiddleware,
    pub(crate) authenticator: Authenticator,
    pub(crate) environment: Environment,
    /// Cleared when an authentication failure is observed. While unready,
    /// every call fails fast instead of hammering the server with doomed
    /// credentials.
    ready: AtomicBool,
}

impl PlayClientInner {
    pub(crate) fn new(
        client: ClientWithMiddleware,
        authenticator: Authenticator,
        environment: Environment,
    ) -> Self {
        Self {
            client,
            authenticator,
            environment,
            ready: AtomicBool::new(true),
        }
    }

    /// Fails fast once an authentication failure has latched the client unready.
    pub(crate) fn ensure_ready(&self) -> Result<(), Error> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(Error::ApiError(ApiError::unready()));
        }
        Ok(())
    }

    /// Records the outcome of a call: an authentication failure marks the
    /// whole client unready until it is re-initialized.
    pub(crate) fn observe<T>(&self, res: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &res {
            if err.kind() == ErrorKind::Auth {
                self.ready.store(false, Ordering::SeqCst);
                tracing::warn!(error = %err, "authentication failure; marking Play client unready");
            }
        }
        res
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_readiness(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

impl Debug for PlayClientInner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayClientInner")
            .field("environment", &self.environment)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}
