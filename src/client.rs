//! Module containing the main Google Play API client.
//! This is where the main [`PlayClient`](crate::client::PlayClient) is.

use crate::{
    apis::{auth::AuthApi, auth::Credentials, reviews::ReviewsApi, PlayClientInner},
    authenticator::Authenticator,
    common::{DEFAULT_API_URL, DEFAULT_AUTH_URL, MIN_CALL_SPACING},
    middlewares::{
        authentication::AuthenticationMiddleware,
        error_handling::ErrorHandlingMiddleware,
        inject_user_agent::InjectUserAgentMiddleware,
        rate_floor::RateFloorMiddleware,
        retry_idempotent::{DynRetryPolicy, RetryIdempotentMiddleware},
    },
};
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryPolicy};
use reqwest_tracing::TracingMiddleware;
use std::{sync::Arc, time::Duration};

/// Client for the Google Play Android Publisher APIs.
///
/// ## Authentication
///
/// All Android Publisher endpoints require authentication, and for that
/// reason a valid set of [`Credentials`] must be provided when building a new
/// client.
///
/// On the first request, the client automatically issues another request to
/// Google's OAuth2 token endpoint to exchange the provided [`Credentials`]
/// for an access token and caches the received token until shortly before it
/// expires. All subsequent requests reuse the cached token without contacting
/// the token endpoint again.
///
/// An authentication failure observed on any call latches the client
/// **unready**: every subsequent call fails fast with an authentication error
/// until [`reset_readiness()`] is called (or a new client is built with fixed
/// credentials). This stops a misconfigured bridge from hammering the API
/// with doomed requests.
///
/// ## Automatic retries and rate discipline
///
/// In case of a transient failure the client automatically retries the
/// request a few times before giving up, **only if the request was
/// idempotent** (see [RFC 7231]). Replies are `POST`s and are therefore never
/// retried at this level; their retry budget belongs to the reply queue.
///
/// Independently of retries, a client instance never sends two requests less
/// than 100 ms apart. This is a client-side floor on the call rate, not a
/// substitute for handling 429 responses.
///
/// To change the retry policy (or to disable automatic retries entirely), use
/// [`with_retry_policy()`] when building a new client.
///
/// [`Credentials`]: crate::apis::auth::Credentials
/// [`reset_readiness()`]: crate::client::PlayClient::reset_readiness
/// [`with_retry_policy()`]: crate::client::PlayClientBuilder::with_retry_policy
/// [RFC 7231]: https://datatracker.ietf.org/doc/html/rfc7231#section-4.2.2
#[derive(Debug, Clone)]
pub struct PlayClient {
    /// Authentication APIs client.
    pub auth: AuthApi,
    /// Reviews APIs client.
    pub reviews: ReviewsApi,
    inner: Arc<PlayClientInner>,
}

impl PlayClient {
    /// Builds a new [`PlayClient`](crate::client::PlayClient) with the default configuration.
    pub fn new(credentials: Credentials) -> PlayClient {
        PlayClientBuilder::new(credentials).build()
    }

    /// Returns a new builder to configure a new [`PlayClient`](crate::client::PlayClient).
    pub fn builder(credentials: Credentials) -> PlayClientBuilder {
        PlayClientBuilder::new(credentials)
    }

    /// Returns `false` once an authentication failure has latched this client
    /// unready.
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    /// Clears the unready latch, allowing calls to reach the server again.
    ///
    /// Meant to be called after the underlying credential problem has been
    /// fixed (for example after rotating a revoked refresh token).
    pub fn reset_readiness(&self) {
        self.inner.reset_readiness();
    }
}

/// Builder for a [`PlayClient`](crate::client::PlayClient).
#[derive(Debug)]
pub struct PlayClientBuilder {
    client: reqwest::Client,
    retry_policy: Option<DynRetryPolicy>,
    environment: Environment,
    credentials: Credentials,
    min_call_spacing: Duration,
}

impl PlayClientBuilder {
    /// Creates a new builder to configure a [`PlayClient`](crate::client::PlayClient).
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry_policy: Some(DynRetryPolicy(Arc::new(
                ExponentialBackoff::builder().build_with_max_retries(3),
            ))),
            environment: Environment::Live,
            credentials,
            min_call_spacing: MIN_CALL_SPACING,
        }
    }

    /// Consumes the builder and builds a new [`PlayClient`](crate::client::PlayClient).
    pub fn build(self) -> PlayClient {
        // Build an authenticator
        let authenticator = Authenticator::new(
            build_client_with_middleware(
                self.client.clone(),
                self.retry_policy.clone(),
                None,
                None,
            ),
            self.environment.auth_url(),
            self.credentials,
        );

        // Prepare the middlewares
        let auth_middleware = Some(AuthenticationMiddleware {
            authenticator: authenticator.clone(),
        });
        let rate_floor = Some(RateFloorMiddleware::new(self.min_call_spacing));

        // Build the actual Play client
        let inner = Arc::new(PlayClientInner::new(
            build_client_with_middleware(
                self.client,
                self.retry_policy,
                rate_floor,
                auth_middleware,
            ),
            authenticator,
            self.environment,
        ));

        PlayClient {
            auth: AuthApi::new(inner.clone()),
            reviews: ReviewsApi::new(inner.clone()),
            inner,
        }
    }

    /// Sets a specific reqwest [`Client`](reqwest::Client) to use.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Sets a specific [`RetryPolicy`](retry_policies::RetryPolicy) to use when retrying transient failures.
    ///
    /// To disable automatic retrying of failed requests, use `None`.
    pub fn with_retry_policy(
        mut self,
        retry_policy: impl Into<Option<Arc<dyn RetryPolicy + Send + Sync + 'static>>>,
    ) -> Self {
        self.retry_policy = retry_policy.into().map(DynRetryPolicy);
        self
    }

    /// Sets the minimum spacing enforced between any two outgoing calls.
    pub fn with_min_call_spacing(mut self, min_call_spacing: Duration) -> Self {
        self.min_call_spacing = min_call_spacing;
        self
    }

    /// Sets the environment to which this client should connect
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

fn build_client_with_middleware(
    client: reqwest::Client,
    retry_policy: Option<DynRetryPolicy>,
    rate_floor: Option<RateFloorMiddleware>,
    auth_middleware: Option<AuthenticationMiddleware>,
) -> ClientWithMiddleware {
    let mut builder = reqwest_middleware::ClientBuilder::new(client)
        .with(InjectUserAgentMiddleware::new())
        .with(TracingMiddleware::default())
        .with(ErrorHandlingMiddleware);

    if let Some(retry_policy) = retry_policy {
        builder = builder.with(RetryIdempotentMiddleware::new(retry_policy));
    }

    if let Some(rate_floor) = rate_floor {
        builder = builder.with(rate_floor);
    }

    if let Some(auth_middleware) = auth_middleware {
        builder = builder.with(auth_middleware);
    }

    builder.build()
}

/// Environment to which a [`PlayClient`](crate::client::PlayClient) should connect.
#[derive(Debug, Clone)]
pub enum Environment {
    /// The production Google API endpoints.
    Live,
    /// Custom environment. This variant is mainly used for tests.
    Custom { auth_url: Url, api_url: Url },
}

impl Environment {
    /// Shortcut to build an `Environment::Custom` with all urls set to the given value.
    pub fn from_single_url(url: &Url) -> Environment {
        Environment::Custom {
            auth_url: url.clone(),
            api_url: url.clone(),
        }
    }

    /// Base URL for authentication-related requests.
    pub fn auth_url(&self) -> Url {
        match self {
            Environment::Live => Url::parse(DEFAULT_AUTH_URL).unwrap(),
            Environment::Custom { auth_url, .. } => auth_url.clone(),
        }
    }

    /// Base URL for Android Publisher requests.
    pub fn api_url(&self) -> Url {
        match self {
            Environment::Live => Url::parse(DEFAULT_API_URL).unwrap(),
            Environment::Custom { api_url, .. } => api_url.clone(),
        }
    }
}
