//! Standard errors used by all functions in the crate.

use std::{fmt, time::Duration};

/// Classification of a failure, used by callers to pick a retry strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials or scope were rejected by the server.
    Auth,
    /// Server-side throttling. The [`ApiError`] carries a retry hint.
    RateLimit,
    /// The requested resource does not exist, or aged out of the
    /// seven-day visibility window.
    NotFound,
    /// Any other server-side failure.
    Api,
    /// Transport-level failure: connection, timeout, malformed response.
    Client,
    /// Input rejected locally before reaching the server. Never retried.
    Validation,
}

impl ErrorKind {
    /// Returns `true` if an operation failing with this kind may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::Api | ErrorKind::Client
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Auth => "AUTH",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Api => "API",
            ErrorKind::Client => "CLIENT",
            ErrorKind::Validation => "VALIDATION",
        };
        f.write_str(s)
    }
}

/// Error collecting all possible failures of the Play client.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Reqwest error.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    /// Error returned by a Google Play API endpoint.
    #[error("{0}")]
    ApiError(#[from] ApiError),
    /// Input rejected before reaching the server.
    #[error("validation error: {0}")]
    Validation(String),
    /// Catch-all variant for unexpected errors.
    #[error(transparent)]
    Other(anyhow::Error),
}

impl Error {
    /// Classifies this error into one of the [`ErrorKind`]s.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ApiError(e) => e.kind,
            Error::HttpError(_) | Error::Other(_) => ErrorKind::Client,
            Error::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Returns `true` if the failed operation may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(e) => Error::HttpError(e),
            reqwest_middleware::Error::Middleware(e) => {
                e.downcast::<Error>().unwrap_or_else(Error::Other)
            }
        }
    }
}

impl From<Error> for reqwest_middleware::Error {
    fn from(e: Error) -> Self {
        reqwest_middleware::Error::Middleware(e.into())
    }
}

/// Google Play HTTP APIs error.
#[derive(thiserror::Error, Debug, Clone)]
pub struct ApiError {
    /// Classification of this failure.
    pub kind: ErrorKind,
    /// HTTP status returned by the server.
    pub status: u16,
    /// Concise description of the error.
    pub message: String,
    /// Server-provided hold before the next attempt. Only present on
    /// rate-limited responses.
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// Error reported when the client has latched unready after an
    /// authentication failure.
    pub(crate) fn unready() -> Self {
        ApiError {
            kind: ErrorKind::Auth,
            status: 401,
            message: "client is unready after an authentication failure; re-initialize it"
                .to_string(),
            retry_after: None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Google Play HTTP error {} ({}): {}",
            self.status, self.kind, self.message
        )?;

        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {}ms)", retry_after.as_millis())?;
        }

        Ok(())
    }
}
