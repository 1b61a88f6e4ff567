use crate::{
    apis::auth::{AccessToken, AuthenticationResult, Credentials, Token},
    error::Error,
};
use chrono::{Duration, Utc};
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};
use tokio::sync::Mutex;

/// Tokens are swapped out this many seconds before they actually expire, so
/// a request fired just before the deadline cannot race an expiring token.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Manager for credentials and access tokens.
///
/// Google's token endpoint hands out short-lived access tokens (an hour,
/// typically); the long-lived refresh token obtained when the publisher
/// account granted access is exchanged for a new one whenever the cached
/// token is within [`REFRESH_MARGIN_SECS`] of expiry.
///
/// The credential state sits behind a single async lock that stays held
/// across the exchange: a burst of concurrent API calls costs one round trip
/// to the token endpoint, and everyone queued behind the lock picks up the
/// fresh token once it is released.
#[derive(Clone)]
pub struct Authenticator {
    inner: Arc<AuthenticatorInner>,
}

struct AuthenticatorInner {
    client: ClientWithMiddleware,
    auth_url: Url,
    state: Mutex<AuthenticatorState>,
}

/// The grant currently in use plus the cached token it last produced.
struct AuthenticatorState {
    credentials: Credentials,
    access_token: Option<AccessToken>,
}

impl Authenticator {
    /// Creates a new authenticator with the given initial credentials.
    pub fn new(client: ClientWithMiddleware, auth_url: Url, credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(AuthenticatorInner {
                client,
                auth_url,
                state: Mutex::new(AuthenticatorState {
                    credentials,
                    access_token: None,
                }),
            }),
        }
    }

    /// Returns the access token used to authenticate against the Android
    /// Publisher APIs.
    ///
    /// The cached token is reused while it is comfortably far from expiry;
    /// otherwise the configured credentials are exchanged for a fresh one
    /// before this call returns.
    #[tracing::instrument(name = "Get Access Token", level = "debug", skip(self))]
    pub async fn get_access_token(&self) -> Result<AuthenticationResult, Error> {
        let mut state = self.inner.state.lock().await;

        if let Some(token) = &state.access_token {
            if !expires_soon(token) {
                tracing::debug!("Reusing cached access token");
                return Ok(AuthenticationResult {
                    access_token: token.clone(),
                    refresh_token: state.credentials.refresh_token().cloned(),
                });
            }
        }

        let res: RawAuthenticationResponse = self
            .inner
            .client
            .post(self.inner.auth_url.join("/token").unwrap())
            .json(&state.credentials)
            .send()
            .await?
            .json()
            .await?;

        if res.token_type != "Bearer" {
            return Err(Error::Other(anyhow::anyhow!(
                "unsupported access token type: {}",
                res.token_type,
            )));
        }

        let token = AccessToken {
            token: res.access_token.into(),
            expires_at: Some(Utc::now() + Duration::seconds(res.expires_in)),
        };
        state.access_token = Some(token.clone());
        tracing::info!("Obtained a fresh access token");

        // An authorization-code exchange hands back a refresh token; every
        // later refresh presents that instead of the one-shot code.
        if let Some(refresh_token) = &res.refresh_token {
            state.credentials = Credentials::RefreshToken {
                client_id: state.credentials.client_id().to_string(),
                client_secret: state.credentials.client_secret().clone(),
                refresh_token: refresh_token.clone().into(),
            };
        }

        Ok(AuthenticationResult {
            access_token: token,
            refresh_token: res.refresh_token.map(Token::from),
        })
    }
}

/// Returns `true` once the token is inside the refresh margin. A token
/// without an expiry never refreshes.
fn expires_soon(token: &AccessToken) -> bool {
    token.expires_at.map_or(false, |expires_at| {
        Utc::now() >= expires_at - Duration::seconds(REFRESH_MARGIN_SECS)
    })
}

impl Debug for Authenticator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("auth_url", &self.inner.auth_url)
            .finish_non_exhaustive()
    }
}

/// Successful response of an authentication request.
#[derive(serde::Deserialize)]
struct RawAuthenticationResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    token_type: String,
}
