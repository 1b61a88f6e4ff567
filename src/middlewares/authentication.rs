use crate::authenticator::Authenticator;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Request, Response,
};
use reqwest_middleware::{Middleware, Next};
use task_local_extensions::Extensions;

/// Reqwest middleware that attaches a Bearer access token to every outgoing
/// Android Publisher request.
///
/// The token comes from the shared [`Authenticator`]; when its cache is cold
/// or stale, obtaining it costs an extra round trip to the token endpoint
/// before the actual request goes out. A failed exchange aborts the request
/// here, so doomed credentials never reach the publisher API itself.
pub struct AuthenticationMiddleware {
    pub(crate) authenticator: Authenticator,
}

#[async_trait]
impl Middleware for AuthenticationMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let access_token = self.authenticator.get_access_token().await?;
        req.headers_mut().insert(
            AUTHORIZATION,
            bearer_header(access_token.access_token().expose_secret())?,
        );

        next.run(req, extensions).await
    }
}

/// Builds the `Authorization` header value, marked sensitive so the token
/// never shows up in logged header dumps.
fn bearer_header(token: &str) -> reqwest_middleware::Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| reqwest_middleware::Error::Middleware(e.into()))?;
    value.set_sensitive(true);
    Ok(value)
}
