use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, USER_AGENT},
    Request, Response,
};
use reqwest_middleware::{Middleware, Next};
use task_local_extensions::Extensions;

static GOOG_API_CLIENT_HEADER: &str = "x-goog-api-client";

/// Middleware to identify this client on all outgoing requests, via the
/// `User-Agent` and the Google-conventional `x-goog-api-client` headers.
pub struct InjectUserAgentMiddleware {
    user_agent: HeaderValue,
    api_client: HeaderValue,
}

impl InjectUserAgentMiddleware {
    pub fn new() -> Self {
        Self {
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .parse()
                .unwrap(),
            api_client: concat!("gl-rust ", env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .parse()
                .unwrap(),
        }
    }
}

#[async_trait]
impl Middleware for InjectUserAgentMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        req.headers_mut()
            .insert(USER_AGENT, self.user_agent.clone());
        req.headers_mut()
            .insert(GOOG_API_CLIENT_HEADER, self.api_client.clone());

        next.run(req, extensions).await
    }
}
