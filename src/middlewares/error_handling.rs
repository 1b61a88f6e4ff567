use crate::{
    common::DEFAULT_RETRY_AFTER,
    error::{ApiError, Error, ErrorKind},
};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::time::Duration;
use task_local_extensions::Extensions;

/// Reqwest middleware which translates JSON error responses returned from Google APIs
/// into [`Error::ApiError`](crate::error::Error)s with a structured [`ErrorKind`].
pub struct ErrorHandlingMiddleware;

#[async_trait]
impl Middleware for ErrorHandlingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        // Capture the response
        let response = next.run(req, extensions).await?;

        // Build an ApiError if the response is not a success
        if !response.status().is_success() {
            tracing::debug!("Failed HTTP request. Status code: {}", response.status());

            let api_error = api_error_from_response(response).await?;
            return Err(Error::ApiError(api_error).into());
        }

        Ok(response)
    }
}

/// Body of an error response from Google APIs.
///
/// The Android Publisher endpoints wrap the error in an `error` object;
/// the OAuth2 token endpoint returns a flat `error` string.
#[derive(serde::Deserialize, Debug)]
#[serde(untagged)]
enum ErrorResponseBody {
    ApiErrorResponse {
        error: ApiErrorBody,
    },
    OAuthErrorResponse {
        error: String,
        error_description: Option<String>,
    },
    Unknown,
}

#[derive(serde::Deserialize, Debug)]
struct ApiErrorBody {
    message: Option<String>,
}

async fn api_error_from_response(response: Response) -> reqwest_middleware::Result<ApiError> {
    let status = response.status().as_u16();
    let retry_after_header = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);

    // Parse the response body as JSON
    let bytes = response.bytes().await?;
    let error_response: ErrorResponseBody =
        serde_json::from_slice(&bytes).unwrap_or(ErrorResponseBody::Unknown);

    let oauth_shaped = matches!(error_response, ErrorResponseBody::OAuthErrorResponse { .. });
    let message = match error_response {
        ErrorResponseBody::ApiErrorResponse { error } => {
            error.message.unwrap_or_else(|| "server_error".to_string())
        }
        ErrorResponseBody::OAuthErrorResponse {
            error,
            error_description,
        } => match error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        },
        ErrorResponseBody::Unknown => "server_error".to_string(),
    };

    let kind = match status {
        401 | 403 => ErrorKind::Auth,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::RateLimit,
        s if s >= 500 => ErrorKind::Api,
        // A rejected grant on the token endpoint comes back as a 400
        _ if oauth_shaped => ErrorKind::Auth,
        _ => ErrorKind::Api,
    };

    let retry_after = match kind {
        ErrorKind::RateLimit => Some(retry_after_header.unwrap_or(DEFAULT_RETRY_AFTER)),
        _ => None,
    };

    Ok(ApiError {
        kind,
        status,
        message,
        retry_after,
    })
}
