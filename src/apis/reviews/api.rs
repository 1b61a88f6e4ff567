use crate::{
    apis::{
        reviews::{
            model::{RawReplyRequest, RawReview, RawReviewsListResponse},
            Review, ReviewsPage,
        },
        PlayClientInner,
    },
    common::MAX_PAGE_SIZE,
    error::ErrorKind,
    Error,
};
use std::sync::Arc;
use urlencoding::encode;

/// Client for the Android Publisher reviews APIs.
///
/// Only reviews modified within the last seven days are visible to the
/// server-side resource; older reviews cannot be listed, fetched or
/// replied to.
#[derive(Debug, Clone)]
pub struct ReviewsApi {
    inner: Arc<PlayClientInner>,
}

impl ReviewsApi {
    pub(crate) fn new(inner: Arc<PlayClientInner>) -> Self {
        Self { inner }
    }

    /// Lists reviews for a package, newest-first by modification time.
    ///
    /// At most `max_results` reviews are returned (the server caps a single
    /// page at 100); pass the returned continuation token to fetch the next
    /// page.
    #[tracing::instrument(
        name = "List Reviews",
        skip(self, page_token, translation_language),
        fields(package_name = %package_name)
    )]
    pub async fn list(
        &self,
        package_name: &str,
        max_results: usize,
        page_token: Option<&str>,
        translation_language: Option<&str>,
    ) -> Result<ReviewsPage, Error> {
        self.inner.ensure_ready()?;

        let mut url = self
            .inner
            .environment
            .api_url()
            .join(&format!(
                "/androidpublisher/v3/applications/{}/reviews",
                encode(package_name)
            ))
            .unwrap();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &max_results.min(MAX_PAGE_SIZE).to_string());
            if let Some(token) = page_token {
                query.append_pair("token", token);
            }
            if let Some(language) = translation_language {
                query.append_pair("translationLanguage", language);
            }
        }

        let res = self
            .inner
            .observe(self.inner.client.get(url).send().await.map_err(Error::from))?;
        let raw: RawReviewsListResponse = res.json().await?;

        Ok(ReviewsPage {
            reviews: raw
                .reviews
                .into_iter()
                .map(|r| r.into_review(package_name))
                .collect(),
            next_page_token: raw.token_pagination.and_then(|t| t.next_page_token),
        })
    }

    /// Gets a single review.
    ///
    /// Returns `None` if the review does not exist or has aged out of the
    /// seven-day visibility window.
    #[tracing::instrument(
        name = "Get Review",
        skip(self, translation_language),
        fields(package_name = %package_name, review_id = %review_id)
    )]
    pub async fn get(
        &self,
        package_name: &str,
        review_id: &str,
        translation_language: Option<&str>,
    ) -> Result<Option<Review>, Error> {
        self.inner.ensure_ready()?;

        let mut url = self
            .inner
            .environment
            .api_url()
            .join(&format!(
                "/androidpublisher/v3/applications/{}/reviews/{}",
                encode(package_name),
                encode(review_id)
            ))
            .unwrap();
        if let Some(language) = translation_language {
            url.query_pairs_mut()
                .append_pair("translationLanguage", language);
        }

        let res = self
            .inner
            .observe(self.inner.client.get(url).send().await.map_err(Error::from));

        // Return `None` if the server returned 404
        let review = match res {
            Ok(body) => {
                let raw: RawReview = body.json().await?;
                Some(raw.into_review(package_name))
            }
            Err(Error::ApiError(api_error)) if api_error.kind == ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        Ok(review)
    }

    /// Posts (or overwrites) the developer reply on a review.
    ///
    /// The operation is idempotent on the server side: replying twice with
    /// the same text is indistinguishable from replying once.
    #[tracing::instrument(
        name = "Reply to Review",
        skip(self, reply_text),
        fields(package_name = %package_name, review_id = %review_id)
    )]
    pub async fn reply(
        &self,
        package_name: &str,
        review_id: &str,
        reply_text: &str,
    ) -> Result<(), Error> {
        self.inner.ensure_ready()?;

        let url = self
            .inner
            .environment
            .api_url()
            .join(&format!(
                "/androidpublisher/v3/applications/{}/reviews/{}:reply",
                encode(package_name),
                encode(review_id)
            ))
            .unwrap();

        self.inner.observe(
            self.inner
                .client
                .post(url)
                .json(&RawReplyRequest { reply_text })
                .send()
                .await
                .map_err(Error::from),
        )?;

        Ok(())
    }

    /// Proves that the configured credentials can access the given package.
    ///
    /// Issues a minimal one-review listing; success demonstrates both valid
    /// credentials and package-level access.
    #[tracing::instrument(name = "Test Connection", skip(self), fields(package_name = %package_name))]
    pub async fn test_connection(&self, package_name: &str) -> Result<(), Error> {
        self.list(package_name, 1, None, None).await.map(|_| ())
    }
}
