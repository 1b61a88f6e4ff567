use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A user review of an application, normalized from the upstream shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    /// Opaque review identifier, unique per package.
    pub review_id: String,
    /// Reverse-DNS name of the reviewed application.
    pub package_name: String,
    /// Display name of the reviewer. `"Anonymous"` when the author withheld it.
    pub author_name: String,
    /// Star rating between 1 and 5. A 0 means the upstream record was
    /// malformed and is surfaced as-is.
    pub star_rating: i64,
    /// Free-form review text, if any.
    pub text: Option<String>,
    /// When the review was created. The upstream API exposes no distinct
    /// creation time, so this mirrors [`Review::last_modified_at`].
    pub created_at: DateTime<Utc>,
    /// When the review was last created or edited.
    pub last_modified_at: DateTime<Utc>,
    /// Whether the publisher has already responded.
    pub has_reply: bool,
    /// The publisher's response, present exactly when [`Review::has_reply`] is set.
    pub developer_comment: Option<DeveloperComment>,
    pub reviewer_language: Option<String>,
    pub device: Option<String>,
    pub android_os_version: Option<i64>,
    pub app_version_code: Option<i64>,
    pub app_version_name: Option<String>,
    pub thumbs_up_count: Option<i64>,
    pub thumbs_down_count: Option<i64>,
}

/// The publisher's response attached to a review.
#[derive(Debug, Clone, PartialEq)]
pub struct DeveloperComment {
    pub text: String,
    pub last_modified_at: DateTime<Utc>,
}

/// One page of reviews plus the continuation token for the next one.
///
/// Reviews are ordered newest-first by modification time.
#[derive(Debug, Clone)]
pub struct ReviewsPage {
    pub reviews: Vec<Review>,
    pub next_page_token: Option<String>,
}

/// Wire shape of a `reviews.list` response.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReviewsListResponse {
    #[serde(default)]
    pub reviews: Vec<RawReview>,
    pub token_pagination: Option<RawTokenPagination>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTokenPagination {
    pub next_page_token: Option<String>,
}

/// Wire shape of a single review.
///
/// The user comment and the developer comment both live inside the `comments`
/// array; the first entry of each kind wins.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReview {
    #[serde(default)]
    pub review_id: String,
    pub author_name: Option<String>,
    #[serde(default)]
    pub comments: Vec<RawCommentEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCommentEntry {
    pub user_comment: Option<RawUserComment>,
    pub developer_comment: Option<RawDeveloperComment>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawUserComment {
    pub text: Option<String>,
    pub last_modified: Option<RawTimestamp>,
    pub star_rating: Option<i64>,
    pub reviewer_language: Option<String>,
    pub device: Option<String>,
    pub android_os_version: Option<i64>,
    pub app_version_code: Option<i64>,
    pub app_version_name: Option<String>,
    pub thumbs_up_count: Option<i64>,
    pub thumbs_down_count: Option<i64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDeveloperComment {
    pub text: Option<String>,
    pub last_modified: Option<RawTimestamp>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawTimestamp {
    pub seconds: Option<Seconds>,
}

/// Upstream encodes the seconds field as a JSON string; tolerate bare numbers.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum Seconds {
    Text(String),
    Number(i64),
}

impl RawReview {
    /// Normalizes this wire record into a [`Review`].
    ///
    /// Malformed data is smoothed over rather than rejected: a missing author
    /// becomes `"Anonymous"`, a missing star rating becomes 0 and an
    /// unparseable timestamp becomes the Unix epoch.
    pub(crate) fn into_review(self, package_name: &str) -> Review {
        let user = self
            .comments
            .iter()
            .find_map(|c| c.user_comment.as_ref());
        let developer = self
            .comments
            .iter()
            .find_map(|c| c.developer_comment.as_ref());

        let last_modified_at = decode_timestamp(user.and_then(|u| u.last_modified.as_ref()));
        let author_name = match self.author_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Anonymous".to_string(),
        };
        let developer_comment = developer.map(|d| DeveloperComment {
            text: d.text.clone().unwrap_or_default(),
            last_modified_at: decode_timestamp(d.last_modified.as_ref()),
        });

        Review {
            review_id: self.review_id,
            package_name: package_name.to_string(),
            author_name,
            star_rating: user.and_then(|u| u.star_rating).unwrap_or(0),
            text: user.and_then(|u| u.text.clone()),
            created_at: last_modified_at,
            last_modified_at,
            has_reply: developer_comment.is_some(),
            developer_comment,
            reviewer_language: user.and_then(|u| u.reviewer_language.clone()),
            device: user.and_then(|u| u.device.clone()),
            android_os_version: user.and_then(|u| u.android_os_version),
            app_version_code: user.and_then(|u| u.app_version_code),
            app_version_name: user.and_then(|u| u.app_version_name.clone()),
            thumbs_up_count: user.and_then(|u| u.thumbs_up_count),
            thumbs_down_count: user.and_then(|u| u.thumbs_down_count),
        }
    }
}

fn decode_timestamp(ts: Option<&RawTimestamp>) -> DateTime<Utc> {
    ts.and_then(|t| t.seconds.as_ref())
        .and_then(|s| match s {
            Seconds::Text(v) => v.parse::<i64>().ok(),
            Seconds::Number(n) => Some(*n),
        })
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Wire shape of a `reviews.reply` request.
#[derive(serde::Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawReplyRequest<'a> {
    pub reply_text: &'a str,
}
