use crate::common::{review_json, test_context::TestContext};
use chrono::{DateTime, Utc};
use playbridge::PlayClient;
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn list_normalizes_reviews() {
    let ctx = TestContext::start().await;
    ctx.mock_server.set_reviews(
        "com.ex.app",
        vec![json!({
            "reviewId": "rv1",
            "authorName": "Jamie",
            "comments": [
                {
                    "userComment": {
                        "text": "Great app",
                        "lastModified": { "seconds": "1704189600" },
                        "starRating": 5,
                        "device": "oriole",
                        "appVersionName": "1.2.3"
                    }
                },
                {
                    "developerComment": {
                        "text": "Thanks!",
                        "lastModified": { "seconds": "1704193200" }
                    }
                }
            ]
        })],
    );

    let page = ctx
        .client
        .reviews
        .list("com.ex.app", 10, None, None)
        .await
        .unwrap();

    assert_eq!(page.reviews.len(), 1);
    assert!(page.next_page_token.is_none());

    let review = &page.reviews[0];
    assert_eq!(review.review_id, "rv1");
    assert_eq!(review.package_name, "com.ex.app");
    assert_eq!(review.author_name, "Jamie");
    assert_eq!(review.star_rating, 5);
    assert_eq!(review.text.as_deref(), Some("Great app"));
    assert_eq!(
        review.last_modified_at,
        DateTime::<Utc>::from_timestamp(1_704_189_600, 0).unwrap()
    );
    assert!(review.has_reply);
    assert_eq!(
        review.developer_comment.as_ref().unwrap().text,
        "Thanks!"
    );
    assert_eq!(review.device.as_deref(), Some("oriole"));
}

#[tokio::test]
async fn list_defaults_missing_fields() {
    let ctx = TestContext::start().await;
    ctx.mock_server.set_reviews(
        "com.ex.app",
        vec![json!({
            "reviewId": "rv1",
            "comments": [{ "userComment": {} }]
        })],
    );

    let page = ctx
        .client
        .reviews
        .list("com.ex.app", 10, None, None)
        .await
        .unwrap();

    let review = &page.reviews[0];
    assert_eq!(review.author_name, "Anonymous");
    assert_eq!(review.star_rating, 0);
    assert_eq!(review.text, None);
    assert_eq!(review.last_modified_at, DateTime::<Utc>::UNIX_EPOCH);
    assert!(!review.has_reply);
}

#[tokio::test]
async fn list_paginates_with_continuation_tokens() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();
    ctx.mock_server.set_reviews(
        "com.ex.app",
        vec![
            review_json("rv3", now - 10, 5, "third"),
            review_json("rv2", now - 20, 4, "second"),
            review_json("rv1", now - 30, 3, "first"),
        ],
    );
    ctx.mock_server.set_page_size(2);

    let first_page = ctx
        .client
        .reviews
        .list("com.ex.app", 100, None, None)
        .await
        .unwrap();
    assert_eq!(first_page.reviews.len(), 2);
    let token = first_page.next_page_token.expect("expected a continuation");

    let second_page = ctx
        .client
        .reviews
        .list("com.ex.app", 100, Some(&token), None)
        .await
        .unwrap();
    assert_eq!(second_page.reviews.len(), 1);
    assert_eq!(second_page.reviews[0].review_id, "rv1");
    assert!(second_page.next_page_token.is_none());
}

#[tokio::test]
async fn get_returns_none_for_missing_reviews() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now, 5, "nice")]);

    let review = ctx
        .client
        .reviews
        .get("com.ex.app", "rv1", None)
        .await
        .unwrap();
    assert_eq!(review.unwrap().review_id, "rv1");

    let missing = ctx
        .client
        .reviews
        .get("com.ex.app", "ghost", None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn reply_posts_the_developer_response() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now, 5, "nice")]);

    ctx.client
        .reviews
        .reply("com.ex.app", "rv1", "Thanks for the feedback!")
        .await
        .unwrap();

    let replies = ctx.mock_server.received_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].package_name, "com.ex.app");
    assert_eq!(replies[0].review_id, "rv1");
    assert_eq!(replies[0].reply_text, "Thanks for the feedback!");
}

#[tokio::test]
async fn test_connection_proves_credentials_and_access() {
    let ctx = TestContext::start().await;

    ctx.client
        .reviews
        .test_connection("com.ex.app")
        .await
        .unwrap();
}

#[tokio::test]
async fn consecutive_calls_respect_the_rate_floor() {
    let ctx = TestContext::start().await;

    // A client with the default 100ms floor (the context client disables it)
    let client = PlayClient::builder(ctx.credentials())
        .with_retry_policy(None)
        .with_environment(ctx.play_environment())
        .build();

    let start = Instant::now();
    for _ in 0..3 {
        client
            .reviews
            .list("com.ex.app", 1, None, None)
            .await
            .unwrap();
    }
    let elapsed = start.elapsed();

    // Two gaps of at least 100ms each between the three calls
    assert!(
        elapsed >= Duration::from_millis(200),
        "three calls completed in {:?}",
        elapsed
    );
    assert_eq!(ctx.mock_server.api_request_instants().len(), 3);
}
