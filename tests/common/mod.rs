
use serde_json::json;
use std::time::Duration;

/// Builds the wire shape of a review as the Play API serves it.
pub fn review_json(review_id: &str, modified_at_secs: i64, star_rating: i64, text: &str) -> serde_json::Value {
    json!({
        "reviewId": review_id,
        "comments": [{
            "userComment": {
                "text": text,
                "lastModified": { "seconds": modified_at_secs.to_string() },
                "starRating": star_rating
            }
        }]
    })
}

/// Polls `condition` until it holds or the timeout expires.
///
/// The engine is timer-driven, so tests observe its effects instead of its
/// internals.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
