use crate::common::{eventually, review_json, sink::SinkEvent, test_context::TestContext};
use chrono::Utc;
use playbridge::bridge::ApplicationRegistration;
use serde_json::json;
use std::time::Duration;

fn registration(package_name: &str) -> ApplicationRegistration {
    ApplicationRegistration::builder(package_name, "!reviews:server")
        .with_poll_interval(Duration::from_millis(50))
        .build()
}

#[tokio::test]
async fn a_new_review_is_delivered_once() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    // An anonymous five-star review from a minute ago
    ctx.mock_server.set_reviews(
        "com.ex.app",
        vec![json!({
            "reviewId": "rv1",
            "comments": [{
                "userComment": {
                    "text": "nice",
                    "lastModified": { "seconds": (now - 60).to_string() },
                    "starRating": 5
                }
            }]
        })],
    );

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 1
    })
    .await;

    // The virtual reviewer is provisioned before its first message
    assert_eq!(
        ctx.sink.virtual_users(),
        vec![("rv1".to_string(), "Anonymous".to_string())]
    );
    let events = ctx.sink.events();
    assert_eq!(
        events[0],
        SinkEvent::VirtualUser {
            review_id: "rv1".to_string(),
            author_name: "Anonymous".to_string()
        }
    );
    assert_eq!(
        events[1],
        SinkEvent::Delivery {
            review_id: "rv1".to_string(),
            package_name: "com.ex.app".to_string()
        }
    );

    let stats = supervisor.stats();
    let package_stats = &stats.packages["com.ex.app"];
    assert_eq!(package_stats.new_reviews, 1);
    assert_eq!(package_stats.updated_reviews, 0);
    assert!(package_stats.last_poll_at.is_some());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn an_unchanged_review_is_not_redelivered() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    // A modification time slightly in the future keeps the review inside
    // every poll window, so every tick re-inspects it.
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now + 30, 5, "nice")]);

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    // Wait for at least three polls over the same review
    eventually(Duration::from_secs(5), || {
        supervisor.stats().packages["com.ex.app"].total_processed >= 3
    })
    .await;

    assert_eq!(ctx.sink.deliveries().len(), 1);
    let stats = supervisor.stats();
    let package_stats = &stats.packages["com.ex.app"];
    assert_eq!(package_stats.new_reviews, 1);
    assert_eq!(package_stats.updated_reviews, 0);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn an_edited_review_is_delivered_again_without_a_new_virtual_user() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now - 60, 5, "nice")]);

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 1
    })
    .await;

    // The reviewer edits their review
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now + 30, 5, "nicer")]);

    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 2
    })
    .await;

    // Still only one virtual user for the reviewer
    assert_eq!(ctx.sink.virtual_users().len(), 1);
    eventually(Duration::from_secs(5), || {
        supervisor.stats().packages["com.ex.app"].updated_reviews == 1
    })
    .await;

    supervisor.shutdown().await;
}

#[tokio::test]
async fn an_upstream_failure_leaves_the_watermark_untouched() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    // The next polls fail; the window must be re-covered once the API
    // recovers. The future modification time keeps the review inside every
    // poll window regardless of how many ticks already ran.
    ctx.mock_server.fail_next_list_calls([500, 500, 500]);
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now + 30, 4, "ok")]);

    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 1
    })
    .await;

    let stats = supervisor.stats();
    assert!(stats.packages["com.ex.app"].errors >= 1);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn reviews_with_an_empty_id_are_dropped() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    ctx.mock_server.set_reviews(
        "com.ex.app",
        vec![
            json!({
                "reviewId": "",
                "comments": [{
                    "userComment": {
                        "lastModified": { "seconds": (now - 30).to_string() },
                        "starRating": 1
                    }
                }]
            }),
            review_json("rv1", now - 60, 5, "nice"),
        ],
    );

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 1
    })
    .await;

    assert_eq!(
        ctx.sink.deliveries(),
        vec![("rv1".to_string(), "com.ex.app".to_string())]
    );
    // The malformed review does not count towards the stats
    assert_eq!(supervisor.stats().packages["com.ex.app"].total_processed, 1);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn a_sink_failure_counts_an_error_and_is_not_retried() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    ctx.sink.set_fail_deliveries(true);
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now - 60, 5, "nice")]);

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    eventually(Duration::from_secs(5), || {
        supervisor.stats().packages["com.ex.app"].errors >= 1
    })
    .await;

    // The watermark advanced past the review anyway: even once the sink
    // recovers, the dropped notification is not replayed.
    ctx.sink.set_fail_deliveries(false);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(ctx.sink.deliveries().is_empty());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn a_virtual_user_failure_skips_the_delivery_entirely() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    ctx.sink.set_fail_virtual_users(true);
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now - 60, 5, "nice")]);

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();

    eventually(Duration::from_secs(5), || {
        supervisor.stats().packages["com.ex.app"].errors >= 1
    })
    .await;

    // The room message is never sent without its virtual author
    assert!(ctx.sink.deliveries().is_empty());
    assert!(ctx.sink.virtual_users().is_empty());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn a_restart_from_a_populated_store_does_not_recreate_virtual_users() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now - 60, 5, "nice")]);

    let supervisor = ctx.supervisor();
    supervisor.register(registration("com.ex.app")).await.unwrap();
    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 1
    })
    .await;
    supervisor.shutdown().await;

    // A fresh engine over the same store re-registers the package. Its first
    // poll re-covers the full lookback window and re-inspects the review,
    // but the store remembers it.
    let restarted_sink = crate::common::sink::RecordingSink::new();
    let restarted = playbridge::Supervisor::builder(
        ctx.client.clone(),
        ctx.store.clone(),
        restarted_sink.clone(),
    )
    .with_drain_interval(Duration::from_millis(50))
    .build();
    restarted.register(registration("com.ex.app")).await.unwrap();

    eventually(Duration::from_secs(5), || {
        restarted.stats().packages["com.ex.app"].total_processed >= 1
    })
    .await;

    assert!(restarted_sink.virtual_users().is_empty());
    assert!(restarted_sink.deliveries().is_empty());

    restarted.shutdown().await;
}

#[tokio::test]
async fn a_poll_walks_pages_up_to_its_review_budget() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();

    // Five reviews served newest-first across pages of two
    ctx.mock_server.set_reviews(
        "com.ex.app",
        (0..5)
            .map(|i| review_json(&format!("rv{}", 5 - i), now - 10 * (i as i64 + 1), 5, "x"))
            .collect(),
    );
    ctx.mock_server.set_page_size(2);

    let supervisor = ctx.supervisor();
    supervisor
        .register(
            ApplicationRegistration::builder("com.ex.app", "!reviews:server")
                .with_poll_interval(Duration::from_millis(50))
                .with_max_reviews_per_poll(4)
                .build(),
        )
        .await
        .unwrap();

    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 4
    })
    .await;

    // The budget of four cut the poll short of the fifth (oldest) review;
    // with the watermark advancing, later polls see nothing new.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ctx.sink.deliveries().len(), 4);
    let delivered: Vec<_> = ctx
        .sink
        .deliveries()
        .into_iter()
        .map(|(review_id, _)| review_id)
        .collect();
    assert_eq!(delivered, ["rv5", "rv4", "rv3", "rv2"]);

    supervisor.shutdown().await;
}
