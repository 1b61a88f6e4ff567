use crate::common::{eventually, review_json, test_context::TestContext};
use chrono::Utc;
use playbridge::{
    apis::auth::Credentials,
    bridge::{ApplicationRegistration, Supervisor},
    error::ErrorKind,
    PlayClient,
};
use std::time::Duration;

fn registration(package_name: &str) -> ApplicationRegistration {
    ApplicationRegistration::builder(package_name, "!reviews:server")
        .with_poll_interval(Duration::from_millis(50))
        .build()
}

#[tokio::test]
async fn registration_fails_loudly_with_bad_credentials() {
    let ctx = TestContext::start().await;

    let client = PlayClient::builder(Credentials::RefreshToken {
        client_id: "invalid".to_string(),
        client_secret: "invalid".to_string().into(),
        refresh_token: "invalid".to_string().into(),
    })
    .with_retry_policy(None)
    .with_environment(ctx.play_environment())
    .build();

    let supervisor = Supervisor::builder(client.clone(), ctx.store.clone(), ctx.sink.clone())
        .with_drain_interval(Duration::from_millis(50))
        .build();

    let err = supervisor
        .register(registration("com.ex.app"))
        .await
        .expect_err("registration must fail");
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(!client.is_ready());

    // Nothing was registered
    assert!(supervisor.stats().packages.is_empty());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn duplicate_registrations_are_rejected() {
    let ctx = TestContext::start().await;
    let supervisor = ctx.supervisor();

    supervisor.register(registration("com.ex.app")).await.unwrap();
    let err = supervisor
        .register(registration("com.ex.app"))
        .await
        .expect_err("duplicate registration must fail");
    assert_eq!(err.kind(), ErrorKind::Validation);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn unregistering_stops_polling_and_retains_stats() {
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

    supervisor.unregister("com.ex.app").await.unwrap();

    // A review arriving after unregistration is never picked up
    ctx.mock_server
        .push_review("com.ex.app", review_json("rv2", now + 30, 4, "late"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ctx.sink.deliveries().len(), 1);

    // The collected counters survive the unregistration
    let stats = supervisor.stats();
    assert_eq!(stats.packages["com.ex.app"].new_reviews, 1);

    // Unregistering twice is an error
    let err = supervisor
        .unregister("com.ex.app")
        .await
        .expect_err("double unregistration must fail");
    assert_eq!(err.kind(), ErrorKind::Validation);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn pause_stops_polling_but_replies_keep_flowing() {
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

    supervisor.pause().await;

    // New reviews are not picked up while paused
    ctx.mock_server
        .push_review("com.ex.app", review_json("rv2", now + 30, 4, "late"));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(ctx.sink.deliveries().len(), 1);

    // But queued replies still drain
    supervisor
        .queue_reply(
            "com.ex.app",
            "rv1",
            "thanks",
            "$event:server",
            "!reviews:server",
            "@operator:server",
        )
        .unwrap();
    eventually(Duration::from_secs(5), || {
        ctx.mock_server.received_replies().len() == 1
    })
    .await;

    // Resuming picks the new review up from the retained watermark
    supervisor.resume();
    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 2
    })
    .await;

    supervisor.shutdown().await;
}

#[tokio::test]
async fn registering_while_paused_defers_the_poller_to_resume() {
    let ctx = TestContext::start().await;
    let now = Utc::now().timestamp();
    ctx.mock_server
        .set_reviews("com.ex.app", vec![review_json("rv1", now - 60, 5, "nice")]);

    let supervisor = ctx.supervisor();
    supervisor.pause().await;
    supervisor.register(registration("com.ex.app")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(ctx.sink.deliveries().is_empty());

    supervisor.resume();
    eventually(Duration::from_secs(5), || {
        ctx.sink.deliveries().len() == 1
    })
    .await;

    supervisor.shutdown().await;
}

#[tokio::test]
async fn the_stats_snapshot_includes_the_queue_depth() {
    let ctx = TestContext::start().await;

    // A drainer that will not interfere within the test's lifetime
    let supervisor = ctx.supervisor_with_drain_interval(Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_millis(200)).await;

    supervisor
        .queue_reply(
            "com.ex.app",
            "rv1",
            "one",
            "$e1:server",
            "!reviews:server",
            "@operator:server",
        )
        .unwrap();
    supervisor
        .queue_reply(
            "com.ex.app",
            "rv2",
            "two",
            "$e2:server",
            "!reviews:server",
            "@operator:server",
        )
        .unwrap();

    assert_eq!(supervisor.stats().reply_queue_depth, 2);

    supervisor.shutdown().await;
}
