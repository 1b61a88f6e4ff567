use crate::common::test_context::TestContext;
use playbridge::{apis::auth::Credentials, error::ErrorKind, PlayClient};

#[tokio::test]
async fn get_access_token() {
    let ctx = TestContext::start().await;

    let access_token = ctx
        .client
        .auth
        .get_access_token()
        .await
        .unwrap()
        .access_token()
        .clone();

    assert!(!access_token.expose_secret().is_empty());
}

#[tokio::test]
async fn invalid_credentials_latch_the_client_unready() {
    let ctx = TestContext::start().await;

    // Create a new client with a set of invalid credentials pointing to the same mock server
    let client = PlayClient::builder(Credentials::RefreshToken {
        client_id: "invalid".to_string(),
        client_secret: "invalid".to_string().into(),
        refresh_token: "invalid".to_string().into(),
    })
    .with_retry_policy(None)
    .with_environment(ctx.play_environment())
    .build();

    // Make a request and assert that we got an authentication error
    let err = client
        .reviews
        .list("com.ex.app", 10, None, None)
        .await
        .expect_err("Expected error");
    assert_eq!(err.kind(), ErrorKind::Auth);

    // The client is now unready and fails fast without touching the network
    assert!(!client.is_ready());
    let err = client
        .reviews
        .list("com.ex.app", 10, None, None)
        .await
        .expect_err("Expected error");
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(ctx.mock_server.api_request_instants().is_empty());

    // Resetting the latch allows calls to reach the server again
    client.reset_readiness();
    assert!(client.is_ready());
}
