use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use opcua_session_client::{
    AnonymousIdentity, ConnectionState, SessionClient, SessionConfig,
};
use opcua_session_types::{
    BrowseDescription, BrowseRequest, Error, NodeId, ReadValueId, RequestHeader, RequestMessage,
    StatusCode, TimestampsToReturn,
};

use crate::utils::{setup, test_application, test_endpoint, FakeConnector, FakeServer};

#[tokio::test(start_paused = true)]
async fn connect_and_read() {
    let (server, _connector, client) = setup().await;
    assert_eq!(client.state(), ConnectionState::Opened);
    assert!(!client.namespace_uris().is_empty());
    assert!(!client.server_uris().is_empty());
    assert_ne!(client.internal_subscription_id(), 0);

    let node = NodeId::from_str("ns=2;i=3").unwrap();
    server.set_value(node.clone(), 42i32);

    let results = client
        .read(
            &[ReadValueId::value_of(node)],
            TimestampsToReturn::Both,
            0.0,
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status(), StatusCode::Good);
    assert_eq!(results[0].value, Some(42i32.into()));

    // The multiplexer stamped the header: a fresh timestamp, a handle, and the
    // configured default timeout hint.
    let (_, header) = server
        .request_headers()
        .into_iter()
        .find(|(name, _)| *name == "Read")
        .expect("no read request reached the server");
    assert!(header.timestamp.elapsed_ms() < 1000);
    assert_ne!(header.request_handle, 0);
    assert_eq!(header.timeout_hint, 10_000);
}

#[tokio::test(start_paused = true)]
async fn request_timeout_leaves_session_open() {
    let (server, _connector, client) = setup().await;
    server.set_browse_black_hole(true);

    let mut header = RequestHeader::default();
    header.timeout_hint = 500;
    let request = BrowseRequest {
        request_header: header,
        requested_max_references_per_node: 0,
        nodes_to_browse: vec![BrowseDescription::default()],
    };

    let started = Instant::now();
    let result = client.request(RequestMessage::from(request)).await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(StatusCode::BadRequestTimeout));
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_millis(700));
    // The timeout is the caller's problem, the session stays up.
    assert_eq!(client.state(), ConnectionState::Opened);
}

#[tokio::test(start_paused = true)]
async fn request_queued_while_disconnected_times_out() {
    let server = FakeServer::new();
    server.set_open_should_fail(true);
    let connector = FakeConnector::new(server.clone());
    let client = SessionClient::new(
        test_application(),
        test_endpoint(),
        Arc::new(AnonymousIdentity),
        connector,
        SessionConfig::default(),
    )
    .unwrap();

    let mut header = RequestHeader::default();
    header.timeout_hint = 2000;
    let request = BrowseRequest {
        request_header: header,
        requested_max_references_per_node: 0,
        nodes_to_browse: vec![BrowseDescription::default()],
    };

    let started = Instant::now();
    let result = client.request(RequestMessage::from(request)).await;
    assert_eq!(result, Err(StatusCode::BadRequestTimeout));
    assert!(started.elapsed() >= Duration::from_millis(2000));

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_backoff_doubles_to_ceiling() {
    let server = FakeServer::new();
    server.set_open_should_fail(true);
    let connector = FakeConnector::new(server.clone());
    let client = SessionClient::new(
        test_application(),
        test_endpoint(),
        Arc::new(AnonymousIdentity),
        connector.clone(),
        SessionConfig::default(),
    )
    .unwrap();

    // Wait for a number of failed attempts to accumulate.
    crate::utils::wait_until(|| connector.attempt_times().len() >= 8).await;
    let times = connector.attempt_times();

    // Delay before attempt k (zero based) is min(1000 * 2^k, 20000) ms.
    let mut expected = 1000u64;
    for pair in times.windows(2) {
        expected = (expected * 2).min(20_000);
        let gap = pair[1] - pair[0];
        assert_eq!(
            gap,
            Duration::from_millis(expected),
            "unexpected delay between attempts"
        );
    }

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn backoff_resets_after_successful_connection() {
    let (server, connector, client) = setup().await;

    // Kill the connection a few times in a row; each reconnect succeeds, so
    // every gap stays at the initial delay.
    for _ in 0..3 {
        connector.current_channel().drop_connection();
        crate::utils::wait_until(|| client.state() != ConnectionState::Opened).await;
        assert!(client.wait_for_connection().await);
    }

    let times = connector.attempt_times();
    assert!(times.len() >= 4);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] <= Duration::from_millis(1100));
    }

    server.set_open_should_fail(false);
    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn dispose_is_idempotent() {
    let (_server, _connector, client) = setup().await;
    client.dispose().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    client.dispose().await;
    assert_eq!(client.state(), ConnectionState::Closed);

    // A disposed client refuses requests outright.
    let request = BrowseRequest::default();
    assert_eq!(
        client.request(RequestMessage::from(request)).await,
        Err(StatusCode::BadServerNotConnected)
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_endpoint_url_fails_construction() {
    let server = FakeServer::new();
    let connector = FakeConnector::new(server);
    let result: Result<_, Error> = SessionClient::new(
        test_application(),
        "http://not-opc-ua.example",
        Arc::new(AnonymousIdentity),
        connector,
        SessionConfig::default(),
    );
    assert_eq!(
        result.unwrap_err().status(),
        StatusCode::BadTcpEndpointUrlInvalid
    );
}
