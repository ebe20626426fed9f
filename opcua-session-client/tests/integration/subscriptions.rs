use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use opcua_session_client::{ConnectionState, SubscriptionBuilder};
use opcua_session_types::{NodeId, StatusCode, Variant};

use crate::utils::{setup, wait_until};

fn temp_node() -> NodeId {
    NodeId::from_str("ns=2;s=Temp").unwrap()
}

#[tokio::test(start_paused = true)]
async fn declarative_subscription_dispatches_in_order() {
    let (server, _connector, client) = setup().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut builder = SubscriptionBuilder::new().publishing_interval(Duration::from_millis(500));
    builder
        .item("ns=2;s=Temp")
        .unwrap()
        .name("temperature")
        .value::<f64>(move |v| sink.lock().push(v));
    let handle = client.add_subscription(builder);

    wait_until(|| handle.server_subscription_id() != 0).await;
    let item = &handle.subscription().monitored_items()[0];
    assert_ne!(item.server_id(), 0);
    assert_eq!(item.create_status(), Some(StatusCode::Good));

    // One value per publish round trip, in order, with no intermediate
    // defaults.
    for value in [1.0f64, 2.0, 3.0] {
        server.notify_value(&temp_node(), value);
        let expected = value;
        wait_until(|| seen.lock().last() == Some(&expected)).await;
    }
    assert_eq!(*seen.lock(), vec![1.0, 2.0, 3.0]);
}

#[tokio::test(start_paused = true)]
async fn publish_acknowledges_previous_notification() {
    let (server, _connector, client) = setup().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut builder = SubscriptionBuilder::new();
    builder
        .item("ns=2;s=Temp")
        .unwrap()
        .value::<f64>(move |v| sink.lock().push(v));
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;
    let subscription_id = handle.server_subscription_id();

    server.notify_value(&temp_node(), 1.0f64);
    wait_until(|| !seen.lock().is_empty()).await;

    // The task that received sequence number 1 acknowledges it on its next
    // publish. Trigger another round trip and watch the ack arrive.
    server.notify_value(&temp_node(), 2.0f64);
    wait_until(|| seen.lock().len() == 2).await;
    wait_until(|| {
        server
            .acks()
            .iter()
            .any(|ack| ack.subscription_id == subscription_id && ack.sequence_number == 1)
    })
    .await;

    // Acknowledgements are sent once each, and only for sequence numbers the
    // server actually delivered.
    let acks = server.acks();
    assert_eq!(
        acks.iter()
            .filter(|a| a.subscription_id == subscription_id && a.sequence_number == 1)
            .count(),
        1
    );
    for ack in &acks {
        assert!(ack.sequence_number < 3);
    }
}

#[tokio::test(start_paused = true)]
async fn publish_pipeline_depth_is_three() {
    let (server, _connector, client) = setup().await;

    let mut builder = SubscriptionBuilder::new();
    builder.item("ns=2;s=Temp").unwrap().data_value(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;

    // With nothing to deliver, all pump tasks end up parked on the server.
    wait_until(|| server.publish_in_flight() == 3).await;
    assert_eq!(server.max_publish_in_flight(), 3);

    // Drive a few notifications through and make sure the pipeline never
    // grows beyond its depth.
    for i in 0..5 {
        server.notify_value(&temp_node(), i as f64);
    }
    wait_until(|| server.publish_in_flight() == 3).await;
    assert_eq!(server.max_publish_in_flight(), 3);
}

#[tokio::test(start_paused = true)]
async fn subscriptions_recreated_after_connection_loss() {
    let (server, connector, client) = setup().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut builder = SubscriptionBuilder::new();
    builder
        .item("ns=2;s=Temp")
        .unwrap()
        .value::<f64>(move |v| sink.lock().push(v));
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;
    let first_id = handle.server_subscription_id();
    let first_batches = server.monitored_item_batches();

    connector.current_channel().drop_connection();
    wait_until(|| client.state() != ConnectionState::Opened).await;
    assert!(client.wait_for_connection().await);

    // Without user action the subscription and its items exist again, under
    // fresh server ids.
    wait_until(|| handle.server_subscription_id() != 0).await;
    assert_ne!(handle.server_subscription_id(), first_id);
    let item = &handle.subscription().monitored_items()[0];
    assert_ne!(item.server_id(), 0);
    assert!(server.monitored_item_batches() > first_batches);

    // And notifications flow again.
    server.notify_value(&temp_node(), 9.0f64);
    wait_until(|| seen.lock().last() == Some(&9.0)).await;
}

#[tokio::test(start_paused = true)]
async fn suspend_clears_server_ids_and_resume_restores_them() {
    let (server, _connector, client) = setup().await;

    let mut builder = SubscriptionBuilder::new();
    builder.item("ns=2;s=Temp").unwrap().data_value(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;

    client.suspend().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    // Everything server assigned is forgotten the moment the channel is gone.
    assert_eq!(handle.server_subscription_id(), 0);
    assert_eq!(handle.subscription().monitored_items()[0].server_id(), 0);
    assert_eq!(client.internal_subscription_id(), 0);

    client.resume();
    assert!(client.wait_for_connection().await);
    wait_until(|| handle.server_subscription_id() != 0).await;
    assert_ne!(handle.subscription().monitored_items()[0].server_id(), 0);
    let nodes = server.subscription_nodes(handle.server_subscription_id());
    assert_eq!(nodes, vec![temp_node()]);

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_and_resubscribe_restores_item_set() {
    let (server, _connector, client) = setup().await;

    let mut builder = SubscriptionBuilder::new();
    builder.item("ns=2;s=Temp").unwrap().data_value(|_| {});
    builder.item("ns=2;i=5").unwrap().data_value(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;
    let first_id = handle.server_subscription_id();
    let first_nodes = server.subscription_nodes(first_id);

    drop(handle);
    wait_until(|| server.deleted_subscriptions().contains(&first_id)).await;

    let mut builder = SubscriptionBuilder::new();
    builder.item("ns=2;s=Temp").unwrap().data_value(|_| {});
    builder.item("ns=2;i=5").unwrap().data_value(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;

    // Same monitored item set, under new ids.
    let second_id = handle.server_subscription_id();
    assert_ne!(second_id, first_id);
    assert_eq!(server.subscription_nodes(second_id), first_nodes);
}

#[tokio::test(start_paused = true)]
async fn dropped_subscription_is_deleted_on_server() {
    let (server, _connector, client) = setup().await;

    let mut builder = SubscriptionBuilder::new();
    builder.item("ns=2;s=Temp").unwrap().data_value(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;
    let server_id = handle.server_subscription_id();

    // The handle is the last strong reference; dropping it triggers the
    // server side deletion without any further user action.
    drop(handle);
    wait_until(|| server.deleted_subscriptions().contains(&server_id)).await;
    assert!(!server.user_subscription_ids().contains(&server_id));
}

#[tokio::test(start_paused = true)]
async fn publish_for_unknown_subscription_triggers_deletion() {
    let (server, _connector, client) = setup().await;

    let mut builder = SubscriptionBuilder::new();
    builder.item("ns=2;s=Temp").unwrap().data_value(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;

    // A notification for a subscription id the client never created, e.g.
    // one left over from an older session.
    server.notify_unknown_subscription(9999);
    wait_until(|| server.deleted_subscriptions().contains(&9999)).await;

    // The live subscription is untouched.
    assert_ne!(handle.server_subscription_id(), 0);
}

#[tokio::test(start_paused = true)]
async fn write_back_records_failures_and_keeps_writing() {
    let (server, _connector, client) = setup().await;

    let mut builder = SubscriptionBuilder::new();
    let writer = builder
        .item("ns=2;s=Temp")
        .unwrap()
        .name("temperature")
        .value_writable::<f64>(|_| {});
    let handle = client.add_subscription(builder);
    wait_until(|| handle.server_subscription_id() != 0).await;

    writer.set(42.0).unwrap();
    wait_until(|| server.writes().len() == 1).await;
    let write = &server.writes()[0];
    assert_eq!(write.node_id, temp_node());
    assert_eq!(write.value.value, Some(Variant::Double(42.0)));
    wait_until(|| writer.last_status() == Some(StatusCode::Good)).await;
    assert!(handle.errors().is_empty());

    // A rejected write lands on the error surface, keyed by the item name.
    server.set_write_result(StatusCode::BadUserAccessDenied);
    writer.set(43.0).unwrap();
    wait_until(|| writer.last_status() == Some(StatusCode::BadUserAccessDenied)).await;
    assert_eq!(
        handle.errors(),
        vec![("temperature".to_string(), StatusCode::BadUserAccessDenied)]
    );

    // Later writes still go through.
    server.set_write_result(StatusCode::Good);
    writer.set(44.0).unwrap();
    wait_until(|| server.writes().len() == 3).await;
}
