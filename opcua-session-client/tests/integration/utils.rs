//! An in-process fake server and channel, so the engine can be driven through
//! its full lifecycle without sockets: scripted reads and writes, real
//! subscription and publish semantics, and fault injection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

use opcua_session_client::{
    AnonymousIdentity, ChannelConnector, ConnectionState, SessionChannel, SessionClient,
    SessionConfig, SessionInfo,
};
use opcua_session_types::{
    ApplicationDescription, BrowseResponse, BrowseResult, CreateMonitoredItemsRequest,
    CreateMonitoredItemsResponse, CreateSubscriptionRequest, CreateSubscriptionResponse,
    DataChangeNotification, DataValue, DateTime, DeleteSubscriptionsResponse,
    EndpointDescription, MessageSecurityMode, MonitoredItemCreateResult,
    MonitoredItemNotification, NodeId, NotificationData, NotificationMessage, PublishResponse,
    ReadResponse, RequestHeader, RequestMessage, ResponseHeader, ResponseMessage, ServiceFault,
    SetPublishingModeResponse, StatusCode, SubscriptionAcknowledgement, Variant, WriteResponse,
    WriteValue,
};

pub struct FakeSubscription {
    pub params: CreateSubscriptionRequest,
    pub item_ids: Vec<u32>,
    pub items: Vec<opcua_session_types::MonitoredItemCreateRequest>,
}

#[derive(Default)]
struct ServerState {
    next_subscription_id: u32,
    next_item_id: u32,
    subscriptions: HashMap<u32, FakeSubscription>,
    values: HashMap<NodeId, DataValue>,
    sequence_numbers: HashMap<u32, u32>,
    pending_publish: VecDeque<(u32, NotificationMessage)>,
    // Telemetry inspected by tests.
    create_subscription_count: usize,
    monitored_item_batches: usize,
    deleted_subscriptions: Vec<u32>,
    writes: Vec<WriteValue>,
    acks: Vec<SubscriptionAcknowledgement>,
    request_headers: Vec<(&'static str, RequestHeader)>,
}

/// The fake server. Shared by every channel the connector creates, so state
/// scripted by a test survives reconnects the way a real server would.
pub struct FakeServer {
    state: Mutex<ServerState>,
    publish_ready: Notify,
    publish_in_flight: AtomicUsize,
    max_publish_in_flight: AtomicUsize,
    open_should_fail: AtomicBool,
    browse_black_hole: AtomicBool,
    write_result: Mutex<StatusCode>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ServerState::default()),
            publish_ready: Notify::new(),
            publish_in_flight: AtomicUsize::new(0),
            max_publish_in_flight: AtomicUsize::new(0),
            open_should_fail: AtomicBool::new(false),
            browse_black_hole: AtomicBool::new(false),
            write_result: Mutex::new(StatusCode::Good),
        })
    }

    /// Script the value returned for reads of a node.
    pub fn set_value(&self, node_id: NodeId, value: impl Into<Variant>) {
        self.state
            .lock()
            .values
            .insert(node_id, DataValue::new_now(value));
    }

    /// Make every connection attempt fail at `open`.
    pub fn set_open_should_fail(&self, fail: bool) {
        self.open_should_fail.store(fail, Ordering::Relaxed);
    }

    /// Make browse requests hang forever.
    pub fn set_browse_black_hole(&self, enabled: bool) {
        self.browse_black_hole.store(enabled, Ordering::Relaxed);
    }

    /// Script the per-node status returned for writes.
    pub fn set_write_result(&self, status: StatusCode) {
        *self.write_result.lock() = status;
    }

    /// Queue a data change notification for whichever live monitored item
    /// watches `node_id`. Panics if nothing watches it.
    pub fn notify_value(&self, node_id: &NodeId, value: impl Into<Variant>) {
        let mut state = self.state.lock();
        let mut target = None;
        for (subscription_id, subscription) in &state.subscriptions {
            if let Some(item) = subscription
                .items
                .iter()
                .find(|item| &item.item_to_monitor.node_id == node_id)
            {
                target = Some((
                    *subscription_id,
                    item.requested_parameters.client_handle,
                ));
                break;
            }
        }
        let (subscription_id, client_handle) =
            target.expect("no live monitored item watches the node");
        let sequence_number = {
            let seq = state.sequence_numbers.entry(subscription_id).or_insert(1);
            let current = *seq;
            *seq += 1;
            current
        };
        state.pending_publish.push_back((
            subscription_id,
            NotificationMessage {
                sequence_number,
                publish_time: DateTime::now(),
                notification_data: vec![NotificationData::DataChange(DataChangeNotification {
                    monitored_items: vec![MonitoredItemNotification {
                        client_handle,
                        value: DataValue::new_now(value),
                    }],
                })],
            },
        ));
        drop(state);
        self.publish_ready.notify_one();
    }

    /// Queue a publish response for a subscription id the client knows nothing
    /// about, as a server with a stale subscription would.
    pub fn notify_unknown_subscription(&self, subscription_id: u32) {
        self.state
            .lock()
            .pending_publish
            .push_back((subscription_id, NotificationMessage::keep_alive(1)));
        self.publish_ready.notify_one();
    }

    pub fn create_subscription_count(&self) -> usize {
        self.state.lock().create_subscription_count
    }

    pub fn monitored_item_batches(&self) -> usize {
        self.state.lock().monitored_item_batches
    }

    pub fn deleted_subscriptions(&self) -> Vec<u32> {
        self.state.lock().deleted_subscriptions.clone()
    }

    pub fn writes(&self) -> Vec<WriteValue> {
        self.state.lock().writes.clone()
    }

    pub fn acks(&self) -> Vec<SubscriptionAcknowledgement> {
        self.state.lock().acks.clone()
    }

    /// Headers of every request seen, with the request's service name.
    pub fn request_headers(&self) -> Vec<(&'static str, RequestHeader)> {
        self.state.lock().request_headers.clone()
    }

    pub fn max_publish_in_flight(&self) -> usize {
        self.max_publish_in_flight.load(Ordering::Relaxed)
    }

    pub fn publish_in_flight(&self) -> usize {
        self.publish_in_flight.load(Ordering::Relaxed)
    }

    /// The live user subscriptions, i.e. the ones holding monitored items.
    pub fn user_subscription_ids(&self) -> Vec<u32> {
        let state = self.state.lock();
        let mut ids: Vec<u32> = state
            .subscriptions
            .iter()
            .filter(|(_, s)| !s.items.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Node ids of the items on the given subscription, in creation order.
    pub fn subscription_nodes(&self, subscription_id: u32) -> Vec<NodeId> {
        let state = self.state.lock();
        state
            .subscriptions
            .get(&subscription_id)
            .map(|s| {
                s.items
                    .iter()
                    .map(|item| item.item_to_monitor.node_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A real server tears a session's subscriptions down with the session.
    fn on_session_closed(&self) {
        let mut state = self.state.lock();
        state.subscriptions.clear();
        state.pending_publish.clear();
        state.sequence_numbers.clear();
    }

    async fn handle_request(&self, request: RequestMessage) -> Result<ResponseMessage, StatusCode> {
        {
            let mut state = self.state.lock();
            let name = request.type_name();
            state
                .request_headers
                .push((name, request.request_header().clone()));
        }
        let handle = request.request_handle();
        match request {
            RequestMessage::Read(request) => {
                let state = self.state.lock();
                let results = request
                    .nodes_to_read
                    .iter()
                    .map(|node| {
                        state.values.get(&node.node_id).cloned().unwrap_or(DataValue {
                            status: Some(StatusCode::BadNodeIdUnknown),
                            ..Default::default()
                        })
                    })
                    .collect();
                Ok(ReadResponse {
                    response_header: ResponseHeader::new_good(handle),
                    results,
                }
                .into())
            }
            RequestMessage::Write(request) => {
                let status = *self.write_result.lock();
                let mut state = self.state.lock();
                let results = request.nodes_to_write.iter().map(|_| status).collect();
                state.writes.extend(request.nodes_to_write);
                Ok(WriteResponse {
                    response_header: ResponseHeader::new_good(handle),
                    results,
                }
                .into())
            }
            RequestMessage::Browse(request) => {
                if self.browse_black_hole.load(Ordering::Relaxed) {
                    futures::future::pending::<()>().await;
                }
                let results = request
                    .nodes_to_browse
                    .iter()
                    .map(|_| BrowseResult::default())
                    .collect();
                Ok(BrowseResponse {
                    response_header: ResponseHeader::new_good(handle),
                    results,
                }
                .into())
            }
            RequestMessage::CreateSubscription(request) => {
                let mut state = self.state.lock();
                state.next_subscription_id += 1;
                let id = state.next_subscription_id;
                state.create_subscription_count += 1;
                let response = CreateSubscriptionResponse {
                    response_header: ResponseHeader::new_good(handle),
                    subscription_id: id,
                    revised_publishing_interval: request.requested_publishing_interval,
                    revised_lifetime_count: request.requested_lifetime_count,
                    revised_max_keep_alive_count: request.requested_max_keep_alive_count,
                };
                state.subscriptions.insert(
                    id,
                    FakeSubscription {
                        params: *request,
                        item_ids: Vec::new(),
                        items: Vec::new(),
                    },
                );
                Ok(response.into())
            }
            RequestMessage::CreateMonitoredItems(request) => {
                let CreateMonitoredItemsRequest {
                    subscription_id,
                    items_to_create,
                    ..
                } = *request;
                let mut state = self.state.lock();
                state.monitored_item_batches += 1;
                if !state.subscriptions.contains_key(&subscription_id) {
                    return Ok(ServiceFault::new(handle, StatusCode::BadSubscriptionIdInvalid).into());
                }
                let mut results = Vec::with_capacity(items_to_create.len());
                let mut item_ids = Vec::with_capacity(items_to_create.len());
                for item in &items_to_create {
                    state.next_item_id += 1;
                    item_ids.push(state.next_item_id);
                    results.push(MonitoredItemCreateResult {
                        status_code: StatusCode::Good,
                        monitored_item_id: state.next_item_id,
                        revised_sampling_interval: item.requested_parameters.sampling_interval,
                        revised_queue_size: item.requested_parameters.queue_size.max(1),
                    });
                }
                let subscription = state.subscriptions.get_mut(&subscription_id).unwrap();
                subscription.item_ids.extend(item_ids);
                subscription.items.extend(items_to_create);
                Ok(CreateMonitoredItemsResponse {
                    response_header: ResponseHeader::new_good(handle),
                    results,
                }
                .into())
            }
            RequestMessage::DeleteSubscriptions(request) => {
                let mut state = self.state.lock();
                let results = request
                    .subscription_ids
                    .iter()
                    .map(|id| {
                        state.deleted_subscriptions.push(*id);
                        if state.subscriptions.remove(id).is_some() {
                            StatusCode::Good
                        } else {
                            StatusCode::BadSubscriptionIdInvalid
                        }
                    })
                    .collect();
                Ok(DeleteSubscriptionsResponse {
                    response_header: ResponseHeader::new_good(handle),
                    results,
                }
                .into())
            }
            RequestMessage::SetPublishingMode(request) => {
                let results = request.subscription_ids.iter().map(|_| StatusCode::Good).collect();
                Ok(SetPublishingModeResponse {
                    response_header: ResponseHeader::new_good(handle),
                    results,
                }
                .into())
            }
            RequestMessage::Publish(request) => {
                {
                    let mut state = self.state.lock();
                    state.acks.extend(request.subscription_acknowledgements);
                }
                let current = self.publish_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_publish_in_flight.fetch_max(current, Ordering::SeqCst);
                let _guard = InFlightGuard(&self.publish_in_flight);

                let (subscription_id, message) = loop {
                    let ready = self.publish_ready.notified();
                    if let Some(pending) = self.state.lock().pending_publish.pop_front() {
                        break pending;
                    }
                    ready.await;
                };
                Ok(PublishResponse {
                    response_header: ResponseHeader::new_good(handle),
                    subscription_id,
                    available_sequence_numbers: vec![message.sequence_number],
                    more_notifications: false,
                    notification_message: message,
                    results: Vec::new(),
                }
                .into())
            }
            _ => Ok(ServiceFault::new(handle, StatusCode::BadServiceUnsupported).into()),
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One fake connection. Created per connection attempt, sharing the server.
pub struct FakeChannel {
    server: Arc<FakeServer>,
    state_tx: watch::Sender<ConnectionState>,
    sink: Mutex<Option<mpsc::UnboundedSender<PublishResponse>>>,
}

impl FakeChannel {
    fn new(server: Arc<FakeServer>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Created);
        Self {
            server,
            state_tx,
            sink: Mutex::new(None),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    /// Simulate the network dropping under the connection.
    pub fn drop_connection(&self) {
        self.fault(StatusCode::BadConnectionClosed);
    }
}

#[async_trait]
impl SessionChannel for FakeChannel {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn namespace_uris(&self) -> Vec<String> {
        vec![
            "http://opcfoundation.org/UA/".to_string(),
            "urn:fake:namespace".to_string(),
        ]
    }

    fn server_uris(&self) -> Vec<String> {
        vec!["urn:fake:server".to_string()]
    }

    async fn open(&self, _cancel: CancellationToken) -> Result<(), StatusCode> {
        self.set_state(ConnectionState::Opening);
        if self.server.open_should_fail.load(Ordering::Relaxed) {
            self.set_state(ConnectionState::Faulted);
            return Err(StatusCode::BadConnectionRejected);
        }
        self.set_state(ConnectionState::Opened);
        Ok(())
    }

    async fn close(&self) {
        if self.state() == ConnectionState::Opened {
            self.set_state(ConnectionState::Closing);
        }
        self.server.on_session_closed();
        self.set_state(ConnectionState::Closed);
    }

    async fn abort(&self) {
        self.server.on_session_closed();
        self.set_state(ConnectionState::Closed);
    }

    fn fault(&self, _status: StatusCode) {
        self.server.on_session_closed();
        self.set_state(ConnectionState::Faulted);
    }

    async fn request(&self, request: RequestMessage) -> Result<ResponseMessage, StatusCode> {
        if self.state() != ConnectionState::Opened {
            return Err(StatusCode::BadServerNotConnected);
        }
        let mut state_rx = self.state_tx.subscribe();
        tokio::select! {
            result = self.server.handle_request(request) => result,
            _ = state_rx.wait_for(|state| *state != ConnectionState::Opened) => {
                Err(StatusCode::BadSecureChannelClosed)
            }
        }
    }

    fn link_publish_sink(&self, sink: mpsc::UnboundedSender<PublishResponse>) {
        *self.sink.lock() = Some(sink);
    }

    fn unlink_publish_sink(&self) {
        *self.sink.lock() = None;
    }
}

/// Connector handing out fake channels backed by one shared server. Keeps the
/// most recent channel around so tests can inject faults, and records the
/// virtual time of every attempt so tests can assert the backoff.
pub struct FakeConnector {
    server: Arc<FakeServer>,
    last_channel: Mutex<Option<Arc<FakeChannel>>>,
    attempt_times: Mutex<Vec<tokio::time::Instant>>,
}

impl FakeConnector {
    pub fn new(server: Arc<FakeServer>) -> Arc<Self> {
        Arc::new(Self {
            server,
            last_channel: Mutex::new(None),
            attempt_times: Mutex::new(Vec::new()),
        })
    }

    pub fn current_channel(&self) -> Arc<FakeChannel> {
        self.last_channel
            .lock()
            .clone()
            .expect("no channel has been created yet")
    }

    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempt_times.lock().clone()
    }
}

impl ChannelConnector for FakeConnector {
    fn create_channel(&self, _session_info: &SessionInfo) -> Arc<dyn SessionChannel> {
        self.attempt_times.lock().push(tokio::time::Instant::now());
        let channel = Arc::new(FakeChannel::new(self.server.clone()));
        *self.last_channel.lock() = Some(channel.clone());
        channel
    }
}

pub fn test_endpoint() -> EndpointDescription {
    EndpointDescription {
        endpoint_url: "opc.tcp://localhost:4840".to_string(),
        security_mode: MessageSecurityMode::None,
        security_level: 1,
        ..Default::default()
    }
}

pub fn test_application() -> ApplicationDescription {
    ApplicationDescription::client("urn:test:client", "urn:test:product", "integration test")
}

/// Build a connected client against a fresh fake server.
pub async fn setup() -> (Arc<FakeServer>, Arc<FakeConnector>, Arc<SessionClient>) {
    let server = FakeServer::new();
    let connector = FakeConnector::new(server.clone());
    let client = SessionClient::new(
        test_application(),
        test_endpoint(),
        Arc::new(AnonymousIdentity),
        connector.clone(),
        SessionConfig::default(),
    )
    .unwrap();
    assert!(client.wait_for_connection().await);
    (server, connector, client)
}

/// Poll until `condition` holds. Under paused time this resolves as fast as
/// the runtime can auto-advance. The generous limit leaves room for tests
/// that sit through several reconnect backoffs.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition was not reached in time");
}
