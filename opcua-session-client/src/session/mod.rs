//! The session client: the long lived handle users hold, the shared session
//! core, and the supervisor that keeps a session open across channel faults.

mod operations;
mod services;
mod supervisor;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use log::{error, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use opcua_session_types::{
    ApplicationDescription, DateTime, DiagnosticBits, Error, RequestHeader, RequestMessage,
    ResponseHeader, ResponseMessage, StatusCode,
};

use crate::channel::{ChannelConnector, ConnectionState, EndpointSource, IdentityProvider, SessionInfo};
use crate::config::SessionConfig;
use crate::discovery::is_opc_ua_binary_url;
use crate::retry::RequestRetryPolicy;
use crate::subscription::{SubscriptionBuilder, SubscriptionHandle, SubscriptionRegistry};
use crate::sync::Mutex;

use operations::ServiceOperation;
use supervisor::Supervisor;

#[allow(unused)]
macro_rules! session_warn {
    ($session: expr, $($arg:tt)*) =>  {
        log::warn!("session:{} {}", $session.session_id(), format!($($arg)*));
    }
}
#[allow(unused)]
pub(crate) use session_warn;

#[allow(unused)]
macro_rules! session_error {
    ($session: expr, $($arg:tt)*) =>  {
        log::error!("session:{} {}", $session.session_id(), format!($($arg)*));
    }
}
#[allow(unused)]
pub(crate) use session_error;

#[allow(unused)]
macro_rules! session_debug {
    ($session: expr, $($arg:tt)*) =>  {
        log::debug!("session:{} {}", $session.session_id(), format!($($arg)*));
    }
}
#[allow(unused)]
pub(crate) use session_debug;

/// How long `dispose` and `suspend` wait for the supervisor to shut down
/// gracefully before abandoning it.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

static NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);

/// Process the service result, i.e. where the request "succeeded" but the response
/// contains a failure status code.
pub(crate) fn process_service_result(response_header: &ResponseHeader) -> Result<(), StatusCode> {
    if response_header.service_result.is_bad() {
        info!(
            "Received a bad service result {} from the request",
            response_header.service_result
        );
        Err(response_header.service_result)
    } else {
        Ok(())
    }
}

pub(crate) fn process_unexpected_response(response: ResponseMessage) -> StatusCode {
    match response {
        ResponseMessage::ServiceFault(service_fault) => {
            error!(
                "Received a service fault of {} for the request",
                service_fault.response_header.service_result
            );
            service_fault.response_header.service_result
        }
        _ => {
            error!("Received an unexpected response to the request");
            StatusCode::BadUnknownResponse
        }
    }
}

/// State shared between the user facing [`SessionClient`], the supervisor and
/// the per-connection tasks.
pub(crate) struct SessionCore {
    pub(crate) config: SessionConfig,
    pub(crate) session_info: SessionInfo,
    pub(crate) connector: Arc<dyn ChannelConnector>,
    pub(crate) registry: Arc<SubscriptionRegistry>,
    pub(crate) state_watch_tx: watch::Sender<ConnectionState>,
    pub(crate) state_watch_rx: watch::Receiver<ConnectionState>,
    pub(crate) namespace_uris: ArcSwap<Vec<String>>,
    pub(crate) server_uris: ArcSwap<Vec<String>>,
    pub(crate) internal_subscription_tx: watch::Sender<u32>,
    pub(crate) internal_subscription_rx: watch::Receiver<u32>,
    request_handle: AtomicU32,
    internal_session_id: u32,
}

impl SessionCore {
    /// The internal id of the session, used to keep track of multiple sessions
    /// in the same program.
    pub fn session_id(&self) -> u32 {
        self.internal_session_id
    }

    /// The next request handle. Handles are never zero.
    pub fn next_request_handle(&self) -> u32 {
        loop {
            let handle = self.request_handle.fetch_add(1, Ordering::Relaxed);
            if handle != 0 {
                return handle;
            }
        }
    }

    /// A request header for an engine initiated request with the given timeout.
    pub fn make_request_header(&self, timeout: Duration) -> RequestHeader {
        let mut header = RequestHeader::new(
            &opcua_session_types::NodeId::null(),
            &DateTime::now(),
            self.next_request_handle(),
        );
        header.timeout_hint = timeout.as_millis().min(u32::MAX as u128) as u32;
        header.return_diagnostics = DiagnosticBits::from_bits_truncate(self.config.return_diagnostics);
        header
    }

    /// Publish a state transition. No-op if the state is unchanged, so
    /// observers see each state at most once per transition.
    pub fn set_state(&self, state: ConnectionState) {
        self.state_watch_tx.send_if_modified(|current| {
            if *current != state {
                session_debug!(self, "Session state: {current} -> {state}");
                *current = state;
                true
            } else {
                false
            }
        });
    }
}

struct RunState {
    op_tx: mpsc::UnboundedSender<ServiceOperation>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// A client for one logical OPC UA session.
///
/// Constructing the client starts a supervisor task that connects, reconnects
/// with exponential backoff, and runs the subscription machinery while the
/// connection is open. Requests queue until a connection is available, bounded
/// by their timeout hint.
pub struct SessionClient {
    core: Arc<SessionCore>,
    run: Mutex<Option<RunState>>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient").finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Create a session client and start its supervisor.
    ///
    /// # Arguments
    ///
    /// * `application` - The description of this application, sent when the
    ///   channel creates sessions.
    /// * `endpoint` - An endpoint description, or a discovery URL the channel
    ///   resolves during `open`.
    /// * `identity_provider` - Yields the user identity to activate sessions with.
    /// * `connector` - Creates one channel per connection attempt.
    /// * `config` - Session configuration.
    ///
    /// Fails with a configuration error when the endpoint URL is not a valid
    /// OPC UA URL or the configuration does not validate. Must be called from
    /// within a tokio runtime, the supervisor is spawned on it.
    pub fn new(
        application: ApplicationDescription,
        endpoint: impl Into<EndpointSource>,
        identity_provider: Arc<dyn IdentityProvider>,
        connector: Arc<dyn ChannelConnector>,
        config: SessionConfig,
    ) -> Result<Arc<Self>, Error> {
        let endpoint = endpoint.into();
        config
            .validate()
            .map_err(|errors| Error::configuration(errors.join(" ")))?;
        if endpoint.url().is_empty() {
            return Err(Error::configuration("No endpoint url was supplied"));
        }
        if !is_opc_ua_binary_url(endpoint.url()) {
            return Err(Error::new(
                StatusCode::BadTcpEndpointUrlInvalid,
                format!("Endpoint url {} is not a valid opc.tcp url", endpoint.url()),
            ));
        }

        let session_info = SessionInfo {
            application,
            endpoint,
            identity_provider,
            session_name: config.session_name.clone(),
            requested_session_timeout: config.session_timeout,
            preferred_locales: config.preferred_locales.clone(),
            transport: config.transport.clone(),
        };

        let (state_watch_tx, state_watch_rx) = watch::channel(ConnectionState::Created);
        let (internal_subscription_tx, internal_subscription_rx) = watch::channel(0);
        let core = Arc::new(SessionCore {
            config,
            session_info,
            connector,
            registry: SubscriptionRegistry::new(),
            state_watch_tx,
            state_watch_rx,
            namespace_uris: ArcSwap::from_pointee(Vec::new()),
            server_uris: ArcSwap::from_pointee(Vec::new()),
            internal_subscription_tx,
            internal_subscription_rx,
            request_handle: AtomicU32::new(1),
            internal_session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
        });

        let client = Arc::new(Self {
            core,
            run: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });
        client.resume();
        Ok(client)
    }

    /// The internal id of the session, used to tell multiple sessions in the
    /// same process apart in logs.
    pub fn session_id(&self) -> u32 {
        self.core.session_id()
    }

    /// The current session state.
    pub fn state(&self) -> ConnectionState {
        *self.core.state_watch_rx.borrow()
    }

    /// A watch over session state transitions.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.core.state_watch_rx.clone()
    }

    /// The namespace table of the connected server. Empty until the first
    /// successful connection.
    pub fn namespace_uris(&self) -> Arc<Vec<String>> {
        self.core.namespace_uris.load_full()
    }

    /// The server URI table of the connected server. Empty until the first
    /// successful connection.
    pub fn server_uris(&self) -> Arc<Vec<String>> {
        self.core.server_uris.load_full()
    }

    /// The server id of the internal keep alive subscription, 0 while not
    /// connected.
    pub fn internal_subscription_id(&self) -> u32 {
        *self.core.internal_subscription_rx.borrow()
    }

    /// A watch over the internal keep alive subscription id.
    pub fn internal_subscription_watch(&self) -> watch::Receiver<u32> {
        self.core.internal_subscription_rx.clone()
    }

    /// Wait until the session reaches the given state. Note that a disposed
    /// session stays `Closed` forever, so waiting for `Opened` on one never
    /// resolves; combine with a timeout where that matters.
    pub async fn wait_for_state(&self, state: ConnectionState) -> bool {
        let mut rx = self.core.state_watch_rx.clone();
        let result = rx.wait_for(|current| *current == state).await.is_ok();
        result
    }

    /// Convenience method to wait for a connection to the server.
    pub async fn wait_for_connection(&self) -> bool {
        self.wait_for_state(ConnectionState::Opened).await
    }

    /// Send a request and wait for the matching response.
    ///
    /// The request header's timestamp, request handle, timeout hint and
    /// diagnostic bits are filled in if they are unset. The call waits at most
    /// the timeout hint regardless of connection state: requests queued while
    /// the session is reconnecting are sent once it is open, or fail with
    /// `BadRequestTimeout`. A request whose channel drops mid flight fails
    /// with `BadSecureChannelClosed` and is never silently retried.
    pub async fn request(&self, mut request: RequestMessage) -> Result<ResponseMessage, StatusCode> {
        let (op_tx, token) = {
            let run = self.run.lock();
            let Some(run) = run.as_ref() else {
                return Err(StatusCode::BadServerNotConnected);
            };
            (run.op_tx.clone(), run.token.clone())
        };

        let timeout = self.prepare_request(&mut request);
        let (operation, response_rx) = ServiceOperation::new(request);
        op_tx
            .send(operation)
            .map_err(|_| StatusCode::BadServerNotConnected)?;

        tokio::select! {
            _ = token.cancelled() => Err(StatusCode::BadRequestTimeout),
            result = tokio::time::timeout(timeout, response_rx) => match result {
                Err(_) => Err(StatusCode::BadRequestTimeout),
                // The operation was dropped with its channel.
                Ok(Err(_)) => Err(StatusCode::BadSecureChannelClosed),
                Ok(Ok(response)) => response,
            },
        }
    }

    /// Send a request, retrying with the given policy when it fails with a
    /// retryable status. Only use this for idempotent operations; the engine
    /// itself never retries.
    pub async fn request_with_retry(
        &self,
        request: RequestMessage,
        mut policy: impl RequestRetryPolicy,
    ) -> Result<ResponseMessage, StatusCode> {
        loop {
            match self.request(request.clone()).await {
                Ok(response) => break Ok(response),
                Err(status) => {
                    if let Some(delay) = policy.get_next_delay(status) {
                        session_debug!(self, "Request failed with {status}, retrying after {delay:?}");
                        tokio::time::sleep(delay).await;
                    } else {
                        break Err(status);
                    }
                }
            }
        }
    }

    /// Register a subscription built with [`SubscriptionBuilder`]. If the
    /// session is open the subscription is created on the server immediately,
    /// otherwise on the next successful connection. The returned handle owns
    /// the registration; dropping it deletes the subscription.
    pub fn add_subscription(&self, builder: SubscriptionBuilder) -> SubscriptionHandle {
        let (subscription, entry_id) = self.core.registry.add(builder.build());
        session_debug!(
            self,
            "Added subscription entry {entry_id} with {} items",
            subscription.monitored_items().len()
        );
        SubscriptionHandle {
            subscription,
            registry: Arc::downgrade(&self.core.registry),
            entry_id,
        }
    }

    /// Remove a subscription. Equivalent to dropping the handle.
    pub fn remove_subscription(&self, handle: SubscriptionHandle) {
        drop(handle);
    }

    /// Stop the supervisor and close the connection, waiting up to five
    /// seconds for a graceful shutdown. Queued requests fail, subscription
    /// definitions are retained and recreated on [`SessionClient::resume`].
    pub async fn suspend(&self) {
        let run = self.run.lock().take();
        let Some(mut run) = run else { return };
        session_debug!(self, "Suspending session");
        run.token.cancel();
        drop(run.op_tx);
        if tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut run.handle)
            .await
            .is_err()
        {
            session_error!(self, "Supervisor did not stop within the grace period");
            run.handle.abort();
        }
    }

    /// Restart the supervisor after [`SessionClient::suspend`]. A no-op when
    /// the session is already running or was disposed.
    pub fn resume(&self) {
        if self.disposed.load(Ordering::Relaxed) {
            return;
        }
        let mut run = self.run.lock();
        if run.is_some() {
            return;
        }
        session_debug!(self, "Starting session supervisor");
        self.core.set_state(ConnectionState::Created);
        let (op_tx, op_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let supervisor = Supervisor::new(self.core.clone(), op_rx, token.clone());
        let handle = tokio::spawn(supervisor.run());
        *run = Some(RunState {
            op_tx,
            token,
            handle,
        });
    }

    /// Tear the session down for good. Idempotent; waits up to five seconds
    /// for a graceful shutdown.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.suspend().await;
    }

    fn prepare_request(&self, request: &mut RequestMessage) -> Duration {
        let config = &self.core.config;
        let header = request.request_header_mut();
        if header.timeout_hint == 0 {
            header.timeout_hint = config.request_timeout.as_millis().min(u32::MAX as u128) as u32;
        }
        if header.timestamp.is_null() {
            header.timestamp = DateTime::now();
        }
        if header.request_handle == 0 {
            header.request_handle = self.core.next_request_handle();
        }
        if header.return_diagnostics.is_empty() {
            header.return_diagnostics = DiagnosticBits::from_bits_truncate(config.return_diagnostics);
        }
        Duration::from_millis(header.timeout_hint as u64)
    }
}
