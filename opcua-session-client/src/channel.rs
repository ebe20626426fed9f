//! The contract between the session engine and the secure channel that carries
//! its messages.
//!
//! The engine owns no sockets and no cryptography. Per connection attempt it
//! asks a [`ChannelConnector`] for a fresh [`SessionChannel`], opens it, and
//! drives requests through it until the channel leaves [`ConnectionState::Opened`].
//! The concrete channel is expected to perform endpoint discovery (when it was
//! given a discovery URL rather than an endpoint), the secure channel
//! handshake, and `CreateSession`/`ActivateSession`, all inside
//! [`SessionChannel::open`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use opcua_session_types::{
    ApplicationDescription, EndpointDescription, PublishResponse, RequestMessage, ResponseMessage,
    StatusCode, UserIdentity,
};

use crate::config::TransportLimits;

/// The lifecycle states of a channel, and of the session client supervising it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, not yet connecting.
    Created,
    /// Connecting: discovery, handshake, session creation and activation.
    Opening,
    /// Connected and usable. Requests flow only in this state.
    Opened,
    /// Graceful shutdown in progress.
    Closing,
    /// Shut down.
    Closed,
    /// Failed. A channel never leaves this state; the supervisor replaces it.
    Faulted,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Opening => "Opening",
            Self::Opened => "Opened",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
            Self::Faulted => "Faulted",
        };
        write!(f, "{}", s)
    }
}

/// Where the channel should connect to: either a fully described endpoint, or
/// a URL to run discovery against.
#[derive(Debug, Clone)]
pub enum EndpointSource {
    /// An endpoint the caller already knows. No discovery is performed.
    Endpoint(EndpointDescription),
    /// A server URL. The channel fetches the server's endpoints during `open`
    /// and picks the most secure one, see [`crate::discovery::select_endpoint`].
    DiscoveryUrl(String),
}

impl EndpointSource {
    /// The URL this source points at.
    pub fn url(&self) -> &str {
        match self {
            Self::Endpoint(endpoint) => &endpoint.endpoint_url,
            Self::DiscoveryUrl(url) => url,
        }
    }
}

impl From<EndpointDescription> for EndpointSource {
    fn from(value: EndpointDescription) -> Self {
        Self::Endpoint(value)
    }
}

impl From<&str> for EndpointSource {
    fn from(value: &str) -> Self {
        Self::DiscoveryUrl(value.to_string())
    }
}

impl From<String> for EndpointSource {
    fn from(value: String) -> Self {
        Self::DiscoveryUrl(value)
    }
}

/// Supplies the user identity the channel activates its session with. Resolved
/// once per open attempt, after the endpoint is known, so the identity can
/// depend on what the endpoint supports.
pub trait IdentityProvider: Send + Sync {
    /// The identity to activate the session with on the given endpoint.
    fn user_identity(&self, endpoint: &EndpointDescription) -> UserIdentity;
}

impl<F> IdentityProvider for F
where
    F: Fn(&EndpointDescription) -> UserIdentity + Send + Sync,
{
    fn user_identity(&self, endpoint: &EndpointDescription) -> UserIdentity {
        self(endpoint)
    }
}

/// An identity provider that always yields the anonymous identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn user_identity(&self, _endpoint: &EndpointDescription) -> UserIdentity {
        UserIdentity::Anonymous
    }
}

/// Everything a connector needs to establish a session: who we are, where to
/// connect, how to authenticate, and the session and transport parameters.
#[derive(Clone)]
pub struct SessionInfo {
    /// Description of this application, sent when creating the session.
    pub application: ApplicationDescription,
    /// Where to connect.
    pub endpoint: EndpointSource,
    /// How to authenticate.
    pub identity_provider: Arc<dyn IdentityProvider>,
    /// The name of the session on the server.
    pub session_name: String,
    /// The session timeout requested from the server, in milliseconds.
    pub requested_session_timeout: u32,
    /// Preferred locales for localized strings, in order of preference.
    pub preferred_locales: Vec<String>,
    /// Transport sizing parameters.
    pub transport: TransportLimits,
}

impl std::fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("application", &self.application)
            .field("endpoint", &self.endpoint)
            .field("session_name", &self.session_name)
            .field("requested_session_timeout", &self.requested_session_timeout)
            .field("preferred_locales", &self.preferred_locales)
            .field("transport", &self.transport)
            .finish()
    }
}

/// A channel that carries one session on one server.
///
/// Notes for implementors:
///
/// - `open` performs everything needed to go from `Created` to `Opened`:
///   discovery when only a URL is known, the secure channel handshake, and
///   `CreateSession` plus `ActivateSession`. It must populate the namespace
///   and server URI tables before returning.
/// - `close` aborts when the state is `Created`, `Opening` or `Faulted`,
///   closes gracefully when `Opened`, and is a no-op otherwise.
/// - State transitions must be published on the watch channel in order, so
///   observers see each state at most once per transition.
/// - Publish responses that arrive without a waiting request, e.g. after the
///   requesting call already timed out, go to the linked sink rather than
///   being dropped.
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// The current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// A watch over lifecycle state transitions.
    fn state_watch(&self) -> watch::Receiver<ConnectionState>;

    /// The namespace table of the server, populated by `open`.
    fn namespace_uris(&self) -> Vec<String>;

    /// The server URI table of the server, populated by `open`.
    fn server_uris(&self) -> Vec<String>;

    /// Establish the connection and activate the session.
    async fn open(&self, cancel: CancellationToken) -> Result<(), StatusCode>;

    /// Shut the channel down, gracefully if it is open.
    async fn close(&self);

    /// Tear the channel down immediately.
    async fn abort(&self);

    /// Mark the channel faulted, waking everything waiting on it. Used by the
    /// engine when a service call fails in a way only a reconnect can fix.
    fn fault(&self, status: StatusCode);

    /// Send a request and wait for the matching response.
    async fn request(&self, request: RequestMessage) -> Result<ResponseMessage, StatusCode>;

    /// Deliver server initiated publish responses to `sink` until unlinked.
    /// Linking replaces any previous sink.
    fn link_publish_sink(&self, sink: mpsc::UnboundedSender<PublishResponse>);

    /// Stop delivering publish responses. Idempotent.
    fn unlink_publish_sink(&self);

    /// Resolves when the channel leaves [`ConnectionState::Opened`]. Resolves
    /// immediately if it is not currently open.
    async fn completion(&self) {
        let mut rx = self.state_watch();
        let _ = rx
            .wait_for(|state| !matches!(*state, ConnectionState::Opened))
            .await;
    }
}

/// Creates one channel per connection attempt. The channel owns one session on
/// the server; when the supervisor retries, it starts over with a new channel.
pub trait ChannelConnector: Send + Sync {
    /// Create a fresh, unopened channel for the given session parameters.
    fn create_channel(&self, session_info: &SessionInfo) -> Arc<dyn SessionChannel>;
}
