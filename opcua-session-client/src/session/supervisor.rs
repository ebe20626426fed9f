//! The session supervisor: the state machine that keeps one logical session
//! open across connection failures.
//!
//! One supervisor task runs per session client. Each cycle it waits out the
//! current backoff, creates a fresh channel through the connector, opens it,
//! and runs the per-connection tasks until the first of them ends the cycle:
//! the channel leaving `Opened`, or cancellation. Opening successfully resets
//! the backoff to its initial delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use opcua_session_types::{CreateSubscriptionRequest, ResponseMessage, StatusCode};

use crate::channel::{ConnectionState, SessionChannel};
use crate::retry::ExponentialBackoff;
use crate::subscription::publish::{publish_pump, PUBLISH_PIPELINE_DEPTH};
use crate::subscription::SubscriptionParameters;

use super::operations::{run_request_pipe, ServiceOperation};
use super::{
    process_service_result, process_unexpected_response, session_debug, session_error,
    session_warn, SessionCore,
};

/// First reconnect delay. Doubles on every failed attempt.
const RECONNECT_INITIAL_SLEEP: Duration = Duration::from_millis(1000);
/// Ceiling on the reconnect delay.
const RECONNECT_MAX_SLEEP: Duration = Duration::from_millis(20_000);

pub(super) struct Supervisor {
    core: Arc<SessionCore>,
    op_rx: mpsc::UnboundedReceiver<ServiceOperation>,
    token: CancellationToken,
}

impl Supervisor {
    pub fn new(
        core: Arc<SessionCore>,
        op_rx: mpsc::UnboundedReceiver<ServiceOperation>,
        token: CancellationToken,
    ) -> Self {
        Self { core, op_rx, token }
    }

    pub async fn run(mut self) {
        let mut backoff =
            ExponentialBackoff::new(RECONNECT_MAX_SLEEP, None, RECONNECT_INITIAL_SLEEP);
        loop {
            // The backoff has no retry limit, next() always yields.
            let delay = backoff.next().unwrap_or(RECONNECT_MAX_SLEEP);
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.run_cycle().await {
                Ok(()) => backoff.reset(),
                Err(e) => {
                    session_warn!(self.core, "Failed to connect to server: {e}");
                }
            }

            if self.token.is_cancelled() {
                break;
            }
        }
        self.core.set_state(ConnectionState::Closed);
    }

    /// One connection cycle: open a fresh channel, run the per-connection
    /// tasks until the connection ends, then tear down. `Ok` means the channel
    /// reached `Opened`, whatever happened afterwards.
    async fn run_cycle(&mut self) -> Result<(), StatusCode> {
        let core = self.core.clone();
        let token = self.token.clone();

        core.set_state(ConnectionState::Opening);
        let channel = core.connector.create_channel(&core.session_info);

        let open_result = tokio::select! {
            _ = token.cancelled() => Err(StatusCode::BadRequestCancelledByClient),
            result = channel.open(token.child_token()) => result,
        };
        if let Err(e) = open_result {
            core.set_state(ConnectionState::Closing);
            channel.abort().await;
            core.set_state(ConnectionState::Closed);
            return Err(e);
        }

        core.namespace_uris.store(Arc::new(channel.namespace_uris()));
        core.server_uris.store(Arc::new(channel.server_uris()));

        if let Err(e) = self.create_internal_subscription(&channel).await {
            session_error!(core, "Failed to create the keep alive subscription: {e}");
            core.set_state(ConnectionState::Closing);
            channel.close().await;
            core.set_state(ConnectionState::Closed);
            return Err(e);
        }

        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        channel.link_publish_sink(sink_tx);
        core.set_state(ConnectionState::Opened);
        session_debug!(core, "Session is open");

        let registry = core.registry.clone();
        let pumps = futures::future::join_all((0..PUBLISH_PIPELINE_DEPTH).map(|_| {
            publish_pump(
                core.clone(),
                registry.clone(),
                channel.clone(),
                token.clone(),
            )
        }));
        tokio::select! {
            _ = token.cancelled() => {
                session_debug!(core, "Session shutting down");
            }
            _ = channel.completion() => {
                session_warn!(core, "Connection lost, will reconnect");
            }
            _ = registry.clone().reconcile_loop(core.clone(), channel.clone(), sink_rx) => {}
            _ = run_request_pipe(&mut self.op_rx, channel.clone()) => {}
            _ = pumps => {}
        }

        channel.unlink_publish_sink();
        core.set_state(ConnectionState::Closing);
        if channel.state() == ConnectionState::Opened {
            channel.close().await;
        } else {
            channel.abort().await;
        }
        registry.reset_server_state();
        core.internal_subscription_tx.send_replace(0);
        core.set_state(ConnectionState::Closed);
        Ok(())
    }

    /// Create the internal keep alive subscription. It has no monitored items;
    /// its purpose is to give the publish pump something to poll so the
    /// session sees continuous traffic, and its id doubles as a liveness
    /// indicator on the client surface.
    async fn create_internal_subscription(
        &self,
        channel: &Arc<dyn SessionChannel>,
    ) -> Result<u32, StatusCode> {
        let core = &self.core;
        let params = SubscriptionParameters {
            publishing_interval: core.config.keep_alive_interval,
            ..Default::default()
        };
        let request = CreateSubscriptionRequest {
            request_header: core.make_request_header(core.config.request_timeout),
            requested_publishing_interval: params.publishing_interval.as_millis() as f64,
            requested_lifetime_count: params.requested_lifetime_count(core.config.session_timeout),
            requested_max_keep_alive_count: params.keep_alive_count,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        };
        let response = channel.request(request.into()).await?;
        let ResponseMessage::CreateSubscription(response) = response else {
            return Err(process_unexpected_response(response));
        };
        process_service_result(&response.response_header)?;
        core.registry
            .set_internal_subscription_id(response.subscription_id);
        core.internal_subscription_tx
            .send_replace(response.subscription_id);
        session_debug!(
            core,
            "Created keep alive subscription {}",
            response.subscription_id
        );
        Ok(response.subscription_id)
    }
}
