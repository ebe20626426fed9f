//! The publish pump: the pull half of the subscription machinery.
//!
//! Several pump tasks run concurrently per connection so the server's publish
//! queue stays fed even while one request is in flight or stuck. Each task
//! piggybacks the acknowledgement for the notification message it just
//! received onto its next publish request. Acknowledgements are idempotent
//! keyed by `(subscription_id, sequence_number)`, so the interleaving between
//! tasks is harmless.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use opcua_session_types::{
    PublishRequest, ResponseMessage, StatusCode, SubscriptionAcknowledgement,
};

use crate::channel::SessionChannel;
use crate::session::{session_warn, SessionCore};

use super::SubscriptionRegistry;

/// Number of publish requests kept in flight per connection. Enough to keep
/// the server publishing continuously while tolerating one stuck request.
pub(crate) const PUBLISH_PIPELINE_DEPTH: usize = 3;

/// One publish task. Loops until cancelled or the pump future is dropped with
/// its connection.
pub(crate) async fn publish_pump(
    core: Arc<SessionCore>,
    registry: Arc<SubscriptionRegistry>,
    channel: Arc<dyn SessionChannel>,
    token: CancellationToken,
) {
    let mut acknowledgements: Vec<SubscriptionAcknowledgement> = Vec::new();
    loop {
        if token.is_cancelled() {
            return;
        }
        let request = PublishRequest {
            request_header: core.make_request_header(core.config.publish_timeout),
            subscription_acknowledgements: std::mem::take(&mut acknowledgements),
        };
        match channel.request(request.into()).await {
            Ok(ResponseMessage::Publish(response)) => {
                if response.response_header.service_result.is_bad() {
                    publish_error_delay(&registry, &token, response.response_header.service_result)
                        .await;
                    continue;
                }
                // The next publish from this task acknowledges exactly the
                // message received here.
                acknowledgements = vec![SubscriptionAcknowledgement {
                    subscription_id: response.subscription_id,
                    sequence_number: response.notification_message.sequence_number,
                }];
                registry.dispatch(&core, &channel, *response);
            }
            Ok(other) => {
                session_warn!(
                    core,
                    "Publish returned an unexpected {} response",
                    other.type_name()
                );
                publish_error_delay(&registry, &token, StatusCode::BadUnknownResponse).await;
            }
            Err(e) => {
                publish_error_delay(&registry, &token, e).await;
            }
        }
    }
}

/// After a publish failure, wait one publishing interval and resume with an
/// empty acknowledgement list. Errors never cancel the pump; the channel's
/// completion future ends the connection when the failure was fatal.
async fn publish_error_delay(
    registry: &Arc<SubscriptionRegistry>,
    token: &CancellationToken,
    status: StatusCode,
) {
    let delay = registry.min_publishing_interval();
    log::debug!("Publish failed with {status}, retrying in {delay:?}");
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}
