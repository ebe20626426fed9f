//! Pending service operations and the pipe that drains them into the live
//! channel.
//!
//! Callers enqueue [`ServiceOperation`]s at any time; while a channel is open
//! the supervisor runs [`run_request_pipe`] against the queue. The pipe is
//! dropped the moment the channel leaves `Opened`, which drops the in flight
//! operations' responders and fails their callers; operations still queued
//! stay queued for the next connection, bounded by each caller's timeout.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot};

use opcua_session_types::{RequestMessage, ResponseMessage, StatusCode};

use crate::channel::SessionChannel;

/// One pending request: the message and the slot its response is delivered
/// into. Completed exactly once, by a response, an error, or by being dropped
/// with its channel.
pub(crate) struct ServiceOperation {
    request: RequestMessage,
    responder: oneshot::Sender<Result<ResponseMessage, StatusCode>>,
}

impl ServiceOperation {
    /// Create an operation and the receiver its caller waits on.
    pub fn new(
        request: RequestMessage,
    ) -> (
        Self,
        oneshot::Receiver<Result<ResponseMessage, StatusCode>>,
    ) {
        let (responder, receiver) = oneshot::channel();
        (Self { request, responder }, receiver)
    }

    /// Send the request on the channel and deliver the outcome. The caller may
    /// be gone already, e.g. after timing out, in which case the outcome is
    /// discarded.
    async fn execute(self, channel: Arc<dyn SessionChannel>) {
        let result = channel.request(self.request).await;
        let _ = self.responder.send(result);
    }
}

/// Drain the queue into `channel` until the queue closes or this future is
/// dropped. Operations run concurrently, responses are delivered as they
/// arrive.
pub(crate) async fn run_request_pipe(
    queue: &mut mpsc::UnboundedReceiver<ServiceOperation>,
    channel: Arc<dyn SessionChannel>,
) {
    let mut in_flight = FuturesUnordered::new();
    loop {
        tokio::select! {
            operation = queue.recv() => {
                let Some(operation) = operation else {
                    // The client was suspended or disposed. Let the in flight
                    // operations finish.
                    while in_flight.next().await.is_some() {}
                    return;
                };
                in_flight.push(operation.execute(channel.clone()));
            }
            Some(()) = in_flight.next() => {}
        }
    }
}
