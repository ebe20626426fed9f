//! The subscription registry mirrors user declared subscriptions onto the
//! server: it recreates them after every reconnect, deletes them when their
//! owner goes away, and routes publish responses into their bindings.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use opcua_session_types::{
    CreateMonitoredItemsRequest, CreateSubscriptionRequest, DeleteSubscriptionsRequest,
    PublishResponse, ResponseMessage, SetPublishingModeRequest, StatusCode, TimestampsToReturn,
    WriteRequest, WriteValue,
};

use crate::channel::SessionChannel;
use crate::session::{
    process_service_result, process_unexpected_response, session_debug, session_error,
    session_warn, SessionCore,
};
use crate::sync::Mutex;

use super::binding::WriteBack;
use super::Subscription;

/// Publish retry delay when no subscription supplies an interval.
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

struct RegistryEntry {
    id: u64,
    subscription: Weak<Subscription>,
    /// Cache of the server id, so the subscription can be deleted after its
    /// owner is gone.
    server_id: u32,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<RegistryEntry>,
    next_entry_id: u64,
    /// Server ids of removed subscriptions awaiting a `DeleteSubscriptions`.
    pending_delete: Vec<u32>,
}

/// The registry itself. One per session client, shared between the user
/// surface, the reconcile loop and the publish pumps.
pub(crate) struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
    /// Bumped on every mutation, the reconcile loop watches it.
    change_tx: watch::Sender<u64>,
    /// Server id of the session's internal keep alive subscription. Its
    /// publish responses resolve to no user subscription and must not trigger
    /// orphan deletion.
    internal_subscription_id: AtomicU32,
    write_tx: mpsc::UnboundedSender<WriteBack>,
    /// Held by the reconcile loop while a connection is open. The queue
    /// itself outlives connections so writers stay valid across reconnects.
    write_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<WriteBack>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Arc<Self> {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (change_tx, _) = watch::channel(0);
        Arc::new(Self {
            state: Mutex::new(RegistryState::default()),
            change_tx,
            internal_subscription_id: AtomicU32::new(0),
            write_tx,
            write_rx: tokio::sync::Mutex::new(write_rx),
        })
    }

    /// Register a subscription, returning the shared object and its entry id.
    pub fn add(&self, subscription: Subscription) -> (Arc<Subscription>, u64) {
        for item in subscription.monitored_items() {
            item.attach_write_queue(&self.write_tx);
        }
        let subscription = Arc::new(subscription);
        let id = {
            let mut state = self.state.lock();
            let id = state.next_entry_id;
            state.next_entry_id += 1;
            state.entries.push(RegistryEntry {
                id,
                subscription: Arc::downgrade(&subscription),
                server_id: 0,
            });
            id
        };
        self.notify_change();
        (subscription, id)
    }

    /// Remove a subscription by entry id, scheduling the server side deletion.
    pub fn remove(&self, entry_id: u64) {
        {
            let mut state = self.state.lock();
            let Some(index) = state.entries.iter().position(|e| e.id == entry_id) else {
                return;
            };
            let entry = state.entries.remove(index);
            if entry.server_id != 0 {
                state.pending_delete.push(entry.server_id);
            }
        }
        self.notify_change();
    }

    /// Zero every server id. Called whenever the channel leaves `Opened`.
    pub fn reset_server_state(&self) {
        let mut state = self.state.lock();
        for entry in &mut state.entries {
            entry.server_id = 0;
            if let Some(subscription) = entry.subscription.upgrade() {
                subscription.reset_server_state();
            }
        }
        // Deletions against the old session are meaningless now.
        state.pending_delete.clear();
        self.internal_subscription_id.store(0, Ordering::Relaxed);
    }

    pub fn set_internal_subscription_id(&self, id: u32) {
        self.internal_subscription_id.store(id, Ordering::Relaxed);
    }

    /// The smallest publishing interval of any live subscription, used by the
    /// publish pump to pace retries after an error.
    pub fn min_publishing_interval(&self) -> Duration {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter_map(|e| e.subscription.upgrade())
            .map(|s| s.params().publishing_interval)
            .min()
            .unwrap_or(DEFAULT_RETRY_INTERVAL)
    }

    fn notify_change(&self) {
        self.change_tx.send_modify(|version| *version += 1);
    }

    /// Dead entries whose subscriptions still exist on the server become
    /// pending deletions; live entries with no server id are returned for
    /// creation.
    fn snapshot(&self) -> (Vec<u32>, Vec<(u64, Arc<Subscription>)>) {
        let mut guard = self.state.lock();
        let RegistryState {
            entries,
            pending_delete,
            ..
        } = &mut *guard;
        let mut to_create = Vec::new();
        entries.retain(|entry| match entry.subscription.upgrade() {
            Some(subscription) => {
                if subscription.server_subscription_id() == 0 {
                    to_create.push((entry.id, subscription));
                }
                true
            }
            None => {
                if entry.server_id != 0 {
                    pending_delete.push(entry.server_id);
                }
                false
            }
        });
        let pending = std::mem::take(pending_delete);
        (pending, to_create)
    }

    fn set_entry_server_id(&self, entry_id: u64, server_id: u32) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == entry_id) {
            entry.server_id = server_id;
        }
    }

    /// Runs while a connection is open: recreates subscriptions on entry and
    /// on every registry change, drains the write back queue, and dispatches
    /// publish responses delivered through the channel's sink. A service
    /// failure faults the channel, which makes the supervisor reconnect.
    pub async fn reconcile_loop(
        self: Arc<Self>,
        core: Arc<SessionCore>,
        channel: Arc<dyn SessionChannel>,
        mut sink_rx: mpsc::UnboundedReceiver<PublishResponse>,
    ) {
        let mut change_rx = self.change_tx.subscribe();
        let mut write_rx = self.write_rx.lock().await;

        if let Err(e) = self.reconcile(&core, &channel).await {
            session_error!(core, "Failed to reconcile subscriptions: {e}");
            channel.fault(e);
            return;
        }

        loop {
            tokio::select! {
                changed = change_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if let Err(e) = self.reconcile(&core, &channel).await {
                        session_error!(core, "Failed to reconcile subscriptions: {e}");
                        channel.fault(e);
                        return;
                    }
                }
                write = write_rx.recv() => {
                    let Some(write) = write else { return };
                    self.process_write(&core, &channel, write).await;
                }
                response = sink_rx.recv() => {
                    let Some(response) = response else { return };
                    self.dispatch(&core, &channel, response);
                }
            }
        }
    }

    /// Bring the server in line with the registry: delete what was removed,
    /// create what is missing.
    async fn reconcile(
        &self,
        core: &Arc<SessionCore>,
        channel: &Arc<dyn SessionChannel>,
    ) -> Result<(), StatusCode> {
        let (pending_delete, to_create) = self.snapshot();

        if !pending_delete.is_empty() {
            self.delete_on_server(core, channel, pending_delete).await?;
        }

        for (entry_id, subscription) in to_create {
            let server_id = self.create_on_server(core, channel, &subscription).await?;
            self.set_entry_server_id(entry_id, server_id);
            session_debug!(
                core,
                "Created subscription {server_id} with {} monitored items",
                subscription.monitored_items().len()
            );
        }
        Ok(())
    }

    /// Create one subscription and its monitored items on the server.
    ///
    /// Item level failures are recorded on the item and kept, the subscription
    /// stays partially created. Only transport or service level failures
    /// propagate.
    async fn create_on_server(
        &self,
        core: &Arc<SessionCore>,
        channel: &Arc<dyn SessionChannel>,
        subscription: &Arc<Subscription>,
    ) -> Result<u32, StatusCode> {
        let params = subscription.params();
        let request = CreateSubscriptionRequest {
            request_header: core.make_request_header(core.config.request_timeout),
            requested_publishing_interval: params.publishing_interval.as_millis() as f64,
            requested_lifetime_count: params.requested_lifetime_count(core.config.session_timeout),
            requested_max_keep_alive_count: params.keep_alive_count,
            max_notifications_per_publish: params.max_notifications_per_publish,
            publishing_enabled: params.publishing_enabled,
            priority: params.priority,
        };
        let response = channel.request(request.into()).await?;
        let ResponseMessage::CreateSubscription(response) = response else {
            return Err(process_unexpected_response(response));
        };
        process_service_result(&response.response_header)?;
        let server_id = response.subscription_id;
        subscription.set_server_subscription_id(server_id);

        if !subscription.monitored_items().is_empty() {
            let request = CreateMonitoredItemsRequest {
                request_header: core.make_request_header(core.config.request_timeout),
                subscription_id: server_id,
                timestamps_to_return: TimestampsToReturn::Both,
                items_to_create: subscription
                    .monitored_items()
                    .iter()
                    .map(|item| item.create_request())
                    .collect(),
            };
            let response = channel.request(request.into()).await?;
            let ResponseMessage::CreateMonitoredItems(response) = response else {
                return Err(process_unexpected_response(response));
            };
            process_service_result(&response.response_header)?;
            if response.results.len() != subscription.monitored_items().len() {
                session_error!(core, "CreateMonitoredItems returned a result count mismatch");
                return Err(StatusCode::BadUnknownResponse);
            }
            for (item, result) in subscription.monitored_items().iter().zip(&response.results) {
                item.record_create_result(result.status_code);
                if result.status_code.is_bad() {
                    session_warn!(
                        core,
                        "Monitored item {} failed to create: {}",
                        item.node_id(),
                        result.status_code
                    );
                } else {
                    item.set_server_id(result.monitored_item_id);
                }
            }
        }

        if params.publishing_enabled {
            let request = SetPublishingModeRequest {
                request_header: core.make_request_header(core.config.request_timeout),
                publishing_enabled: true,
                subscription_ids: vec![server_id],
            };
            let response = channel.request(request.into()).await?;
            let ResponseMessage::SetPublishingMode(response) = response else {
                return Err(process_unexpected_response(response));
            };
            process_service_result(&response.response_header)?;
        }

        Ok(server_id)
    }

    async fn delete_on_server(
        &self,
        core: &Arc<SessionCore>,
        channel: &Arc<dyn SessionChannel>,
        subscription_ids: Vec<u32>,
    ) -> Result<(), StatusCode> {
        session_debug!(core, "Deleting subscriptions {subscription_ids:?}");
        let request = DeleteSubscriptionsRequest {
            request_header: core.make_request_header(core.config.request_timeout),
            subscription_ids,
        };
        let response = channel.request(request.into()).await?;
        match response {
            ResponseMessage::DeleteSubscriptions(_) => Ok(()),
            // The subscriptions may have expired on their own, that is fine.
            ResponseMessage::ServiceFault(fault)
                if matches!(
                    fault.response_header.service_result,
                    StatusCode::BadSubscriptionIdInvalid | StatusCode::BadNoSubscription
                ) =>
            {
                Ok(())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Issue one queued write back and record its outcome on the item. Write
    /// failures are user visible state, not connection faults.
    async fn process_write(
        &self,
        core: &Arc<SessionCore>,
        channel: &Arc<dyn SessionChannel>,
        write: WriteBack,
    ) {
        let request = WriteRequest {
            request_header: core.make_request_header(core.config.request_timeout),
            nodes_to_write: vec![WriteValue {
                node_id: write.node_id.clone(),
                attribute_id: write.attribute_id,
                index_range: write.index_range.clone(),
                value: write.value,
            }],
        };
        let status = match channel.request(request.into()).await {
            Ok(ResponseMessage::Write(response)) => {
                if response.response_header.service_result.is_bad() {
                    response.response_header.service_result
                } else {
                    response
                        .results
                        .first()
                        .copied()
                        .unwrap_or(StatusCode::BadUnknownResponse)
                }
            }
            Ok(other) => process_unexpected_response(other),
            Err(e) => e,
        };
        if status.is_bad() {
            session_warn!(core, "Write back to {} failed: {status}", write.node_id);
        }
        let mut state = write.status.lock();
        state.write_status = Some(status);
        if status.is_bad() {
            state.last_error = Some(status);
        }
    }

    /// Route a publish response to its subscription. Responses for the
    /// internal keep alive subscription carry nothing and are dropped;
    /// responses that resolve to no live subscription trigger an out of band
    /// deletion without blocking the caller.
    pub fn dispatch(
        &self,
        core: &Arc<SessionCore>,
        channel: &Arc<dyn SessionChannel>,
        response: PublishResponse,
    ) {
        let subscription_id = response.subscription_id;
        if subscription_id == self.internal_subscription_id.load(Ordering::Relaxed) {
            return;
        }
        let target = {
            let state = self.state.lock();
            state.entries.iter().find_map(|entry| {
                entry
                    .subscription
                    .upgrade()
                    .filter(|s| s.server_subscription_id() == subscription_id)
            })
        };
        match target {
            Some(subscription) => subscription.on_notification(response.notification_message),
            None => {
                session_debug!(
                    core,
                    "Publish response for unknown subscription {subscription_id}, deleting it"
                );
                self.delete_orphan(core, channel, subscription_id);
            }
        }
    }

    /// Delete a subscription that no longer has a live owner, on a detached
    /// task so the publish pump never waits on it.
    fn delete_orphan(
        &self,
        core: &Arc<SessionCore>,
        channel: &Arc<dyn SessionChannel>,
        subscription_id: u32,
    ) {
        {
            // Drop the dead entry so the deletion happens only once.
            let mut state = self.state.lock();
            state.entries.retain(|entry| {
                entry.subscription.strong_count() > 0 || entry.server_id != subscription_id
            });
        }
        let channel = channel.clone();
        let core = core.clone();
        let request = DeleteSubscriptionsRequest {
            request_header: core.make_request_header(core.config.request_timeout),
            subscription_ids: vec![subscription_id],
        };
        tokio::spawn(async move {
            if let Err(e) = channel.request(request.into()).await {
                session_debug!(core, "Failed to delete subscription {subscription_id}: {e}");
            }
        });
    }
}
