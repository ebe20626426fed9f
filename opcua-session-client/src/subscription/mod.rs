//! Client side subscriptions: the user declared subscription object, its
//! monitored items and their bindings, the builder that assembles them, and
//! the registry that mirrors them onto the server.

mod binding;
mod builder;
pub(crate) mod publish;
pub(crate) mod registry;

pub use binding::{EventRecord, ItemWriter};
pub use builder::{MonitoredItemBuilder, SubscriptionBuilder};
pub(crate) use registry::SubscriptionRegistry;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use hashbrown::HashMap;
use log::{debug, warn};
use tokio::sync::mpsc;

use opcua_session_types::{
    AttributeId, DataValue, MonitoredItemCreateRequest, MonitoringFilter, MonitoringMode,
    MonitoringParameters, NodeId, NotificationData, NotificationMessage, ReadValueId, StatusCode,
};

use crate::sync::Mutex;
use binding::{ItemBinding, WriteBack};

/// Client assigned monitored item handles are unique within the process and
/// survive reconnects, they are what routes notifications back to bindings.
static NEXT_CLIENT_HANDLE: AtomicU32 = AtomicU32::new(1000);

pub(crate) fn next_client_handle() -> u32 {
    NEXT_CLIENT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// The parameters a subscription is created on the server with.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionParameters {
    /// The cyclic rate the server returns notifications at.
    pub publishing_interval: Duration,
    /// Publishing intervals without notifications before the server sends a
    /// keep alive message.
    pub keep_alive_count: u32,
    /// Publishing intervals without an available publish request before the
    /// server deletes the subscription. Zero derives the count from the
    /// session timeout.
    pub lifetime_count: u32,
    /// Maximum notifications per publish response, 0 for no limit.
    pub max_notifications_per_publish: u32,
    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
    /// Relative priority against the session's other subscriptions.
    pub priority: u8,
}

impl Default for SubscriptionParameters {
    fn default() -> Self {
        Self {
            publishing_interval: Duration::from_millis(1000),
            keep_alive_count: 10,
            lifetime_count: 0,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        }
    }
}

impl SubscriptionParameters {
    /// The lifetime count actually requested from the server. A configured
    /// count of zero derives one from the session timeout, so the subscription
    /// outlives exactly one session that stops publishing. Either way the
    /// count is at least three times the keep alive count, as the protocol
    /// requires.
    pub(crate) fn requested_lifetime_count(&self, session_timeout_ms: u32) -> u32 {
        let requested = if self.lifetime_count == 0 {
            let interval = self.publishing_interval.as_millis().max(1) as u64;
            let timeout = session_timeout_ms as u64;
            ((timeout + interval - 1) / interval).min(u32::MAX as u64) as u32
        } else {
            self.lifetime_count
        };
        requested.max(self.keep_alive_count.saturating_mul(3))
    }
}

/// Shared per-item status record, written by the registry and read through the
/// item and its writer.
#[derive(Debug, Default)]
pub(crate) struct ItemStatus {
    pub create_status: Option<StatusCode>,
    pub notification_status: Option<StatusCode>,
    pub write_status: Option<StatusCode>,
    pub last_error: Option<StatusCode>,
}

impl ItemStatus {
    fn record(&mut self, status: StatusCode) {
        if status.is_bad() {
            self.last_error = Some(status);
        }
    }
}

/// One monitored item of a subscription: what to watch on the server, and the
/// binding notifications are routed into.
pub struct MonitoredItem {
    name: Option<String>,
    node_id: NodeId,
    attribute_id: AttributeId,
    index_range: Option<String>,
    monitoring_mode: MonitoringMode,
    sampling_interval: f64,
    filter: MonitoringFilter,
    queue_size: u32,
    discard_oldest: bool,
    client_handle: u32,
    server_id: AtomicU32,
    status: Arc<Mutex<ItemStatus>>,
    write_slot: Arc<ArcSwapOption<mpsc::UnboundedSender<WriteBack>>>,
    binding: Mutex<ItemBinding>,
}

impl MonitoredItem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: Option<String>,
        node_id: NodeId,
        attribute_id: AttributeId,
        index_range: Option<String>,
        monitoring_mode: MonitoringMode,
        sampling_interval: f64,
        filter: MonitoringFilter,
        queue_size: u32,
        discard_oldest: bool,
        status: Arc<Mutex<ItemStatus>>,
        write_slot: Arc<ArcSwapOption<mpsc::UnboundedSender<WriteBack>>>,
        binding: ItemBinding,
    ) -> Self {
        Self {
            name,
            node_id,
            attribute_id,
            index_range,
            monitoring_mode,
            sampling_interval,
            filter,
            queue_size,
            discard_oldest,
            client_handle: next_client_handle(),
            server_id: AtomicU32::new(0),
            status,
            write_slot,
            binding: Mutex::new(binding),
        }
    }

    /// The name given to the item at build time, the key of the error surface.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The node the item watches.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The attribute the item watches.
    pub fn attribute_id(&self) -> AttributeId {
        self.attribute_id
    }

    /// The client assigned handle. Unique within the process, stable across
    /// reconnects.
    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    /// The server assigned id, 0 while the item does not exist on the server.
    pub fn server_id(&self) -> u32 {
        self.server_id.load(Ordering::Relaxed)
    }

    /// The status the server returned when the item was last created, `None`
    /// before the first creation.
    pub fn create_status(&self) -> Option<StatusCode> {
        self.status.lock().create_status
    }

    /// The most recent bad status seen on this item from creation, a
    /// notification, or a write back.
    pub fn last_error(&self) -> Option<StatusCode> {
        self.status.lock().last_error
    }

    pub(crate) fn set_server_id(&self, id: u32) {
        self.server_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn record_create_result(&self, status: StatusCode) {
        let mut state = self.status.lock();
        state.create_status = Some(status);
        state.record(status);
    }

    fn record_notification_status(&self, status: StatusCode) {
        let mut state = self.status.lock();
        state.notification_status = Some(status);
        state.record(status);
    }

    pub(crate) fn attach_write_queue(&self, tx: &mpsc::UnboundedSender<WriteBack>) {
        self.write_slot.store(Some(Arc::new(tx.clone())));
    }

    /// The create request sent when the item is (re)created on the server.
    pub(crate) fn create_request(&self) -> MonitoredItemCreateRequest {
        MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId {
                node_id: self.node_id.clone(),
                attribute_id: self.attribute_id as u32,
                index_range: self.index_range.clone(),
            },
            monitoring_mode: self.monitoring_mode,
            requested_parameters: MonitoringParameters {
                client_handle: self.client_handle,
                sampling_interval: self.sampling_interval,
                filter: self.filter.clone(),
                queue_size: self.queue_size,
                discard_oldest: self.discard_oldest,
            },
        }
    }
}

/// A user declared subscription: creation parameters plus an ordered set of
/// monitored items. Build one with [`SubscriptionBuilder`] and register it
/// with [`crate::SessionClient::add_subscription`]; the registry then keeps it
/// alive on the server for as long as the returned handle lives.
pub struct Subscription {
    params: SubscriptionParameters,
    server_id: AtomicU32,
    items: Vec<MonitoredItem>,
    handles: HashMap<u32, usize>,
}

impl Subscription {
    pub(crate) fn new(params: SubscriptionParameters, items: Vec<MonitoredItem>) -> Self {
        let handles = items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.client_handle(), index))
            .collect();
        Self {
            params,
            server_id: AtomicU32::new(0),
            items,
            handles,
        }
    }

    /// The parameters the subscription is created with.
    pub fn params(&self) -> &SubscriptionParameters {
        &self.params
    }

    /// The server assigned subscription id. Non-zero only while the session's
    /// channel is open and the subscription exists on the server.
    pub fn server_subscription_id(&self) -> u32 {
        self.server_id.load(Ordering::Relaxed)
    }

    /// The monitored items of the subscription, in declaration order.
    pub fn monitored_items(&self) -> &[MonitoredItem] {
        &self.items
    }

    /// Bad statuses recorded on named items, keyed by item name.
    pub fn errors(&self) -> Vec<(String, StatusCode)> {
        self.items
            .iter()
            .filter_map(|item| {
                let name = item.name()?;
                let status = item.last_error()?;
                Some((name.to_string(), status))
            })
            .collect()
    }

    pub(crate) fn set_server_subscription_id(&self, id: u32) {
        self.server_id.store(id, Ordering::Relaxed);
    }

    /// Zero the server ids of the subscription and all its items, making the
    /// subscription eligible for recreation on the next reconcile.
    pub(crate) fn reset_server_state(&self) {
        self.server_id.store(0, Ordering::Relaxed);
        for item in &self.items {
            item.set_server_id(0);
        }
    }

    fn item_by_handle(&self, client_handle: u32) -> Option<&MonitoredItem> {
        self.handles
            .get(&client_handle)
            .and_then(|index| self.items.get(*index))
    }

    /// Route one notification message into the item bindings. Unknown client
    /// handles are ignored, they are transient while reconnecting.
    pub(crate) fn on_notification(&self, message: NotificationMessage) {
        for data in message.notification_data {
            match data {
                NotificationData::DataChange(notification) => {
                    for notif in notification.monitored_items {
                        let Some(item) = self.item_by_handle(notif.client_handle) else {
                            debug!(
                                "Discarding notification for unknown client handle {}",
                                notif.client_handle
                            );
                            continue;
                        };
                        if notif.value.status().is_bad() {
                            item.record_notification_status(notif.value.status());
                        }
                        item.binding.lock().apply_data_value(notif.value);
                    }
                }
                NotificationData::Events(notification) => {
                    for notif in notification.events {
                        let Some(item) = self.item_by_handle(notif.client_handle) else {
                            debug!(
                                "Discarding event for unknown client handle {}",
                                notif.client_handle
                            );
                            continue;
                        };
                        item.binding.lock().apply_event(notif.event_fields);
                    }
                }
                NotificationData::StatusChange(notification) => {
                    warn!(
                        "Subscription {} changed state on the server: {}",
                        self.server_subscription_id(),
                        notification.status
                    );
                    if notification.status.is_bad() {
                        // The server side subscription is gone, e.g. it timed
                        // out. The registry recreates it on the next open.
                        self.reset_server_state();
                    }
                }
            }
        }
    }
}

/// Owns a registered subscription. Dropping the handle removes the
/// subscription from the registry and deletes it on the server.
pub struct SubscriptionHandle {
    pub(crate) subscription: Arc<Subscription>,
    pub(crate) registry: Weak<SubscriptionRegistry>,
    pub(crate) entry_id: u64,
}

impl SubscriptionHandle {
    /// The subscription this handle owns.
    pub fn subscription(&self) -> &Arc<Subscription> {
        &self.subscription
    }

    /// The server assigned subscription id, 0 while unbound.
    pub fn server_subscription_id(&self) -> u32 {
        self.subscription.server_subscription_id()
    }

    /// Bad statuses recorded on named items, keyed by item name.
    pub fn errors(&self) -> Vec<(String, StatusCode)> {
        self.subscription.errors()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.entry_id);
        }
    }
}

/// A raw data value received on a queue binding.
pub type DataValueReceiver = mpsc::UnboundedReceiver<DataValue>;
