//! Declarative construction of subscriptions.
//!
//! A [`SubscriptionBuilder`] collects the subscription parameters and one
//! monitored item per bound field. Each item is declared by node id string and
//! finalized as one of the binding shapes: raw data value, unwrapped value,
//! data value queue, event record, or event queue. Node id strings are parsed
//! at declaration time, so a typo fails at construction rather than on the
//! server.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::mpsc;

use opcua_session_types::{
    AttributeId, DataChangeFilter, DataChangeTrigger, DataValue, DeadbandType, Error, EventFilter,
    FromVariant, MonitoringFilter, MonitoringMode, NodeId, Variant,
};

use crate::sync::Mutex;

use super::binding::{EventRecord, ItemBinding, ItemWriter};
use super::{DataValueReceiver, ItemStatus, MonitoredItem, Subscription, SubscriptionParameters};

/// Builder for a [`Subscription`] and its monitored items.
///
/// ```no_run
/// # use opcua_session_client::subscription::SubscriptionBuilder;
/// # use std::time::Duration;
/// # fn main() -> Result<(), opcua_session_types::Error> {
/// let mut builder = SubscriptionBuilder::new()
///     .publishing_interval(Duration::from_millis(500));
/// builder
///     .item("ns=2;s=Temp")?
///     .name("temperature")
///     .value::<f64>(|v| println!("temperature: {v}"));
/// let subscription = builder;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SubscriptionBuilder {
    params: SubscriptionParameters,
    items: Vec<MonitoredItem>,
}

impl SubscriptionBuilder {
    /// Create a builder with the default subscription parameters: a publishing
    /// interval of one second, a keep alive count of 10, a lifetime derived
    /// from the session timeout, and publishing enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the publishing interval.
    pub fn publishing_interval(mut self, interval: Duration) -> Self {
        self.params.publishing_interval = interval;
        self
    }

    /// Set the keep alive count.
    pub fn keep_alive_count(mut self, count: u32) -> Self {
        self.params.keep_alive_count = count;
        self
    }

    /// Set the lifetime count. Zero derives the lifetime from the session
    /// timeout.
    pub fn lifetime_count(mut self, count: u32) -> Self {
        self.params.lifetime_count = count;
        self
    }

    /// Set the maximum number of notifications per publish response.
    pub fn max_notifications_per_publish(mut self, max: u32) -> Self {
        self.params.max_notifications_per_publish = max;
        self
    }

    /// Set whether publishing starts enabled.
    pub fn publishing_enabled(mut self, enabled: bool) -> Self {
        self.params.publishing_enabled = enabled;
        self
    }

    /// Set the subscription priority.
    pub fn priority(mut self, priority: u8) -> Self {
        self.params.priority = priority;
        self
    }

    /// Declare a monitored item on the node given as a `ns=<n>;<t>=<v>`
    /// string. Fails if the string does not parse.
    pub fn item(&mut self, node_id: &str) -> Result<MonitoredItemBuilder<'_>, Error> {
        let parsed = NodeId::from_str(node_id)
            .map_err(|status| Error::new(status, format!("Cannot parse node id \"{node_id}\"")))?;
        Ok(self.node(parsed))
    }

    /// Declare a monitored item on an already parsed node id.
    pub fn node(&mut self, node_id: impl Into<NodeId>) -> MonitoredItemBuilder<'_> {
        MonitoredItemBuilder {
            parent: self,
            name: None,
            node_id: node_id.into(),
            attribute_id: None,
            index_range: None,
            monitoring_mode: MonitoringMode::Reporting,
            sampling_interval: -1.0,
            queue_size: 0,
            discard_oldest: true,
            trigger: DataChangeTrigger::StatusValue,
            deadband_type: DeadbandType::None,
            deadband_value: 0.0,
        }
    }

    /// The number of items declared so far.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn build(self) -> Subscription {
        Subscription::new(self.params, self.items)
    }
}

/// Builder for one monitored item, obtained from
/// [`SubscriptionBuilder::item`]. Configure the monitoring parameters, then
/// finalize with one of the binding methods.
pub struct MonitoredItemBuilder<'a> {
    parent: &'a mut SubscriptionBuilder,
    name: Option<String>,
    node_id: NodeId,
    attribute_id: Option<AttributeId>,
    index_range: Option<String>,
    monitoring_mode: MonitoringMode,
    sampling_interval: f64,
    queue_size: u32,
    discard_oldest: bool,
    trigger: DataChangeTrigger,
    deadband_type: DeadbandType,
    deadband_value: f64,
}

impl std::fmt::Debug for MonitoredItemBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredItemBuilder")
            .field("name", &self.name)
            .field("node_id", &self.node_id)
            .field("attribute_id", &self.attribute_id)
            .field("index_range", &self.index_range)
            .field("monitoring_mode", &self.monitoring_mode)
            .field("sampling_interval", &self.sampling_interval)
            .field("queue_size", &self.queue_size)
            .field("discard_oldest", &self.discard_oldest)
            .field("trigger", &self.trigger)
            .field("deadband_type", &self.deadband_type)
            .field("deadband_value", &self.deadband_value)
            .finish_non_exhaustive()
    }
}

impl<'a> MonitoredItemBuilder<'a> {
    /// Name the item. Named items surface their bad statuses through
    /// [`Subscription::errors`].
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the attribute to monitor. Defaults to `Value` for data bindings and
    /// `EventNotifier` for event bindings.
    pub fn attribute(mut self, attribute_id: AttributeId) -> Self {
        self.attribute_id = Some(attribute_id);
        self
    }

    /// Set the index range into an array valued attribute.
    pub fn index_range(mut self, index_range: impl Into<String>) -> Self {
        self.index_range = Some(index_range.into());
        self
    }

    /// Set the monitoring mode. Defaults to `Reporting`.
    pub fn monitoring_mode(mut self, mode: MonitoringMode) -> Self {
        self.monitoring_mode = mode;
        self
    }

    /// Set the sampling interval in milliseconds. Defaults to -1, the
    /// subscription's publishing interval.
    pub fn sampling_interval(mut self, interval: f64) -> Self {
        self.sampling_interval = interval;
        self
    }

    /// Set the server side queue size. Defaults to 0, the server default.
    pub fn queue_size(mut self, queue_size: u32) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Set whether the oldest queued notification is discarded on overflow.
    /// Defaults to true.
    pub fn discard_oldest(mut self, discard_oldest: bool) -> Self {
        self.discard_oldest = discard_oldest;
        self
    }

    /// Set the data change trigger. Defaults to `StatusValue`.
    pub fn trigger(mut self, trigger: DataChangeTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set a deadband on value changes.
    pub fn deadband(mut self, deadband_type: DeadbandType, deadband_value: f64) -> Self {
        self.deadband_type = deadband_type;
        self.deadband_value = deadband_value;
        self
    }

    /// Bind the raw [`DataValue`] to a callback.
    pub fn data_value(self, callback: impl FnMut(DataValue) + Send + 'static) {
        let filter = self.data_change_filter();
        self.finish(
            AttributeId::Value,
            filter,
            ItemBinding::DataValue(Box::new(callback)),
        );
    }

    /// Bind the unwrapped value, coerced to `T`, to a callback. If a received
    /// value cannot be coerced the callback receives `T::default()`.
    pub fn value<T>(self, mut callback: impl FnMut(T) + Send + 'static)
    where
        T: FromVariant + Default + Send + 'static,
    {
        let filter = self.data_change_filter();
        let apply = move |data: DataValue| {
            let value = data
                .value
                .and_then(|v| v.try_cast_to::<T>())
                .unwrap_or_default();
            callback(value);
        };
        self.finish(AttributeId::Value, filter, ItemBinding::Value(Box::new(apply)));
    }

    /// Bind raw data values to a queue owned by the caller. The queue is
    /// unbounded, it grows if the caller does not drain it.
    pub fn data_value_queue(self) -> DataValueReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = self.data_change_filter();
        self.finish(AttributeId::Value, filter, ItemBinding::DataValueQueue(tx));
        rx
    }

    /// Bind the unwrapped value like [`Self::value`], and additionally return
    /// a writer that writes user side changes back to the monitored attribute.
    pub fn value_writable<T>(self, mut callback: impl FnMut(T) + Send + 'static) -> ItemWriter<T>
    where
        T: FromVariant + Default + Into<Variant> + Send + 'static,
    {
        let node_id = self.node_id.clone();
        let attribute_id = self.attribute_id.unwrap_or(AttributeId::Value);
        let index_range = self.index_range.clone();
        let filter = self.data_change_filter();
        let apply = move |data: DataValue| {
            let value = data
                .value
                .and_then(|v| v.try_cast_to::<T>())
                .unwrap_or_default();
            callback(value);
        };
        let (status, slot) = self.finish(
            AttributeId::Value,
            filter,
            ItemBinding::Value(Box::new(apply)),
        );
        ItemWriter::new(node_id, attribute_id as u32, index_range, status, slot)
    }

    /// Bind events decoded into `E` to a callback. The select clauses are
    /// derived from the record; the monitored attribute defaults to
    /// `EventNotifier`.
    pub fn event<E: EventRecord>(self, mut callback: impl FnMut(E) + Send + 'static) {
        let filter = MonitoringFilter::Event(EventFilter {
            select_clauses: E::select_clauses(),
        });
        let apply = move |fields: Vec<Variant>| callback(E::from_event_fields(&fields));
        self.finish(
            AttributeId::EventNotifier,
            filter,
            ItemBinding::Event(Box::new(apply)),
        );
    }

    /// Bind events decoded into `E` to a queue owned by the caller.
    pub fn event_queue<E: EventRecord>(self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = MonitoringFilter::Event(EventFilter {
            select_clauses: E::select_clauses(),
        });
        let apply = move |fields: Vec<Variant>| {
            let _ = tx.send(E::from_event_fields(&fields));
        };
        self.finish(
            AttributeId::EventNotifier,
            filter,
            ItemBinding::EventQueue(Box::new(apply)),
        );
        rx
    }

    fn data_change_filter(&self) -> MonitoringFilter {
        if self.deadband_type != DeadbandType::None
            || self.trigger != DataChangeTrigger::StatusValue
        {
            MonitoringFilter::DataChange(DataChangeFilter {
                trigger: self.trigger,
                deadband_type: self.deadband_type,
                deadband_value: self.deadband_value,
            })
        } else {
            MonitoringFilter::None
        }
    }

    fn finish(
        self,
        default_attribute: AttributeId,
        filter: MonitoringFilter,
        binding: ItemBinding,
    ) -> (
        Arc<Mutex<ItemStatus>>,
        Arc<ArcSwapOption<mpsc::UnboundedSender<super::binding::WriteBack>>>,
    ) {
        let status = Arc::new(Mutex::new(ItemStatus::default()));
        let slot = Arc::new(ArcSwapOption::empty());
        let item = MonitoredItem::new(
            self.name,
            self.node_id,
            self.attribute_id.unwrap_or(default_attribute),
            self.index_range,
            self.monitoring_mode,
            self.sampling_interval,
            filter,
            self.queue_size,
            self.discard_oldest,
            status.clone(),
            slot.clone(),
            binding,
        );
        self.parent.items.push(item);
        (status, slot)
    }
}
