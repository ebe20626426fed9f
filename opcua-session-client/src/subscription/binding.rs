//! Monitored item bindings: how an incoming notification updates the user
//! model, and how a user side change is written back to the server.

use std::marker::PhantomData;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use log::debug;
use tokio::sync::mpsc;

use opcua_session_types::{
    DataValue, NodeId, SimpleAttributeOperand, StatusCode, Variant,
};

use crate::sync::Mutex;

use super::ItemStatus;

/// The binding of one monitored item: a single dispatch surface over the five
/// shapes a user can bind a field to. Which variant an item gets is decided by
/// the builder method that finalized it.
pub(crate) enum ItemBinding {
    /// The raw data value is handed to a user callback.
    DataValue(Box<dyn FnMut(DataValue) + Send>),
    /// The unwrapped value is coerced to the bound type and handed to a user
    /// callback; the bound type's default is used when coercion fails.
    Value(Box<dyn FnMut(DataValue) + Send>),
    /// Raw data values are appended to a user owned queue.
    DataValueQueue(mpsc::UnboundedSender<DataValue>),
    /// Event fields are decoded into a user record and handed to a callback.
    Event(Box<dyn FnMut(Vec<Variant>) + Send>),
    /// Decoded event records are appended to a user owned queue.
    EventQueue(Box<dyn FnMut(Vec<Variant>) + Send>),
}

impl ItemBinding {
    /// Apply a data change notification.
    pub fn apply_data_value(&mut self, value: DataValue) {
        match self {
            Self::DataValue(apply) | Self::Value(apply) => apply(value),
            Self::DataValueQueue(tx) => {
                // The user dropped the receiver. Values are discarded until the
                // subscription itself goes away.
                let _ = tx.send(value);
            }
            Self::Event(_) | Self::EventQueue(_) => {
                debug!("Discarding data change notification on an event binding");
            }
        }
    }

    /// Apply an event notification.
    pub fn apply_event(&mut self, fields: Vec<Variant>) {
        match self {
            Self::Event(apply) | Self::EventQueue(apply) => apply(fields),
            _ => {
                debug!("Discarding event notification on a data value binding");
            }
        }
    }
}

/// Implemented by user records bound to event monitored items. The select
/// clauses declare which event fields the server returns, and
/// `from_event_fields` decodes a notification's fields in that same order.
pub trait EventRecord: Send + 'static {
    /// The select clauses requested for this record, in field order.
    fn select_clauses() -> Vec<SimpleAttributeOperand>;

    /// Decode one notification, `fields` is in select clause order. Fields
    /// that failed to resolve on the server arrive as [`Variant::Empty`].
    fn from_event_fields(fields: &[Variant]) -> Self;
}

/// A write back request queued by an [`ItemWriter`], drained by the registry.
pub(crate) struct WriteBack {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: Option<String>,
    pub value: DataValue,
    pub status: Arc<Mutex<ItemStatus>>,
}

/// Writes user side values back to the attribute a monitored item watches.
///
/// Obtained from the builder for items declared writable. Each `set` queues a
/// `Write` service call; the outcome is recorded on the item's error surface
/// and readable through [`ItemWriter::last_status`]. Failed writes do not stop
/// later ones.
pub struct ItemWriter<T> {
    node_id: NodeId,
    attribute_id: u32,
    index_range: Option<String>,
    status: Arc<Mutex<ItemStatus>>,
    slot: Arc<ArcSwapOption<mpsc::UnboundedSender<WriteBack>>>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Into<Variant>> ItemWriter<T> {
    pub(crate) fn new(
        node_id: NodeId,
        attribute_id: u32,
        index_range: Option<String>,
        status: Arc<Mutex<ItemStatus>>,
        slot: Arc<ArcSwapOption<mpsc::UnboundedSender<WriteBack>>>,
    ) -> Self {
        Self {
            node_id,
            attribute_id,
            index_range,
            status,
            slot,
            _marker: PhantomData,
        }
    }

    /// Queue a write of `value` to the bound attribute.
    ///
    /// Fails with `BadInvalidState` when the subscription was never registered
    /// with a session, and `BadServerNotConnected` when the session has been
    /// disposed.
    pub fn set(&self, value: T) -> Result<(), StatusCode> {
        let Some(tx) = self.slot.load_full() else {
            return Err(StatusCode::BadInvalidState);
        };
        tx.send(WriteBack {
            node_id: self.node_id.clone(),
            attribute_id: self.attribute_id,
            index_range: self.index_range.clone(),
            value: DataValue::value_only(value.into()),
            status: self.status.clone(),
        })
        .map_err(|_| StatusCode::BadServerNotConnected)
    }

    /// The status of the most recent completed write, `None` before the first.
    pub fn last_status(&self) -> Option<StatusCode> {
        self.status.lock().write_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn value_binding_ignores_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut binding = ItemBinding::Value(Box::new(move |value| {
            sink.lock().push(value);
        }));
        binding.apply_event(vec![Variant::Empty]);
        assert!(seen.lock().is_empty());
        binding.apply_data_value(DataValue::value_only(1i32));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn queue_binding_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut binding = ItemBinding::DataValueQueue(tx);
        // Must not panic.
        binding.apply_data_value(DataValue::value_only(1i32));
    }

    #[test]
    fn writer_without_session_fails() {
        let writer: ItemWriter<f64> = ItemWriter::new(
            NodeId::new(2, "Temp"),
            13,
            None,
            Arc::new(Mutex::new(ItemStatus::default())),
            Arc::new(ArcSwapOption::empty()),
        );
        assert_eq!(writer.set(1.0), Err(StatusCode::BadInvalidState));
        assert_eq!(writer.last_status(), None);
    }
}
