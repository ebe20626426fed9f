// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The payloads of publish responses: notification messages and their contents.

use serde::{Deserialize, Serialize};

use crate::{
    data_value::DataValue,
    date_time::DateTime,
    status_code::StatusCode,
    variant::Variant,
};

/// Acknowledges a notification message so the server can release it. Keyed by
/// subscription id and sequence number, and idempotent under that key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAcknowledgement {
    /// The subscription the message belonged to.
    pub subscription_id: u32,
    /// The sequence number of the acknowledged message.
    pub sequence_number: u32,
}

/// One changed value of one monitored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemNotification {
    /// The client supplied handle of the monitored item.
    pub client_handle: u32,
    /// The changed value.
    pub value: DataValue,
}

/// A batch of data change notifications.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataChangeNotification {
    /// The changed values.
    pub monitored_items: Vec<MonitoredItemNotification>,
}

/// The field values of one event, in select clause order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFieldList {
    /// The client supplied handle of the monitored item.
    pub client_handle: u32,
    /// The selected fields of the event.
    pub event_fields: Vec<Variant>,
}

/// A batch of event notifications.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventNotificationList {
    /// The events.
    pub events: Vec<EventFieldList>,
}

/// Notifies the client that the subscription itself changed state, e.g. timed
/// out on the server.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeNotification {
    /// The new status of the subscription.
    pub status: StatusCode,
}

/// The kinds of notification a message can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationData {
    /// Changed data values.
    DataChange(DataChangeNotification),
    /// Event occurrences.
    Events(EventNotificationList),
    /// A change to the state of the subscription itself.
    StatusChange(StatusChangeNotification),
}

/// One notification message of one subscription. A message with no
/// notification data is a keep alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Sequence number of the message within its subscription.
    pub sequence_number: u32,
    /// When the message was published.
    pub publish_time: DateTime,
    /// The notifications, empty for a keep alive.
    pub notification_data: Vec<NotificationData>,
}

impl NotificationMessage {
    /// A keep alive message with the given sequence number.
    pub fn keep_alive(sequence_number: u32) -> Self {
        Self {
            sequence_number,
            publish_time: DateTime::now(),
            notification_data: Vec::new(),
        }
    }

    /// True if this message carries no notifications.
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_empty()
    }
}
