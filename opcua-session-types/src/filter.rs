// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Monitoring modes and the filters a monitored item can be created with.

use serde::{Deserialize, Serialize};

use crate::{basic_types::QualifiedName, node_id::NodeId};

/// Node id of the `BaseEventType` object type, the root of the event type
/// hierarchy and the default type definition for event select clauses.
pub const BASE_EVENT_TYPE_ID: u32 = 2041;

/// Whether a monitored item samples, and whether it reports what it samples.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringMode {
    /// The item neither samples nor reports.
    Disabled,
    /// The item samples but queues nothing for publishing.
    Sampling,
    /// The item samples and reports notifications.
    Reporting,
}

impl Default for MonitoringMode {
    fn default() -> Self {
        Self::Reporting
    }
}

/// The conditions under which a data change notification is generated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataChangeTrigger {
    /// Report on status changes only.
    Status,
    /// Report on status or value changes.
    StatusValue,
    /// Report on status, value or source timestamp changes.
    StatusValueTimestamp,
}

impl Default for DataChangeTrigger {
    fn default() -> Self {
        Self::StatusValue
    }
}

/// The kind of deadband applied to value changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeadbandType {
    /// No deadband.
    None,
    /// The deadband value is an absolute difference.
    Absolute,
    /// The deadband value is a percentage of the EU range.
    Percent,
}

impl Default for DeadbandType {
    fn default() -> Self {
        Self::None
    }
}

/// Filter for data change monitored items.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataChangeFilter {
    /// What kinds of change trigger a notification.
    pub trigger: DataChangeTrigger,
    /// The kind of deadband to apply.
    pub deadband_type: DeadbandType,
    /// The deadband value, interpreted according to `deadband_type`.
    pub deadband_value: f64,
}

/// Selects one field of an event, by the browse path from the event type to
/// the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleAttributeOperand {
    /// The event type defining the field.
    pub type_definition_id: NodeId,
    /// Browse path from the type to the field.
    pub browse_path: Vec<QualifiedName>,
    /// The attribute to select, numeric per [`crate::AttributeId`].
    pub attribute_id: u32,
    /// Index range applied to array valued fields.
    pub index_range: Option<String>,
}

impl SimpleAttributeOperand {
    /// Select a field of `BaseEventType` by a `/`-separated browse path, e.g.
    /// `Message` or `Severity`.
    pub fn event_field(browse_path: &str) -> Self {
        Self {
            type_definition_id: NodeId::new(0, BASE_EVENT_TYPE_ID),
            browse_path: browse_path.split('/').map(QualifiedName::from).collect(),
            attribute_id: crate::attribute::AttributeId::Value as u32,
            index_range: None,
        }
    }

    /// Select a field of the given event type by a `/`-separated browse path.
    pub fn typed_event_field(type_definition_id: NodeId, browse_path: &str) -> Self {
        Self {
            type_definition_id,
            ..Self::event_field(browse_path)
        }
    }
}

/// Filter for event monitored items. The engine only generates select clauses,
/// where clauses belong to the full filter language and are out of scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// The event fields to return, in the order notifications will carry them.
    pub select_clauses: Vec<SimpleAttributeOperand>,
}

/// The filter variants a monitored item can be created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitoringFilter {
    /// No filter, the server applies its defaults.
    None,
    /// A data change filter.
    DataChange(DataChangeFilter),
    /// An event filter.
    Event(EventFilter),
}

impl Default for MonitoringFilter {
    fn default() -> Self {
        Self::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_field_paths() {
        let operand = SimpleAttributeOperand::event_field("Severity");
        assert_eq!(operand.type_definition_id, NodeId::new(0, BASE_EVENT_TYPE_ID));
        assert_eq!(operand.browse_path, vec![QualifiedName::from("Severity")]);

        let nested = SimpleAttributeOperand::event_field("EnabledState/Id");
        assert_eq!(
            nested.browse_path,
            vec![QualifiedName::from("EnabledState"), QualifiedName::from("Id")]
        );
    }
}
