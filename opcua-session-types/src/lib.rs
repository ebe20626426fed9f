// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

#![warn(missing_docs)]

//! Data types exchanged by the OPC UA session client.
//!
//! This crate holds the subset of the OPC UA type universe that the session
//! engine needs: node addressing, variants and data values, status codes,
//! request/response headers, endpoint and identity descriptions, monitoring
//! filters, notification payloads, and the service records of the session,
//! attribute, view and subscription service sets. Serialization to the OPC UA
//! binary encoding is the concern of the channel implementation, not of this
//! crate, so the types here are plain data.

mod attribute;
mod basic_types;
mod data_value;
mod date_time;
mod endpoint;
pub mod errors;
mod filter;
mod messages;
mod node_id;
mod notification;
mod request_header;
mod response_header;
mod service_types;
mod status_code;
mod variant;

pub use attribute::AttributeId;
pub use basic_types::{IntegerId, LocalizedText, QualifiedName};
pub use data_value::DataValue;
pub use date_time::{DateTime, UtcTime};
pub use endpoint::{
    ApplicationDescription, ApplicationType, EndpointDescription, MessageSecurityMode,
    UserIdentity, BINARY_TRANSPORT_PROFILE_URI,
};
pub use errors::Error;
pub use filter::{
    DataChangeFilter, DataChangeTrigger, DeadbandType, EventFilter, MonitoringFilter,
    MonitoringMode, SimpleAttributeOperand,
};
pub use messages::{RequestMessage, ResponseMessage};
pub use node_id::{Identifier, NodeId};
pub use notification::{
    DataChangeNotification, EventFieldList, EventNotificationList, MonitoredItemNotification,
    NotificationData, NotificationMessage, StatusChangeNotification, SubscriptionAcknowledgement,
};
pub use request_header::{DiagnosticBits, RequestHeader};
pub use response_header::ResponseHeader;
pub use service_types::*;
pub use status_code::StatusCode;
pub use variant::{FromVariant, Variant};
