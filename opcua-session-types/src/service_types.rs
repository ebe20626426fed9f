// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The request and response records of the services the session engine calls.
//!
//! Every request carries a [`RequestHeader`], every response a
//! [`ResponseHeader`]; the remaining fields are forwarded verbatim between the
//! caller and the channel.

use crate::{
    basic_types::{LocalizedText, QualifiedName},
    data_value::DataValue,
    endpoint::EndpointDescription,
    filter::{MonitoringFilter, MonitoringMode},
    node_id::NodeId,
    notification::{NotificationMessage, SubscriptionAcknowledgement},
    request_header::RequestHeader,
    response_header::ResponseHeader,
    status_code::StatusCode,
};

/// Which timestamps the server should return with values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimestampsToReturn {
    /// Source timestamps only.
    Source,
    /// Server timestamps only.
    Server,
    /// Both timestamps.
    Both,
    /// No timestamps.
    Neither,
}

impl Default for TimestampsToReturn {
    fn default() -> Self {
        Self::Neither
    }
}

/// Identifies an attribute of a node, optionally restricted to an index range
/// of an array valued attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadValueId {
    /// The node to read.
    pub node_id: NodeId,
    /// The attribute to read, numeric per [`crate::AttributeId`].
    pub attribute_id: u32,
    /// Index range into an array valued attribute.
    pub index_range: Option<String>,
}

impl ReadValueId {
    /// Read the `Value` attribute of the given node.
    pub fn value_of(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            attribute_id: crate::attribute::AttributeId::Value as u32,
            index_range: None,
        }
    }
}

impl From<NodeId> for ReadValueId {
    fn from(node_id: NodeId) -> Self {
        Self::value_of(node_id)
    }
}

/// Asks a discovery endpoint for the endpoints a server exposes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetEndpointsRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The URL the client used to reach the discovery endpoint.
    pub endpoint_url: String,
    /// Locales to return descriptions in, in order of preference.
    pub locale_ids: Vec<String>,
    /// Restrict results to endpoints speaking one of these transport profiles.
    pub profile_uris: Vec<String>,
}

/// Response to [`GetEndpointsRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetEndpointsResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// The matching endpoints.
    pub endpoints: Vec<EndpointDescription>,
}

/// Reads one or more attributes of one or more nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Maximum acceptable age of the values in milliseconds, 0 forces a fresh read.
    pub max_age: f64,
    /// Which timestamps to return.
    pub timestamps_to_return: TimestampsToReturn,
    /// The attributes to read.
    pub nodes_to_read: Vec<ReadValueId>,
}

/// Response to [`ReadRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One result per requested attribute, in request order.
    pub results: Vec<DataValue>,
}

/// One attribute value to write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteValue {
    /// The node to write.
    pub node_id: NodeId,
    /// The attribute to write, numeric per [`crate::AttributeId`].
    pub attribute_id: u32,
    /// Index range into an array valued attribute.
    pub index_range: Option<String>,
    /// The value to write.
    pub value: DataValue,
}

/// Writes one or more attributes of one or more nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The values to write.
    pub nodes_to_write: Vec<WriteValue>,
}

/// Response to [`WriteRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One status per written value, in request order.
    pub results: Vec<StatusCode>,
}

/// The direction references are followed when browsing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BrowseDirection {
    /// Follow references in their natural direction.
    Forward,
    /// Follow references against their natural direction.
    Inverse,
    /// Follow references both ways.
    Both,
}

impl Default for BrowseDirection {
    fn default() -> Self {
        Self::Forward
    }
}

/// What to browse from one node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseDescription {
    /// The node to browse from.
    pub node_id: NodeId,
    /// The direction to follow references in.
    pub browse_direction: BrowseDirection,
    /// Only follow references of this type. Null means all references.
    pub reference_type_id: NodeId,
    /// Whether subtypes of the reference type are followed too.
    pub include_subtypes: bool,
    /// Bit mask of node classes to return, 0 returns all.
    pub node_class_mask: u32,
    /// Bit mask of result fields to fill in.
    pub result_mask: u32,
}

/// One reference found while browsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceDescription {
    /// The type of the reference.
    pub reference_type_id: NodeId,
    /// Whether the reference was followed in its natural direction.
    pub is_forward: bool,
    /// The target node.
    pub node_id: NodeId,
    /// The browse name of the target.
    pub browse_name: QualifiedName,
    /// The display name of the target.
    pub display_name: LocalizedText,
}

/// The references found from one starting node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResult {
    /// Status of this browse operation.
    pub status_code: StatusCode,
    /// Opaque token to continue the browse, empty when complete.
    pub continuation_point: Vec<u8>,
    /// The references found.
    pub references: Vec<ReferenceDescription>,
}

/// Discovers the references of one or more nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Maximum references to return per node, 0 for no limit.
    pub requested_max_references_per_node: u32,
    /// The nodes to browse from.
    pub nodes_to_browse: Vec<BrowseDescription>,
}

/// Response to [`BrowseRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One result per starting node, in request order.
    pub results: Vec<BrowseResult>,
}

/// Creates a subscription on the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSubscriptionRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The cyclic rate notifications are returned at, in milliseconds. The
    /// server revises a zero or negative value to its fastest rate.
    pub requested_publishing_interval: f64,
    /// Publishing intervals without an available publish request before the
    /// server deletes the subscription. At least three times the keep alive count.
    pub requested_lifetime_count: u32,
    /// Publishing intervals without notifications before the server sends a
    /// keep alive message.
    pub requested_max_keep_alive_count: u32,
    /// Maximum notifications per publish response, 0 for no limit.
    pub max_notifications_per_publish: u32,
    /// Whether publishing is initially enabled.
    pub publishing_enabled: bool,
    /// Relative priority against the session's other subscriptions.
    pub priority: u8,
}

/// Response to [`CreateSubscriptionRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateSubscriptionResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// The server assigned id of the new subscription.
    pub subscription_id: u32,
    /// The publishing interval the server actually applies.
    pub revised_publishing_interval: f64,
    /// The lifetime count the server actually applies.
    pub revised_lifetime_count: u32,
    /// The keep alive count the server actually applies.
    pub revised_max_keep_alive_count: u32,
}

/// Modifies an existing subscription.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifySubscriptionRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The subscription to modify.
    pub subscription_id: u32,
    /// See [`CreateSubscriptionRequest::requested_publishing_interval`].
    pub requested_publishing_interval: f64,
    /// See [`CreateSubscriptionRequest::requested_lifetime_count`].
    pub requested_lifetime_count: u32,
    /// See [`CreateSubscriptionRequest::requested_max_keep_alive_count`].
    pub requested_max_keep_alive_count: u32,
    /// See [`CreateSubscriptionRequest::max_notifications_per_publish`].
    pub max_notifications_per_publish: u32,
    /// See [`CreateSubscriptionRequest::priority`].
    pub priority: u8,
}

/// Response to [`ModifySubscriptionRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifySubscriptionResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// The publishing interval the server actually applies.
    pub revised_publishing_interval: f64,
    /// The lifetime count the server actually applies.
    pub revised_lifetime_count: u32,
    /// The keep alive count the server actually applies.
    pub revised_max_keep_alive_count: u32,
}

/// Deletes one or more subscriptions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteSubscriptionsRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The subscriptions to delete.
    pub subscription_ids: Vec<u32>,
}

/// Response to [`DeleteSubscriptionsRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteSubscriptionsResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One status per subscription, in request order.
    pub results: Vec<StatusCode>,
}

/// Enables or disables publishing on one or more subscriptions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetPublishingModeRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Whether publishing is enabled.
    pub publishing_enabled: bool,
    /// The subscriptions to update.
    pub subscription_ids: Vec<u32>,
}

/// Response to [`SetPublishingModeRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetPublishingModeResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One status per subscription, in request order.
    pub results: Vec<StatusCode>,
}

/// The client chosen parameters of a monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringParameters {
    /// The client supplied handle used to route notifications back.
    pub client_handle: u32,
    /// Sampling interval in milliseconds, -1 for the publishing interval.
    pub sampling_interval: f64,
    /// The filter applied to the item.
    pub filter: MonitoringFilter,
    /// Server side queue depth, 0 for the server default.
    pub queue_size: u32,
    /// Whether the oldest queued notification is discarded on overflow.
    pub discard_oldest: bool,
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        Self {
            client_handle: 0,
            sampling_interval: -1.0,
            filter: MonitoringFilter::None,
            queue_size: 0,
            discard_oldest: true,
        }
    }
}

/// One monitored item to create.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemCreateRequest {
    /// The attribute the item watches.
    pub item_to_monitor: ReadValueId,
    /// The initial monitoring mode.
    pub monitoring_mode: MonitoringMode,
    /// The requested parameters.
    pub requested_parameters: MonitoringParameters,
}

/// The outcome of creating one monitored item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemCreateResult {
    /// Status of this item's creation.
    pub status_code: StatusCode,
    /// The server assigned id of the item, 0 on failure.
    pub monitored_item_id: u32,
    /// The sampling interval the server actually applies.
    pub revised_sampling_interval: f64,
    /// The queue size the server actually applies.
    pub revised_queue_size: u32,
}

/// Creates monitored items on a subscription.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateMonitoredItemsRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The subscription to create the items on.
    pub subscription_id: u32,
    /// Which timestamps notifications should carry.
    pub timestamps_to_return: TimestampsToReturn,
    /// The items to create.
    pub items_to_create: Vec<MonitoredItemCreateRequest>,
}

/// Response to [`CreateMonitoredItemsRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateMonitoredItemsResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One result per item, in request order.
    pub results: Vec<MonitoredItemCreateResult>,
}

/// One monitored item to modify.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemModifyRequest {
    /// The server assigned id of the item.
    pub monitored_item_id: u32,
    /// The new parameters.
    pub requested_parameters: MonitoringParameters,
}

/// The outcome of modifying one monitored item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemModifyResult {
    /// Status of this item's modification.
    pub status_code: StatusCode,
    /// The sampling interval the server actually applies.
    pub revised_sampling_interval: f64,
    /// The queue size the server actually applies.
    pub revised_queue_size: u32,
}

/// Modifies monitored items on a subscription.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifyMonitoredItemsRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The subscription the items belong to.
    pub subscription_id: u32,
    /// Which timestamps notifications should carry.
    pub timestamps_to_return: TimestampsToReturn,
    /// The items to modify.
    pub items_to_modify: Vec<MonitoredItemModifyRequest>,
}

/// Response to [`ModifyMonitoredItemsRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifyMonitoredItemsResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One result per item, in request order.
    pub results: Vec<MonitoredItemModifyResult>,
}

/// Deletes monitored items from a subscription.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteMonitoredItemsRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The subscription the items belong to.
    pub subscription_id: u32,
    /// The server assigned ids of the items to delete.
    pub monitored_item_ids: Vec<u32>,
}

/// Response to [`DeleteMonitoredItemsRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteMonitoredItemsResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One status per item, in request order.
    pub results: Vec<StatusCode>,
}

/// Changes the monitoring mode of monitored items.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetMonitoringModeRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// The subscription the items belong to.
    pub subscription_id: u32,
    /// The mode to apply.
    pub monitoring_mode: MonitoringMode,
    /// The server assigned ids of the items to update.
    pub monitored_item_ids: Vec<u32>,
}

/// Response to [`SetMonitoringModeRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetMonitoringModeResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// One status per item, in request order.
    pub results: Vec<StatusCode>,
}

/// The long poll by which the client collects notifications. Carries the
/// acknowledgements for previously received notification messages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishRequest {
    /// Common request parameters.
    pub request_header: RequestHeader,
    /// Acknowledgements for messages received on earlier publish responses.
    pub subscription_acknowledgements: Vec<SubscriptionAcknowledgement>,
}

/// Response to [`PublishRequest`], carrying one notification message of one
/// subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResponse {
    /// Common response parameters.
    pub response_header: ResponseHeader,
    /// The subscription the notification message belongs to.
    pub subscription_id: u32,
    /// Sequence numbers of messages the server still holds for republishing.
    pub available_sequence_numbers: Vec<u32>,
    /// True if the server holds more messages than fit in this response.
    pub more_notifications: bool,
    /// The notification message itself.
    pub notification_message: NotificationMessage,
    /// One status per acknowledgement sent in the request, in request order.
    pub results: Vec<StatusCode>,
}

/// A failed service call. Carries only the response header, whose
/// `service_result` holds the reason.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceFault {
    /// Common response parameters.
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    /// A service fault answering `request_handle` with `service_result`.
    pub fn new(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            response_header: ResponseHeader::new_service_result(request_handle, service_result),
        }
    }
}
