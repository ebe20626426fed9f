//! Subscription service set, as raw service calls against server assigned
//! ids.
//!
//! These bypass the registry: subscriptions created here are not recreated
//! after a reconnect and receive no binding dispatch. Declarative
//! subscriptions go through [`SessionClient::add_subscription`] instead.

use std::time::Duration;

use opcua_session_types::{
    CreateMonitoredItemsRequest, CreateSubscriptionRequest, CreateSubscriptionResponse,
    DeleteMonitoredItemsRequest, DeleteSubscriptionsRequest, ModifyMonitoredItemsRequest,
    ModifySubscriptionRequest, ModifySubscriptionResponse, MonitoredItemCreateRequest,
    MonitoredItemCreateResult, MonitoredItemModifyRequest, MonitoredItemModifyResult,
    MonitoringMode, RequestHeader, ResponseMessage, SetMonitoringModeRequest,
    SetPublishingModeRequest, StatusCode, TimestampsToReturn,
};

use crate::session::{process_service_result, process_unexpected_response, session_debug, session_error};
use crate::SessionClient;

impl SessionClient {
    /// Create a subscription by sending a [`CreateSubscriptionRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.13.2 for complete description of the service and error responses.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_subscription(
        &self,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
        publishing_enabled: bool,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        let request = CreateSubscriptionRequest {
            request_header: RequestHeader::default(),
            requested_publishing_interval: publishing_interval.as_millis() as f64,
            requested_lifetime_count: lifetime_count,
            requested_max_keep_alive_count: max_keep_alive_count,
            max_notifications_per_publish,
            publishing_enabled,
            priority,
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::CreateSubscription(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(
                self,
                "create_subscription, created a subscription with id {}",
                response.subscription_id
            );
            Ok(*response)
        } else {
            session_error!(self, "create_subscription failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Modify a subscription by sending a [`ModifySubscriptionRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.13.3 for complete description of the service and error responses.
    #[allow(clippy::too_many_arguments)]
    pub async fn modify_subscription(
        &self,
        subscription_id: u32,
        publishing_interval: Duration,
        lifetime_count: u32,
        max_keep_alive_count: u32,
        max_notifications_per_publish: u32,
        priority: u8,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        if subscription_id == 0 {
            session_error!(self, "modify_subscription, subscription id must be non-zero");
            return Err(StatusCode::BadInvalidArgument);
        }
        let request = ModifySubscriptionRequest {
            request_header: RequestHeader::default(),
            subscription_id,
            requested_publishing_interval: publishing_interval.as_millis() as f64,
            requested_lifetime_count: lifetime_count,
            requested_max_keep_alive_count: max_keep_alive_count,
            max_notifications_per_publish,
            priority,
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::ModifySubscription(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "modify_subscription success for {subscription_id}");
            Ok(*response)
        } else {
            session_error!(self, "modify_subscription failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Delete subscriptions by sending a [`DeleteSubscriptionsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.13.8 for complete description of the service and error responses.
    pub async fn delete_subscriptions(
        &self,
        subscription_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if subscription_ids.is_empty() {
            session_error!(self, "delete_subscriptions, was not supplied with any subscription ids");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = DeleteSubscriptionsRequest {
            request_header: RequestHeader::default(),
            subscription_ids: subscription_ids.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::DeleteSubscriptions(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "delete_subscriptions success");
            Ok(response.results)
        } else {
            session_error!(self, "delete_subscriptions failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Change the publishing mode of subscriptions by sending a
    /// [`SetPublishingModeRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.13.4 for complete description of the service and error responses.
    pub async fn set_publishing_mode(
        &self,
        subscription_ids: &[u32],
        publishing_enabled: bool,
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if subscription_ids.is_empty() {
            session_error!(self, "set_publishing_mode, was not supplied with any subscription ids");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = SetPublishingModeRequest {
            request_header: RequestHeader::default(),
            publishing_enabled,
            subscription_ids: subscription_ids.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::SetPublishingMode(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "set_publishing_mode success");
            Ok(response.results)
        } else {
            session_error!(self, "set_publishing_mode failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Create monitored items on a subscription by sending a
    /// [`CreateMonitoredItemsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.2 for complete description of the service and error responses.
    pub async fn create_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_create: Vec<MonitoredItemCreateRequest>,
    ) -> Result<Vec<MonitoredItemCreateResult>, StatusCode> {
        if items_to_create.is_empty() {
            session_error!(self, "create_monitored_items, was not supplied with any items to create");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = CreateMonitoredItemsRequest {
            request_header: RequestHeader::default(),
            subscription_id,
            timestamps_to_return,
            items_to_create,
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::CreateMonitoredItems(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "create_monitored_items success on {subscription_id}");
            Ok(response.results)
        } else {
            session_error!(self, "create_monitored_items failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Modify monitored items on a subscription by sending a
    /// [`ModifyMonitoredItemsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.3 for complete description of the service and error responses.
    pub async fn modify_monitored_items(
        &self,
        subscription_id: u32,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: Vec<MonitoredItemModifyRequest>,
    ) -> Result<Vec<MonitoredItemModifyResult>, StatusCode> {
        if items_to_modify.is_empty() {
            session_error!(self, "modify_monitored_items, was not supplied with any items to modify");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = ModifyMonitoredItemsRequest {
            request_header: RequestHeader::default(),
            subscription_id,
            timestamps_to_return,
            items_to_modify,
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::ModifyMonitoredItems(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "modify_monitored_items success on {subscription_id}");
            Ok(response.results)
        } else {
            session_error!(self, "modify_monitored_items failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Delete monitored items from a subscription by sending a
    /// [`DeleteMonitoredItemsRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.6 for complete description of the service and error responses.
    pub async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if monitored_item_ids.is_empty() {
            session_error!(self, "delete_monitored_items, was not supplied with any items to delete");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = DeleteMonitoredItemsRequest {
            request_header: RequestHeader::default(),
            subscription_id,
            monitored_item_ids: monitored_item_ids.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::DeleteMonitoredItems(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "delete_monitored_items success on {subscription_id}");
            Ok(response.results)
        } else {
            session_error!(self, "delete_monitored_items failed");
            Err(process_unexpected_response(response))
        }
    }

    /// Change the monitoring mode of monitored items by sending a
    /// [`SetMonitoringModeRequest`] to the server.
    ///
    /// See OPC UA Part 4 - Services 5.12.4 for complete description of the service and error responses.
    pub async fn set_monitoring_mode(
        &self,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        if monitored_item_ids.is_empty() {
            session_error!(self, "set_monitoring_mode, was not supplied with any items to update");
            return Err(StatusCode::BadNothingToDo);
        }
        let request = SetMonitoringModeRequest {
            request_header: RequestHeader::default(),
            subscription_id,
            monitoring_mode,
            monitored_item_ids: monitored_item_ids.to_vec(),
        };
        let response = self.request(request.into()).await?;
        if let ResponseMessage::SetMonitoringMode(response) = response {
            process_service_result(&response.response_header)?;
            session_debug!(self, "set_monitoring_mode success on {subscription_id}");
            Ok(response.results)
        } else {
            session_error!(self, "set_monitoring_mode failed");
            Err(process_unexpected_response(response))
        }
    }
}
