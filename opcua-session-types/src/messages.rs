// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Unions over the service request and response records, so the engine can
//! queue and route messages without knowing the concrete service.

use crate::{request_header::RequestHeader, response_header::ResponseHeader, service_types::*};

macro_rules! request_enum {
    ($($name:ident: $value:ident),*,) => {
        /// A request of any of the supported services.
        #[derive(Debug, PartialEq, Clone)]
        pub enum RequestMessage {
            $(
                #[doc = concat!("A `", stringify!($name), "` request.")]
                $name(Box<$value>),
            )*
        }
        $(
            impl From<$value> for RequestMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*
        impl RequestMessage {
            /// The common request header.
            pub fn request_header(&self) -> &RequestHeader {
                match self {
                    $( Self::$name(value) => &value.request_header, )*
                }
            }

            /// The common request header, mutably.
            pub fn request_header_mut(&mut self) -> &mut RequestHeader {
                match self {
                    $( Self::$name(value) => &mut value.request_header, )*
                }
            }

            /// The client assigned handle of the request.
            pub fn request_handle(&self) -> u32 {
                self.request_header().request_handle
            }

            /// The name of the service the request belongs to.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( Self::$name(_) => stringify!($name), )*
                }
            }
        }
    };
}

macro_rules! response_enum {
    ($($name:ident: $value:ident),*,) => {
        /// A response of any of the supported services.
        #[derive(Debug, PartialEq, Clone)]
        pub enum ResponseMessage {
            $(
                #[doc = concat!("A `", stringify!($name), "` response.")]
                $name(Box<$value>),
            )*
        }
        $(
            impl From<$value> for ResponseMessage {
                fn from(value: $value) -> Self {
                    Self::$name(Box::new(value))
                }
            }
        )*
        impl ResponseMessage {
            /// The common response header.
            pub fn response_header(&self) -> &ResponseHeader {
                match self {
                    $( Self::$name(value) => &value.response_header, )*
                }
            }

            /// The handle of the request this response answers.
            pub fn request_handle(&self) -> u32 {
                self.response_header().request_handle
            }

            /// The name of the service the response belongs to.
            pub fn type_name(&self) -> &'static str {
                match self {
                    $( Self::$name(_) => stringify!($name), )*
                }
            }
        }
    };
}

request_enum! {
    GetEndpoints: GetEndpointsRequest,
    Read: ReadRequest,
    Write: WriteRequest,
    Browse: BrowseRequest,
    CreateSubscription: CreateSubscriptionRequest,
    ModifySubscription: ModifySubscriptionRequest,
    DeleteSubscriptions: DeleteSubscriptionsRequest,
    SetPublishingMode: SetPublishingModeRequest,
    CreateMonitoredItems: CreateMonitoredItemsRequest,
    ModifyMonitoredItems: ModifyMonitoredItemsRequest,
    DeleteMonitoredItems: DeleteMonitoredItemsRequest,
    SetMonitoringMode: SetMonitoringModeRequest,
    Publish: PublishRequest,
}

response_enum! {
    GetEndpoints: GetEndpointsResponse,
    Read: ReadResponse,
    Write: WriteResponse,
    Browse: BrowseResponse,
    CreateSubscription: CreateSubscriptionResponse,
    ModifySubscription: ModifySubscriptionResponse,
    DeleteSubscriptions: DeleteSubscriptionsResponse,
    SetPublishingMode: SetPublishingModeResponse,
    CreateMonitoredItems: CreateMonitoredItemsResponse,
    ModifyMonitoredItems: ModifyMonitoredItemsResponse,
    DeleteMonitoredItems: DeleteMonitoredItemsResponse,
    SetMonitoringMode: SetMonitoringModeResponse,
    Publish: PublishResponse,
    ServiceFault: ServiceFault,
}
