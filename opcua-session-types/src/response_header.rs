// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Message header for responses.

use crate::{
    basic_types::IntegerId,
    date_time::{DateTime, UtcTime},
    status_code::StatusCode,
};

/// The `ResponseHeader` contains information common to every response from a
/// server to the client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    /// The time the server sent the response.
    pub timestamp: UtcTime,
    /// The handle of the request this response answers.
    pub request_handle: IntegerId,
    /// The overall result of the service call. Operation level results are
    /// carried in the response body.
    pub service_result: StatusCode,
}

impl ResponseHeader {
    /// A good response header for the given request handle.
    pub fn new_good(request_handle: IntegerId) -> Self {
        Self::new_service_result(request_handle, StatusCode::Good)
    }

    /// A response header with the given service result.
    pub fn new_service_result(request_handle: IntegerId, service_result: StatusCode) -> Self {
        Self {
            timestamp: DateTime::now(),
            request_handle,
            service_result,
        }
    }
}
