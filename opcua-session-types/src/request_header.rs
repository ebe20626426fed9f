// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Message header for requests.

use bitflags::bitflags;

use crate::{
    basic_types::IntegerId,
    date_time::{DateTime, UtcTime},
    node_id::NodeId,
};

bitflags! {
    /// A bit mask that identifies the kinds of vendor specific diagnostics to
    /// be returned in responses. An empty mask requests no diagnostics.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct DiagnosticBits: u32 {
        /// Return a symbolic id for service level diagnostics.
        const SERVICE_LEVEL_SYMBOLIC_ID = 0x0000_0001;
        /// Return localized text for service level diagnostics.
        const SERVICE_LEVEL_LOCALIZED_TEXT = 0x0000_0002;
        /// Return additional info for service level diagnostics.
        const SERVICE_LEVEL_ADDITIONAL_INFO = 0x0000_0004;
        /// Return the inner status code for service level diagnostics.
        const SERVICE_LEVEL_LOCALIZED_INNER_STATUS_CODE = 0x0000_0008;
        /// Return inner diagnostics for service level diagnostics.
        const SERVICE_LEVEL_LOCALIZED_INNER_DIAGNOSTICS = 0x0000_0010;
        /// Return a symbolic id for operation level diagnostics.
        const OPERATIONAL_LEVEL_SYMBOLIC_ID = 0x0000_0020;
        /// Return localized text for operation level diagnostics.
        const OPERATIONAL_LEVEL_LOCALIZED_TEXT = 0x0000_0040;
        /// Return additional info for operation level diagnostics.
        const OPERATIONAL_LEVEL_ADDITIONAL_INFO = 0x0000_0080;
        /// Return the inner status code for operation level diagnostics.
        const OPERATIONAL_LEVEL_INNER_STATUS_CODE = 0x0000_0100;
        /// Return inner diagnostics for operation level diagnostics.
        const OPERATIONAL_LEVEL_INNER_DIAGNOSTICS = 0x0000_0200;
    }
}

/// The `RequestHeader` contains information common to every request from a
/// client to the server. The session engine fills `timestamp`, `request_handle`
/// and `timeout_hint` before a request is queued, the channel fills
/// `authentication_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    /// The secret session identifier used to verify that the request is
    /// associated with the session.
    pub authentication_token: NodeId,
    /// The time the client sent the request.
    pub timestamp: UtcTime,
    /// A client defined handle associated with the request, returned in the
    /// matching response.
    pub request_handle: IntegerId,
    /// The kinds of diagnostics requested for the response.
    pub return_diagnostics: DiagnosticBits,
    /// An identifier correlating this request with the client's audit log, or
    /// an empty string.
    pub audit_entry_id: String,
    /// This timeout in milliseconds is used by the client communication stack
    /// on a per call basis, and is a hint the server may use to cancel long
    /// running operations. A value of 0 indicates no timeout.
    pub timeout_hint: u32,
}

impl Default for RequestHeader {
    fn default() -> Self {
        Self {
            authentication_token: NodeId::null(),
            timestamp: DateTime::null(),
            request_handle: 0,
            return_diagnostics: DiagnosticBits::empty(),
            audit_entry_id: String::new(),
            timeout_hint: 0,
        }
    }
}

impl RequestHeader {
    /// Create a new request header.
    pub fn new(
        authentication_token: &NodeId,
        timestamp: &DateTime,
        request_handle: IntegerId,
    ) -> RequestHeader {
        RequestHeader {
            authentication_token: authentication_token.clone(),
            timestamp: *timestamp,
            request_handle,
            return_diagnostics: DiagnosticBits::empty(),
            audit_entry_id: String::new(),
            timeout_hint: 0,
        }
    }

    /// Create a new dummy request header, for tests.
    pub fn dummy() -> RequestHeader {
        RequestHeader::new(&NodeId::null(), &DateTime::now(), 1)
    }
}
