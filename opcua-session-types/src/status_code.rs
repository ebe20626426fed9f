// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA `StatusCode`, with constants for the codes used by the session engine.

use std::fmt;

use serde::{Deserialize, Serialize};

const SEVERITY_MASK: u32 = 0xc000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
const SUB_CODE_MASK: u32 = 0x0fff_0000;

/// A 32 bit OPC UA status code. The top two bits hold the severity, the next
/// twelve the sub code, per OPC UA Part 4 7.34.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

macro_rules! status_codes {
    ($($name:ident = $value:literal: $doc:literal,)*) => {
        #[allow(non_upper_case_globals)]
        impl StatusCode {
            $(
                #[doc = $doc]
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// The symbolic name of this status code, if it is one the library knows about.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 & (SEVERITY_MASK | SUB_CODE_MASK) {
                    $( $value => Some(stringify!($name)), )*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    Good = 0x0000_0000: "The operation succeeded.",
    GoodSubscriptionTransferred = 0x002d_0000: "The subscription was transferred to another session.",
    Uncertain = 0x4000_0000: "The operation result is uncertain.",
    Bad = 0x8000_0000: "The operation failed.",
    BadUnexpectedError = 0x8001_0000: "An unexpected error occurred.",
    BadInternalError = 0x8002_0000: "An internal error occurred as a result of a programming or configuration error.",
    BadOutOfMemory = 0x8003_0000: "Not enough memory to complete the operation.",
    BadResourceUnavailable = 0x8004_0000: "An operating system resource is not available.",
    BadCommunicationError = 0x8005_0000: "A low level communication error occurred.",
    BadEncodingError = 0x8006_0000: "Encoding halted because of invalid data in the objects being serialized.",
    BadDecodingError = 0x8007_0000: "Decoding halted because of invalid data in the stream.",
    BadUnknownResponse = 0x8009_0000: "An unrecognized response was received from the server.",
    BadTimeout = 0x800a_0000: "The operation timed out.",
    BadServiceUnsupported = 0x800b_0000: "The server does not support the requested service.",
    BadShutdown = 0x800c_0000: "The operation was cancelled because the application is shutting down.",
    BadServerNotConnected = 0x800d_0000: "The operation could not complete because the client is not connected to the server.",
    BadServerHalted = 0x800e_0000: "The server has stopped and cannot process any requests.",
    BadNothingToDo = 0x800f_0000: "No processing could be done because there was nothing to do.",
    BadTooManyOperations = 0x8010_0000: "The request could not be processed because it specified too many operations.",
    BadUserAccessDenied = 0x801f_0000: "User does not have permission to perform the requested operation.",
    BadSecureChannelIdInvalid = 0x8022_0000: "The specified secure channel is no longer valid.",
    BadNonceInvalid = 0x8024_0000: "The nonce does appear to be not a random value or it is not the correct length.",
    BadSessionIdInvalid = 0x8025_0000: "The session id is not valid.",
    BadSessionClosed = 0x8026_0000: "The session was closed by the client.",
    BadSessionNotActivated = 0x8027_0000: "The session cannot be used because ActivateSession has not been called.",
    BadSubscriptionIdInvalid = 0x8028_0000: "The subscription id is not valid.",
    BadRequestCancelledByClient = 0x802c_0000: "The request was cancelled by the client.",
    BadNoCommunication = 0x8031_0000: "Communication with the data source is defined, but not established, and there is no last known value available.",
    BadNodeIdInvalid = 0x8033_0000: "The syntax the node id is not valid.",
    BadNodeIdUnknown = 0x8034_0000: "The node id refers to a node that does not exist in the server address space.",
    BadAttributeIdInvalid = 0x8035_0000: "The attribute is not supported for the specified node.",
    BadIndexRangeInvalid = 0x8036_0000: "The syntax of the index range parameter is invalid.",
    BadNotReadable = 0x803a_0000: "The access level does not allow reading or subscribing to the node.",
    BadNotWritable = 0x803b_0000: "The access level does not allow writing to the node.",
    BadNotSupported = 0x803d_0000: "The requested operation is not supported.",
    BadNoMatch = 0x806f_0000: "The requested operation has no match to return.",
    BadMonitoredItemIdInvalid = 0x8042_0000: "The monitoring item id does not refer to a valid monitored item.",
    BadMonitoredItemFilterInvalid = 0x8043_0000: "The monitored item filter parameter is not valid.",
    BadFilterNotAllowed = 0x8045_0000: "A monitoring filter cannot be used in combination with the attribute specified.",
    BadInvalidArgument = 0x80ab_0000: "One or more arguments are invalid.",
    BadTooManyPublishRequests = 0x8078_0000: "The server has reached the maximum number of queued publish requests.",
    BadNoSubscription = 0x8079_0000: "There is no subscription available for this session.",
    BadSequenceNumberUnknown = 0x807a_0000: "The sequence number is unknown to the server.",
    BadTcpServerTooBusy = 0x807d_0000: "The server cannot process the request because it is too busy.",
    BadTcpSecureChannelUnknown = 0x807f_0000: "The secure channel id refers to an unknown secure channel.",
    BadTcpNotEnoughResources = 0x8081_0000: "There are not enough resources to process the request.",
    BadTcpInternalError = 0x8082_0000: "An internal error occurred.",
    BadTcpEndpointUrlInvalid = 0x8083_0000: "The server does not recognize the endpoint url.",
    BadRequestTimeout = 0x8085_0000: "Timeout occurred while processing the request.",
    BadSecureChannelClosed = 0x8086_0000: "The secure channel has been closed.",
    BadSecurityPolicyRejected = 0x8055_0000: "The security policy does not meet the requirements set by the server.",
    BadConfigurationError = 0x8089_0000: "There is a problem with the configuration that affects the usefulness of the value.",
    BadNotConnected = 0x808a_0000: "The variable should receive its value from another variable, but has never been configured to do so.",
    BadConnectionClosed = 0x80ae_0000: "The network connection has been closed.",
    BadInvalidState = 0x80af_0000: "The operation cannot be completed because the object is closed, uninitialized or in some other invalid state.",
    BadConnectionRejected = 0x80ac_0000: "Could not establish a network connection to the remote server.",
    BadDisconnect = 0x80ad_0000: "The server has disconnected from the client.",
    BadEndOfStream = 0x80b0_0000: "Cannot move beyond the end of the stream.",
    BadMaxConnectionsReached = 0x80b7_0000: "The operation could not be finished because all available connections are in use.",
}

impl StatusCode {
    /// Construct a status code from its raw 32 bit value.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw 32 bit value.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True if the severity is good.
    pub fn is_good(&self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    /// True if the severity is bad.
    pub fn is_bad(&self) -> bool {
        self.0 & SEVERITY_BAD != 0
    }

    /// True if the severity is uncertain.
    pub fn is_uncertain(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "StatusCode({:#010x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::GoodSubscriptionTransferred.is_good());
        assert!(StatusCode::BadTimeout.is_bad());
        assert!(!StatusCode::BadTimeout.is_good());
        assert!(StatusCode::Uncertain.is_uncertain());
        assert!(!StatusCode::Uncertain.is_bad());
    }

    #[test]
    fn names() {
        assert_eq!(StatusCode::Good.name(), Some("Good"));
        assert_eq!(StatusCode::BadRequestTimeout.name(), Some("BadRequestTimeout"));
        assert_eq!(StatusCode::from_bits(0x8fff_0000).name(), None);
        assert_eq!(format!("{}", StatusCode::BadSubscriptionIdInvalid), "BadSubscriptionIdInvalid");
    }
}
