// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Endpoint and application descriptions, and the user identities a session
//! can be activated with.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::basic_types::LocalizedText;

/// Transport profile URI of the OPC UA TCP binary transport, the only profile
/// this client speaks.
pub const BINARY_TRANSPORT_PROFILE_URI: &str =
    "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";

/// The kind of OPC UA application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationType {
    /// A server.
    Server,
    /// A client.
    Client,
    /// Both client and server.
    ClientAndServer,
    /// A discovery server.
    DiscoveryServer,
}

/// Describes an OPC UA application, returned by discovery and sent when
/// creating a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescription {
    /// The globally unique identifier for the application instance.
    pub application_uri: String,
    /// The globally unique identifier for the product.
    pub product_uri: String,
    /// The name of the application.
    pub application_name: LocalizedText,
    /// The kind of application.
    pub application_type: ApplicationType,
}

impl ApplicationDescription {
    /// Describe a client application.
    pub fn client(
        application_uri: impl Into<String>,
        product_uri: impl Into<String>,
        application_name: impl Into<LocalizedText>,
    ) -> Self {
        Self {
            application_uri: application_uri.into(),
            product_uri: product_uri.into(),
            application_name: application_name.into(),
            application_type: ApplicationType::Client,
        }
    }
}

/// The security mode of messages on a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSecurityMode {
    /// An invalid or unknown mode.
    Invalid,
    /// Messages are neither signed nor encrypted.
    None,
    /// Messages are signed.
    Sign,
    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl Default for MessageSecurityMode {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for MessageSecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "Invalid",
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        };
        write!(f, "{}", s)
    }
}

/// Describes one endpoint of a server: where to connect and how messages are
/// secured there.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// The URL to connect to.
    pub endpoint_url: String,
    /// URI of the security policy in force on the endpoint.
    pub security_policy_uri: String,
    /// The message security mode of the endpoint.
    pub security_mode: MessageSecurityMode,
    /// Relative security of the endpoint compared to the server's other
    /// endpoints. Higher is more secure.
    pub security_level: u8,
    /// The server's certificate, in DER form. Empty when security is off.
    pub server_certificate: Vec<u8>,
    /// URI of the transport profile the endpoint speaks, or an empty string.
    pub transport_profile_uri: String,
}

impl From<&str> for EndpointDescription {
    /// An endpoint description holding only a URL, everything else at its
    /// least-secure default. Used for discovery connections.
    fn from(value: &str) -> Self {
        Self {
            endpoint_url: value.to_string(),
            ..Default::default()
        }
    }
}

/// The identity a session is activated with. The engine treats this as opaque
/// and hands it to the channel, which encodes it into the matching identity
/// token during session activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserIdentity {
    /// No identity, the anonymous token.
    Anonymous,
    /// User name and password.
    UserName {
        /// The user name.
        user: String,
        /// The password, in the clear. Securing it is the channel's concern.
        password: String,
    },
    /// A token issued by an external authority, e.g. a JWT.
    IssuedToken(Vec<u8>),
    /// An X.509 certificate and its private key, both in DER form.
    X509 {
        /// The certificate.
        certificate: Vec<u8>,
        /// The private key.
        private_key: Vec<u8>,
    },
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self::Anonymous
    }
}
