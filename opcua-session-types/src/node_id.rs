// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The node id type, which addresses a node in a server's address space.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status_code::StatusCode;

/// The kind of identifier, numeric, string, guid or bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    /// Numeric node id identifier, `i=123`.
    Numeric(u32),
    /// String node id identifier, `s=...`.
    String(String),
    /// GUID node id identifier, `g=...`.
    Guid(Uuid),
    /// Opaque node id identifier, `b=...`, base64 encoded in the string form.
    ByteString(Vec<u8>),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", *v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={}", v),
            Identifier::ByteString(v) => write!(f, "b={}", STANDARD.encode(v)),
        }
    }
}

impl FromStr for Identifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 2 {
            return Err(());
        }
        let k = &s[..2];
        let v = &s[2..];
        match k {
            "i=" => v.parse::<u32>().map(Identifier::Numeric).map_err(|_| ()),
            "s=" => Ok(Identifier::String(v.to_string())),
            "g=" => Uuid::parse_str(v).map(Identifier::Guid).map_err(|_| ()),
            "b=" => STANDARD.decode(v).map(Identifier::ByteString).map_err(|_| ()),
            _ => Err(()),
        }
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier::Numeric(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::String(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::String(value)
    }
}

impl From<Uuid> for Identifier {
    fn from(value: Uuid) -> Self {
        Identifier::Guid(value)
    }
}

/// An identifier for a node in the address space of an OPC UA server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// The index of the namespace the node belongs to.
    pub namespace: u16,
    /// The identifier within that namespace.
    pub identifier: Identifier,
}

impl NodeId {
    /// Construct a new node id from a namespace index and anything that
    /// converts to an [`Identifier`].
    pub fn new(namespace: u16, identifier: impl Into<Identifier>) -> Self {
        Self {
            namespace,
            identifier: identifier.into(),
        }
    }

    /// The null node id, `ns=0;i=0`.
    pub fn null() -> Self {
        Self::new(0, 0u32)
    }

    /// True if this is the null node id.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl FromStr for NodeId {
    type Err = StatusCode;

    /// Parses a node id from the string format specified in OPC UA Part 6
    /// 5.3.1.10, `ns=<namespaceindex>;<type>=<value>` where the `ns=0;` prefix
    /// is omitted for namespace zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, identifier) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (namespace, identifier) =
                    rest.split_once(';').ok_or(StatusCode::BadNodeIdInvalid)?;
                let namespace = namespace
                    .parse::<u16>()
                    .map_err(|_| StatusCode::BadNodeIdInvalid)?;
                (namespace, identifier)
            }
            None => (0, s),
        };
        Identifier::from_str(identifier)
            .map(|identifier| NodeId::new(namespace, identifier))
            .map_err(|_| StatusCode::BadNodeIdInvalid)
    }
}

impl From<&NodeId> for NodeId {
    fn from(value: &NodeId) -> Self {
        value.clone()
    }
}

impl<'a> From<(u16, &'a str)> for NodeId {
    fn from(value: (u16, &'a str)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<(u16, u32)> for NodeId {
    fn from(value: (u16, u32)) -> Self {
        Self::new(value.0, value.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric() {
        let id = NodeId::from_str("ns=2;i=3").unwrap();
        assert_eq!(id, NodeId::new(2, 3u32));
        assert_eq!(id.to_string(), "ns=2;i=3");
    }

    #[test]
    fn parse_namespace_zero() {
        let id = NodeId::from_str("i=2253").unwrap();
        assert_eq!(id, NodeId::new(0, 2253u32));
        assert_eq!(id.to_string(), "i=2253");
    }

    #[test]
    fn parse_string() {
        let id = NodeId::from_str("ns=2;s=Temp").unwrap();
        assert_eq!(id, NodeId::new(2, "Temp"));
        assert_eq!(id.to_string(), "ns=2;s=Temp");
    }

    #[test]
    fn parse_guid() {
        let id = NodeId::from_str("ns=1;g=72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap();
        assert!(matches!(id.identifier, Identifier::Guid(_)));
    }

    #[test]
    fn parse_invalid() {
        assert_eq!(NodeId::from_str(""), Err(StatusCode::BadNodeIdInvalid));
        assert_eq!(NodeId::from_str("ns=2"), Err(StatusCode::BadNodeIdInvalid));
        assert_eq!(NodeId::from_str("ns=2;x=3"), Err(StatusCode::BadNodeIdInvalid));
        assert_eq!(NodeId::from_str("ns=two;i=3"), Err(StatusCode::BadNodeIdInvalid));
        assert_eq!(NodeId::from_str("ns=2;i=abc"), Err(StatusCode::BadNodeIdInvalid));
    }

    #[test]
    fn null() {
        assert!(NodeId::null().is_null());
        assert!(!NodeId::new(0, 1u32).is_null());
        assert_eq!(NodeId::default(), NodeId::null());
    }
}
