// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `DataValue`, the value-plus-quality-plus-timestamps triple that attribute
//! reads and data change notifications carry.

use serde::{Deserialize, Serialize};

use crate::{date_time::DateTime, status_code::StatusCode, variant::Variant};

/// A value with associated status code and timestamps. Absent fields were
/// omitted by the server, an absent status means `Good`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value itself.
    pub value: Option<Variant>,
    /// Quality of the value. `None` means `Good`.
    pub status: Option<StatusCode>,
    /// When the source most recently changed the value.
    pub source_timestamp: Option<DateTime>,
    /// When the server most recently observed the value.
    pub server_timestamp: Option<DateTime>,
}

impl DataValue {
    /// A good value with both timestamps set to now.
    pub fn new_now(value: impl Into<Variant>) -> Self {
        let now = DateTime::now();
        Self {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        }
    }

    /// A value with no status or timestamps, as used when writing.
    pub fn value_only(value: impl Into<Variant>) -> Self {
        Self {
            value: Some(value.into()),
            status: None,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// The effective status of the value.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// True if the status allows the value to be used.
    pub fn is_valid(&self) -> bool {
        !self.status().is_bad()
    }
}
