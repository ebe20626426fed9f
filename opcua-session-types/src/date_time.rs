// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! UTC timestamps used in message headers and data values.

use std::fmt;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp. OPC UA defines this as the number of 100 nanosecond ticks
/// since 1601-01-01, but until a value hits the wire codec it is simply a point
/// in time, so this type wraps [`chrono::DateTime<Utc>`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateTime(chrono::DateTime<Utc>);

/// The name OPC UA uses for timestamps in message headers.
pub type UtcTime = DateTime;

impl DateTime {
    /// The current time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The null timestamp, i.e. the UNIX epoch. Used where a header field is
    /// "not set".
    pub fn null() -> Self {
        Self(Utc.timestamp_opt(0, 0).unwrap())
    }

    /// True if this is the null timestamp.
    pub fn is_null(&self) -> bool {
        self.0.timestamp() == 0 && self.0.timestamp_subsec_nanos() == 0
    }

    /// The wrapped chrono value.
    pub fn as_chrono(&self) -> chrono::DateTime<Utc> {
        self.0
    }

    /// Milliseconds elapsed since this timestamp, negative if it lies in the future.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.0).num_milliseconds()
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::null()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(value: chrono::DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_ordering() {
        let null = DateTime::null();
        assert!(null.is_null());
        assert_eq!(null, DateTime::default());
        assert!(DateTime::now() > null);
    }

    #[test]
    fn elapsed() {
        let now = DateTime::now();
        assert!(!now.is_null());
        assert!(now.elapsed_ms() >= 0);
        assert!(now.elapsed_ms() < 1000);
    }
}
