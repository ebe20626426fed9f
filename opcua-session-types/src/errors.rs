// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Rust specific errors, for failures that have context beyond a status code.

use thiserror::Error;

use crate::status_code::StatusCode;

/// An error with a status code and a human readable context. Service calls
/// themselves fail with a bare [`StatusCode`]; this type is for construction
/// and configuration failures where the context matters.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{status}: {context}")]
pub struct Error {
    status: StatusCode,
    context: String,
}

impl Error {
    /// Create a new error with the given status code and context.
    pub fn new(status: StatusCode, context: impl Into<String>) -> Self {
        Self {
            status,
            context: context.into(),
        }
    }

    /// A configuration error.
    pub fn configuration(context: impl Into<String>) -> Self {
        Self::new(StatusCode::BadConfigurationError, context)
    }

    /// The status code of the error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The context of the error.
    pub fn context(&self) -> &str {
        &self.context
    }
}

impl From<Error> for StatusCode {
    fn from(value: Error) -> Self {
        value.status
    }
}

impl From<StatusCode> for Error {
    fn from(value: StatusCode) -> Self {
        Self::new(value, "Service call failed")
    }
}
