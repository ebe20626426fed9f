// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Small building block types shared across the data model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A handle chosen by the client and echoed back by the server, e.g. a request handle.
pub type IntegerId = u32;

/// A name qualified by the index of the namespace it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Index into the server's namespace array.
    pub namespace_index: u16,
    /// The name itself.
    pub name: String,
}

impl QualifiedName {
    /// Create a qualified name.
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: name.into(),
        }
    }

    /// The null qualified name, an empty name in namespace 0.
    pub fn null() -> Self {
        Self::default()
    }

    /// True if this is the null qualified name.
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_empty()
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        Self::new(0, value)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

/// Human readable text with an optional locale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    /// The locale, e.g. `en-US`, or an empty string.
    pub locale: String,
    /// The text in the given locale.
    pub text: String,
}

impl LocalizedText {
    /// Create localized text with a locale.
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            text: text.into(),
        }
    }

    /// The null localized text.
    pub fn null() -> Self {
        Self::default()
    }
}

impl From<&str> for LocalizedText {
    fn from(value: &str) -> Self {
        Self::new("", value)
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
