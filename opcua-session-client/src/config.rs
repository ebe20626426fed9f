//! Session client configuration data.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod defaults {
    use std::time::Duration;

    pub(super) fn session_name() -> String {
        "Rust OPC UA session".to_string()
    }

    pub(super) fn session_timeout() -> u32 {
        120_000
    }

    pub(super) fn request_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub(super) fn publish_timeout() -> Duration {
        Duration::from_secs(120)
    }

    pub(super) fn keep_alive_interval() -> Duration {
        Duration::from_millis(1000)
    }

    pub(super) fn send_buffer_size() -> usize {
        65535
    }

    pub(super) fn recv_buffer_size() -> usize {
        65535
    }

    pub(super) fn max_message_size() -> usize {
        // Maximum total message size the channel will accept. 0 means no limit.
        16 * 1024 * 1024
    }

    pub(super) fn max_chunk_count() -> usize {
        // Maximum number of chunks in a message. 0 means no limit.
        5
    }
}

/// Transport sizing parameters, forwarded verbatim to the channel.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct TransportLimits {
    /// Size of the send buffer in bytes.
    #[serde(default = "defaults::send_buffer_size")]
    pub send_buffer_size: usize,
    /// Size of the receive buffer in bytes.
    #[serde(default = "defaults::recv_buffer_size")]
    pub recv_buffer_size: usize,
    /// Maximum size of a message in bytes. 0 means no limit.
    #[serde(default = "defaults::max_message_size")]
    pub max_message_size: usize,
    /// Maximum number of chunks in a message. 0 means no limit.
    #[serde(default = "defaults::max_chunk_count")]
    pub max_chunk_count: usize,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            send_buffer_size: defaults::send_buffer_size(),
            recv_buffer_size: defaults::recv_buffer_size(),
            max_message_size: defaults::max_message_size(),
            max_chunk_count: defaults::max_chunk_count(),
        }
    }
}

/// Configuration of a session client. Immutable once the client is constructed.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    /// The name of the session on the server.
    #[serde(default = "defaults::session_name")]
    pub session_name: String,
    /// The session timeout requested from the server, in milliseconds. Also
    /// used to derive subscription lifetimes that are configured as zero.
    #[serde(default = "defaults::session_timeout")]
    pub session_timeout: u32,
    /// Default timeout for a service call, used whenever a request carries no
    /// timeout hint of its own.
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout: Duration,
    /// Timeout for publish requests. Publish is a server side long poll, so
    /// this is much longer than the request timeout.
    #[serde(default = "defaults::publish_timeout")]
    pub publish_timeout: Duration,
    /// Publishing interval of the internal keep alive subscription.
    #[serde(default = "defaults::keep_alive_interval")]
    pub keep_alive_interval: Duration,
    /// Diagnostic bits requested on every service call, raw form of
    /// [`opcua_session_types::DiagnosticBits`].
    #[serde(default)]
    pub return_diagnostics: u32,
    /// Preferred locales, in order of preference.
    #[serde(default)]
    pub preferred_locales: Vec<String>,
    /// Transport sizing parameters.
    #[serde(default)]
    pub transport: TransportLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: defaults::session_name(),
            session_timeout: defaults::session_timeout(),
            request_timeout: defaults::request_timeout(),
            publish_timeout: defaults::publish_timeout(),
            keep_alive_interval: defaults::keep_alive_interval(),
            return_diagnostics: 0,
            preferred_locales: Vec::new(),
            transport: TransportLimits::default(),
        }
    }
}

/// Error returned from saving or loading config objects.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration is invalid, with a list of validation errors.
    ConfigInvalid(Vec<String>),
    /// Reading or writing the file failed.
    IO(std::io::Error),
    /// Failed to serialize or deserialize the config object.
    Yaml(serde_yaml::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl SessionConfig {
    /// Validate the config, returning a list of validation errors if it fails.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.session_timeout == 0 {
            errors.push("Session timeout must be non-zero.".to_string());
        }
        if self.request_timeout.is_zero() {
            errors.push("Request timeout must be non-zero.".to_string());
        }
        if self.publish_timeout < self.request_timeout {
            errors.push("Publish timeout must not be shorter than the request timeout.".to_string());
        }
        if self.keep_alive_interval.is_zero() {
            errors.push("Keep alive interval must be non-zero.".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Save the configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Err(errors) = self.validate() {
            return Err(ConfigError::ConfigInvalid(errors));
        }
        let s = serde_yaml::to_string(&self)?;
        let mut f = File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut f = File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let config: Self = serde_yaml::from_str(&s)?;
        if let Err(errors) = config.validate() {
            return Err(ConfigError::ConfigInvalid(errors));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_timeout, 120_000);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn yaml_round_trip() {
        let config = SessionConfig {
            session_name: "test".to_string(),
            return_diagnostics: 0x3ff,
            ..Default::default()
        };
        let s = serde_yaml::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_yaml::from_str(&s).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let parsed: SessionConfig = serde_yaml::from_str("session_name: partial\n").unwrap();
        assert_eq!(parsed.session_name, "partial");
        assert_eq!(parsed.session_timeout, defaults::session_timeout());
        assert_eq!(parsed.transport, TransportLimits::default());
    }

    #[test]
    fn validation_catches_bad_timeouts() {
        let config = SessionConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
