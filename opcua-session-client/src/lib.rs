// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

#![warn(missing_docs)]

//! Client side OPC UA session engine.
//!
//! This crate keeps one logical session to a server alive across an abstract
//! secure channel. It contains:
//!
//! - The [`channel::SessionChannel`] contract the engine drives. The concrete
//!   secure channel, transport and PKI live behind this trait.
//! - A pending-request multiplexer that queues user requests and pipes them to
//!   whichever channel is currently open.
//! - The session supervisor, which reconnects with exponential backoff and
//!   runs the per-connection tasks.
//! - A subscription registry that recreates subscriptions and their monitored
//!   items on the server after every reconnect.
//! - A pipelined publish pump that keeps publish requests queued on the server
//!   and dispatches notifications to monitored item bindings.
//! - A declarative [`subscription::SubscriptionBuilder`] that maps notification
//!   values onto user callbacks and queues.
//!
//! Start with [`SessionClient::new`], declare subscriptions with
//! [`SessionClient::add_subscription`], and issue requests with
//! [`SessionClient::request`] or the typed service methods.

pub mod channel;
pub mod config;
pub mod discovery;
pub mod retry;
mod session;
pub mod subscription;

pub use channel::{
    AnonymousIdentity, ChannelConnector, ConnectionState, EndpointSource, IdentityProvider,
    SessionChannel, SessionInfo,
};
pub use config::{ConfigError, SessionConfig, TransportLimits};
pub use retry::{DefaultRetryPolicy, ExponentialBackoff, RequestRetryPolicy};
pub use session::SessionClient;
pub use subscription::{
    EventRecord, ItemWriter, MonitoredItem, Subscription, SubscriptionBuilder, SubscriptionHandle,
    SubscriptionParameters,
};

/// Tracing macro for obtaining a lock on a `Mutex`. Sometimes deadlocks can happen in code,
/// and if they do, this macro is useful for finding out where they happened.
#[macro_export]
macro_rules! trace_lock {
    ( $x:expr ) => {
        $x.lock()
    };
}

/// Tracing macro for obtaining a read lock on a `RwLock`.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {
        $x.read()
    };
}

/// Tracing macro for obtaining a write lock on a `RwLock`.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {
        $x.write()
    };
}

/// Common synchronous locks. Re-exports locks from parking_lot used internally.
pub mod sync {
    /// Read-write lock. Use this if you usually only need to read the value.
    pub type RwLock<T> = parking_lot::RwLock<T>;
    /// Mutually exclusive lock. Use this if you need both read and write often.
    pub type Mutex<T> = parking_lot::Mutex<T>;
}
