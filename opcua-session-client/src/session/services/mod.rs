//! Typed wrappers over the service set: each method builds the request
//! record, sends it through the pending-request queue, and unpacks the
//! matching response.

mod attributes;
mod subscriptions;
mod view;
