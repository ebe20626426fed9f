mod session;
mod subscriptions;
mod utils;
