//! # ChannelHub
//!
//! `channelhub` relays trade messages between jurisdictions and fans out
//! notifications to WebSub style subscribers. Every stage runs as its own
//! queue-driven worker so the HTTP API never blocks on a remote call.
//!
//! ## Core Modules
//!
//! - `domain`: messages, job payloads, topic patterns and subscriptions.
//! - `repos`: the message store, job queues and subscription index, backed by
//!   sled or by process memory.
//! - `hub`: the use cases (receive, relay, publish, dispatch, deliver,
//!   subscribe) and the retry policy shared by the outbound stages.
//! - `worker`: the polling loop that drives a use case until shutdown.
//! - `transport`: the axum HTTP API.
//! - `config`: layered settings from `config/default.toml` and environment.
//! - `utils`: error types and logging setup.

pub mod app;
pub mod config;
pub mod domain;
pub mod hub;
pub mod repos;
pub mod transport;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod tests;
