//! The `transport` module is the HTTP boundary of the hub.
//!
//! It accepts outgoing messages for relay, incoming-message announcements
//! from the partner channel, and WebSub subscription requests, and hands each
//! of them to the matching use case. Delivery itself never happens inline.

pub mod http;
pub mod message;

pub use http::{ApiError, ApiState, router, serve};
