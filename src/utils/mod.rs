//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `channelhub` application.
//!
//! It centralizes the error taxonomy shared by the repos, the hub use cases
//! and the HTTP layer, plus logging setup.

pub mod error;
pub mod logging;
