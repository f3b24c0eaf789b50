//! Common building blocks shared across quarry crates.
//!
//! - **Configuration**: Strongly typed client configuration (`config`).
//! - **Polling**: Backoff between status checks (`poll`).
//! - **Telemetry**: Logging setup (`telemetry`).
pub mod config;
pub mod poll;
pub mod telemetry;

pub use crate::config::{ClientConfig, PollSettings};
