//! # api-adapters
//!
//! Inbound adapters for the course marketplace: the axum router (feature
//! `web-axum`), server-rendered pages and the metrics registry.

pub mod metrics;
pub mod views;

#[cfg(feature = "web-axum")]
pub mod http;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use http::{router, ApiError, AppState, HttpSettings};
