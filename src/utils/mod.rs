//! # Utility Modules
//!
//! Supporting utilities shared by sessions.
//!
//! ## Components
//! - **Logging**: tracing subscriber setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: thread-safe per-session counters

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsSnapshot, RpcMetrics};
