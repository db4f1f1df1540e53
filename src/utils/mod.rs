//! # Utility Modules
//!
//! Supporting utilities shared by the codec, the session and the transport.
//!
//! ## Components
//! - **Logging**: structured logging configuration
//! - **Metrics**: thread-safe observability counters
//! - **Timeout**: default deadlines and an optional-deadline wrapper

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
