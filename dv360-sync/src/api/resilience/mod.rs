//! Retry policies and request monitoring switches for API calls

pub mod config;
pub mod retry;

pub use config::{MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use retry::{RetryConfig, RetryPolicy, parse_retry_after};
