//! Display & Video 360 REST API access
//!
//! The network sits behind [`HttpTransport`]; everything above it builds
//! [`ApiRequest`]s from URI templates and reads JSON back:
//! - [`ResourceClient`] does list/get/create/update/delete for one kind
//! - [`TargetingReconciler`] applies desired assigned targeting options to line items

pub mod auth;
pub mod client;
pub mod error;
pub mod path;
pub mod request;
pub mod resilience;
pub mod targeting;
pub mod transport;

#[cfg(test)]
pub mod mock;

pub use auth::{EnvToken, StaticToken, TokenProvider};
pub use client::{ResourceClient, UpdateOutcome, fetch_all_pages};
pub use error::ApiError;
pub use request::ApiRequest;
pub use resilience::{ResilienceConfig, RetryConfig, RetryPolicy};
pub use targeting::{BulkEditPlan, Reconciliation, TargetingReconciler};
pub use transport::{HttpTransport, ReqwestTransport};
