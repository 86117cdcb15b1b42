//! Keep spreadsheet rows in sync with Display & Video 360 entities
//!
//! - [`model`]: resource kinds and instances
//! - [`codec`]: rows to entities and back, patch masks, display translators
//! - [`api`]: transport, CRUD client, targeting reconciliation
//! - [`sync`]: row stores and the sync orchestrator
//! - [`config`]: TOML configuration

pub mod api;
pub mod codec;
pub mod config;
pub mod model;
pub mod sync;
