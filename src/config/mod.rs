//! # Configuration
//!
//! Environment-driven controller settings.

mod controller;

pub use controller::{is_cloud_gov_host, ConfigError, ControllerConfig};
