//! Atlas Connection Controller Library
//!
//! Core of a control plane that keeps Atlas connection secrets in sync with
//! `AtlasDatabaseUser` resources and re-triggers reconciles of every resource
//! depending on a Secret that changed.
//!
//! ## Quick Start
//!
//! ```rust
//! use atlas_connection_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod audit;
pub mod client;
pub mod config;
pub mod connsecret;
pub mod constants;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod server;
pub mod watch;
pub mod workflow;
