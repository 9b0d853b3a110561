//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the storefront admin core:
//! - Logging and tracing setup
//! - Configuration management with fail-fast validation
//! - Event bus for auth and media lifecycle events
//!
//! Every other core crate depends on this one for its conventions: logging
//! targets, the shape of configuration errors, and the event types the host
//! subscribes to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
