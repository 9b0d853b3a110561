//! # Authentication Module
//!
//! Session credentials for the storefront admin API.
//!
//! ## Overview
//!
//! The login flow lives in the host; this crate only holds the resulting
//! bearer token. API clients receive a [`CredentialProvider`] at construction
//! instead of reading a process-wide token, and the session has an explicit
//! lifecycle:
//!
//! - `init` on session start (stores the token in the platform secure store)
//! - `restore` on launch (reloads a previously stored token)
//! - `clear` on logout
//! - `mark_expired` when the API answers 401
//!
//! Lifecycle changes are announced as `AuthEvent`s on the core event bus.

pub mod error;
pub mod provider;
pub mod session;
pub mod types;

pub use error::{AuthError, Result};
pub use provider::CredentialProvider;
pub use session::SessionCredentials;
pub use types::{SessionState, SessionToken};
