//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for the desktop admin console
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, including multipart uploads
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` using the `keyring` crate
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let fs = TokioFileSystem::new();
//! ```

mod filesystem;
mod http;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
