//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the storefront core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that is provided differently per host (desktop admin
//! console, embedded webview, test harness).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with JSON and multipart bodies
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Reading locally selected files
//!
//! ### Security
//! - [`SecureStore`](storage::SecureStore) - Session credential persistence (Keychain/Keystore)
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Web      | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let http_client = config.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided. \
//!                  Desktop: enable the desktop-shims feature.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and include context (file paths, HTTP status) in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`
//! across async tasks.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod log;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{
    HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm, MultipartPart,
    RetryPolicy,
};
pub use storage::{FileMetadata, FileSystemAccess, SecureStore};
pub use log::{LogEntry, LogLevel, LoggerSink};
