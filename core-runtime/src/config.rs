//! # Core Configuration Module
//!
//! Provides configuration management for the storefront admin core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every dependency and setting the core needs. Validation is
//! fail-fast: a config that builds is a config the media engine can run with.
//!
//! ## Required Dependencies
//!
//! - `api_base_url` - Root of the storefront REST API (`http`/`https`)
//! - `HttpClient` - API requests, including multipart uploads
//! - `SecureStore` - Session token persistence
//!
//! With the `desktop-shims` feature, `ReqwestHttpClient` and
//! `KeyringSecureStore` are injected when the host does not provide its own.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, MediaConfig};
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .media(MediaConfig::default().with_max_detail_images(8))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing base URL
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing API base URL");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{FileSystemAccess, HttpClient, SecureStore};
use std::sync::Arc;

/// Default per-request timeout for API calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Image policy and preview settings for the manage-images dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConfig {
    /// Upper bound on detail images per entity after staged changes apply.
    pub max_detail_images: usize,
    /// Per-file size limit in bytes.
    pub max_file_size_bytes: u64,
    /// Longest edge of generated preview thumbnails, in pixels.
    pub preview_max_dimension: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_detail_images: 5,
            max_file_size_bytes: 512_000,
            preview_max_dimension: 320,
        }
    }
}

impl MediaConfig {
    pub fn with_max_detail_images(mut self, max: usize) -> Self {
        self.max_detail_images = max;
        self
    }

    pub fn with_max_file_size_bytes(mut self, max: u64) -> Self {
        self.max_file_size_bytes = max;
        self
    }

    pub fn with_preview_max_dimension(mut self, px: u32) -> Self {
        self.preview_max_dimension = px;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_detail_images == 0 {
            return Err(Error::Config(
                "max_detail_images must be greater than 0".to_string(),
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(Error::Config(
                "max_file_size_bytes must be greater than 0".to_string(),
            ));
        }

        if !(16..=4096).contains(&self.preview_max_dimension) {
            return Err(Error::Config(format!(
                "preview_max_dimension must be between 16 and 4096 px (got {})",
                self.preview_max_dimension
            )));
        }

        Ok(())
    }
}

/// Core configuration for the storefront admin core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// API root without trailing slash, e.g. `https://api.example.com`
    pub api_base_url: String,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    /// Reads operator-selected files when the host hands over paths instead
    /// of bytes (optional)
    pub file_system: Option<Arc<dyn FileSystemAccess>>,

    pub media: MediaConfig,

    pub request_timeout_secs: u64,

    /// Capacity of the core event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .field("media", &self.media)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Base URL uses `http` or `https` and names a host
    /// - Request timeout is within 1..=300 seconds
    /// - Event buffer is non-empty
    /// - Media policy values are usable
    pub fn validate(&self) -> Result<()> {
        validate_base_url(&self.api_base_url)?;

        if !(1..=300).contains(&self.request_timeout_secs) {
            return Err(Error::Config(format!(
                "Request timeout must be between 1 and 300 seconds (got {})",
                self.request_timeout_secs
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        self.media.validate()
    }
}

fn validate_base_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            Error::Config(format!(
                "API base URL must start with http:// or https:// (got '{}')",
                url
            ))
        })?;

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(Error::Config(format!(
            "API base URL has no host (got '{}')",
            url
        )));
    }

    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout_secs: u64) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for Media API calls. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Web: inject a fetch-based client that supports multipart bodies."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout_secs: u64) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(std::time::Duration::from_secs(timeout_secs))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for session token persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
                 Web: inject a session-storage backed store."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    Ok(Arc::new(KeyringSecureStore::new()))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    media: Option<MediaConfig>,
    request_timeout_secs: Option<u64>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the API base URL. A trailing slash is removed.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder().api_base_url("https://api.example.com/");
    /// ```
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based default is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store used for the session token.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn media(mut self, media: MediaConfig) -> Self {
        self.media = Some(media);
        self
    }

    /// Default: 30 seconds
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    ///
    /// Fails if the base URL is missing or malformed, a required bridge is
    /// missing without a platform default, or a setting is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self
            .api_base_url
            .ok_or_else(|| {
                Error::Config(
                    "API base URL is required. Use .api_base_url() to set it.".to_string(),
                )
            })?
            .trim_end_matches('/')
            .to_string();

        let request_timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout_secs)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            api_base_url,
            http_client,
            secure_store,
            file_system: self.file_system,
            media: self.media.unwrap_or_default(),
            request_timeout_secs,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
