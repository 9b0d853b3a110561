//! HTTP Client Abstraction
//!
//! Provides async HTTP operations with bearer auth, JSON and multipart bodies,
//! and retry configuration.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A single part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Form field name (may repeat across parts)
    pub field: String,
    /// File name reported to the server; `None` for plain text fields
    pub file_name: Option<String>,
    /// MIME type of the part
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Platform-neutral description of a multipart form.
///
/// Adapters translate this into their native form type (e.g.
/// `reqwest::multipart::Form`), so the core never builds boundaries itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<MultipartPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file part.
    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Bytes,
    ) -> Self {
        self.parts.push(MultipartPart {
            field: field.into(),
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data,
        });
        self
    }

    /// Append a plain text part.
    pub fn text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let value: String = value.into();
        self.parts.push(MultipartPart {
            field: field.into(),
            file_name: None,
            content_type: None,
            data: Bytes::from(value),
        });
        self
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// Parts carrying the given field name, in insertion order.
    pub fn parts_named<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a MultipartPart> {
        self.parts.iter().filter(move |part| part.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Request body
#[derive(Debug, Clone)]
pub enum HttpBody {
    /// Raw bytes; the caller sets `Content-Type`
    Bytes(Bytes),
    /// Multipart form; the adapter sets `Content-Type` with its boundary
    Multipart(MultipartForm),
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<HttpBody>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(HttpBody::Bytes(Bytes::from(json)));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(HttpBody::Bytes(body));
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(HttpBody::Multipart(form));
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// The multipart form carried by this request, if any.
    pub fn multipart_form(&self) -> Option<&MultipartForm> {
        match &self.body {
            Some(HttpBody::Multipart(form)) => Some(form),
            _ => None,
        }
    }

    /// The raw body bytes carried by this request, if any.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Some(HttpBody::Bytes(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Build a response with no headers
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// Get response body as UTF-8 string
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (1 disables retries)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// Async HTTP client trait
///
/// This trait abstracts HTTP operations to allow platform-specific implementations.
/// Implementations should handle:
/// - TLS certificate validation
/// - Connection pooling and keep-alive
/// - Translating [`MultipartForm`] into the native multipart encoding
///
/// Non-2xx statuses are *not* errors at this layer; callers inspect
/// [`HttpResponse::status`].
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
///
/// async fn fetch_product(client: &dyn HttpClient) -> Result<String> {
///     let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/products/42")
///         .bearer_token("token");
///
///     let response = client.execute(request).await?;
///     response.text()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - TLS validation fails
    /// - Request times out
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute an HTTP request with custom retry policy
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        // Implementations can override for custom retry logic
        let _ = policy;
        self.execute(request).await
    }
}
