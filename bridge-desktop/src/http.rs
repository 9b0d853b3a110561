//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm, RetryPolicy},
};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Retry with exponential backoff on 5xx/429 and transport errors
/// - Native multipart encoding for image uploads
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("storefront-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Translate the bridge multipart description into a reqwest form.
    ///
    /// `reqwest::multipart::Form` is not `Clone`, so a fresh form is built for
    /// every attempt.
    fn convert_form(form: &MultipartForm) -> Result<Form> {
        let mut out = Form::new();
        for part in form.parts() {
            let mut native = Part::bytes(part.data.to_vec());
            if let Some(name) = &part.file_name {
                native = native.file_name(name.clone());
            }
            if let Some(content_type) = &part.content_type {
                native = native.mime_str(content_type).map_err(|e| {
                    BridgeError::OperationFailed(format!(
                        "Invalid content type '{}': {}",
                        content_type, e
                    ))
                })?;
            }
            out = out.part(part.field.clone(), native);
        }
        Ok(out)
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder> {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        match &request.body {
            Some(HttpBody::Bytes(body)) => req = req.body(body.clone()),
            Some(HttpBody::Multipart(form)) => req = req.multipart(Self::convert_form(form)?),
            None => {}
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        Ok(req)
    }

    /// Send `request` up to `policy.max_attempts` times.
    ///
    /// 5xx, 429 and transport failures are retried; the last attempt's
    /// response is returned whatever its status.
    async fn send_with_policy(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
    ) -> Result<HttpResponse> {
        let attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = backoff_delay(policy, attempt - 1);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }

            debug!(attempt, max_attempts = attempts, url = %request.url, "Sending request");
            let outcome = self.build_request(request)?.send().await;

            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if is_retryable_status(status) && attempt < attempts {
                        warn!(status, attempt, "Retryable HTTP status");
                        last_error = Some(BridgeError::OperationFailed(format!(
                            "HTTP {} error",
                            status
                        )));
                        continue;
                    }
                    return read_response(response).await;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "HTTP request failed");
                    last_error = Some(transport_error(&e, &request.url));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

fn is_retryable_status(status: u16) -> bool {
    status >= 500 || status == 429
}

/// Delay before retry number `retry` (1-based).
fn backoff_delay(policy: &RetryPolicy, retry: u32) -> Duration {
    if !policy.use_exponential_backoff {
        return policy.base_delay;
    }
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    policy
        .base_delay
        .checked_mul(factor)
        .map_or(policy.max_delay, |d| d.min(policy.max_delay))
}

fn transport_error(e: &reqwest::Error, url: &str) -> BridgeError {
    if e.is_timeout() {
        BridgeError::Timeout(url.to_string())
    } else if e.is_connect() {
        BridgeError::OperationFailed(format!("Connection failed: {}", e))
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

/// Status interpretation belongs to the caller.
async fn read_response(response: reqwest::Response) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
        .collect();
    let body = response
        .bytes()
        .await
        .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.send_with_policy(&request, &policy).await
    }
}
