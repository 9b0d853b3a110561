//! Media API client
//!
//! Three calls per entity, all carrying the operator's bearer token:
//!
//! | Call           | Request                                          |
//! |----------------|--------------------------------------------------|
//! | fetch          | `GET {base}/{resource}/{id}`                     |
//! | delete images  | `POST {base}/{resource}/{id}/images/delete` JSON |
//! | upload images  | `POST {base}/{resource}/{id}/images` multipart   |
//!
//! The delete and upload calls are sent exactly once; retrying them is the
//! operator's decision. A 401 on any call marks the session expired.

use async_trait::async_trait;
use bridge_traits::http::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm, RetryPolicy,
};
use core_auth::CredentialProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::ApiError;
use crate::types::{EntityRef, MediaSet, UploadBatch};

/// Multipart field for the replacement main image.
pub const MAIN_IMAGE_FIELD: &str = "mainImage";

/// Multipart field repeated once per new detail image.
pub const DETAIL_IMAGES_FIELD: &str = "detailImages";

/// Longest server error message kept in [`ApiError::Status`].
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Remote image operations for catalog entities.
#[async_trait]
pub trait MediaApi: Send + Sync {
    /// Fetch the entity's current images.
    async fn fetch_media(&self, entity: &EntityRef) -> Result<MediaSet, ApiError>;

    /// Delete detail images by path in one call.
    async fn delete_images(
        &self,
        entity: &EntityRef,
        image_paths: &[String],
    ) -> Result<(), ApiError>;

    /// Upload a main image and/or detail images in one multipart call.
    async fn upload_images(&self, entity: &EntityRef, batch: UploadBatch) -> Result<(), ApiError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteImagesBody<'a> {
    image_paths: &'a [String],
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// [`MediaApi`] over the host [`HttpClient`].
pub struct HttpMediaApi {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpMediaApi {
    /// `base_url` is the API root without a trailing slash.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn entity_url(&self, entity: &EntityRef) -> String {
        format!("{}/{}", self.base_url, entity.path())
    }

    /// Attach the bearer token and send.
    ///
    /// Fails with [`ApiError::Auth`] before any I/O when there is no session.
    async fn send(
        &self,
        request: HttpRequest,
        retry: Option<RetryPolicy>,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.credentials.bearer_token().await?;

        let mut request = request.bearer_token(token);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = match retry {
            Some(policy) => self.http_client.execute_with_retry(request, policy).await?,
            None => self.http_client.execute(request).await?,
        };

        if response.status == 401 {
            warn!("Media API answered 401");
            self.credentials.mark_expired().await;
            return Err(ApiError::AuthExpired);
        }

        if !response.is_success() {
            let message = error_message(&response);
            warn!(status = response.status, message = %message, "Media API request failed");
            return Err(ApiError::Status {
                status: response.status,
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl MediaApi for HttpMediaApi {
    #[instrument(skip(self), fields(entity = %entity))]
    async fn fetch_media(&self, entity: &EntityRef) -> Result<MediaSet, ApiError> {
        let request = HttpRequest::new(HttpMethod::Get, self.entity_url(entity));
        let response = self.send(request, None).await?;

        let media: MediaSet = response
            .json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        debug!(
            main = media.has_main_image(),
            details = media.detail_image_refs.len(),
            "Fetched media set"
        );
        Ok(media)
    }

    #[instrument(skip(self, image_paths), fields(entity = %entity, count = image_paths.len()))]
    async fn delete_images(
        &self,
        entity: &EntityRef,
        image_paths: &[String],
    ) -> Result<(), ApiError> {
        let url = format!("{}/images/delete", self.entity_url(entity));
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&DeleteImagesBody { image_paths })?;

        self.send(request, Some(RetryPolicy::no_retry())).await?;
        info!("Deleted {} images", image_paths.len());
        Ok(())
    }

    #[instrument(skip(self, batch), fields(entity = %entity, files = batch.len()))]
    async fn upload_images(&self, entity: &EntityRef, batch: UploadBatch) -> Result<(), ApiError> {
        let mut form = MultipartForm::new();
        if let Some(main) = batch.main_image {
            form = form.file(MAIN_IMAGE_FIELD, main.name, main.content_type, main.bytes);
        }
        for detail in batch.detail_images {
            form = form.file(
                DETAIL_IMAGES_FIELD,
                detail.name,
                detail.content_type,
                detail.bytes,
            );
        }

        let url = format!("{}/images", self.entity_url(entity));
        let request = HttpRequest::new(HttpMethod::Post, url).multipart(form);

        self.send(request, Some(RetryPolicy::no_retry())).await?;
        info!("Uploaded images");
        Ok(())
    }
}

/// Pull a readable message out of an error response.
fn error_message(response: &HttpResponse) -> String {
    let parsed = response
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.message.or(body.error));

    let message = match parsed {
        Some(message) => message,
        None => String::from_utf8_lossy(&response.body).trim().to_string(),
    };

    if message.is_empty() {
        return format!("HTTP {}", response.status);
    }
    if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        return format!("{}…", truncated);
    }
    message
}
