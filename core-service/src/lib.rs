//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into the session credentials
//! and the media engine, and hands the host a single [`CoreService`] to drive
//! the manage-images dialogs from. Desktop hosts typically keep the default
//! `desktop-shims` feature, which injects the `bridge-desktop` adapters for
//! anything the config leaves out.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_media::{EntityRef, NoopObserver};
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .build()?;
//! let core = core_service::bootstrap(config).await?;
//!
//! let dialog = core
//!     .open_media_dialog(EntityRef::product("65f0c1"), Arc::new(NoopObserver))
//!     .await?;
//! dialog.stage_removal("uploads/old.jpg").await?;
//! dialog.commit().await?;
//! dialog.close().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::storage::FileSystemAccess;
use core_auth::{AuthError, SessionCredentials, SessionState, SessionToken};
use core_media::{
    DialogObserver, EntityRef, HttpMediaApi, LocalFile, MediaDialog, MediaServices,
    PreviewGenerator, ValidationPolicy,
};
use core_runtime::config::{CoreConfig, MediaConfig};
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use tracing::{info, instrument, warn};

pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient, TokioFileSystem};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    credentials: Arc<SessionCredentials>,
    media: MediaServices,
}

impl CoreService {
    /// Wire the service from a validated config. No I/O happens here; use
    /// [`bootstrap`] to also restore a stored session.
    pub fn new(config: CoreConfig) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let credentials = Arc::new(SessionCredentials::new(
            config.secure_store.clone(),
            event_bus.clone(),
        ));

        let api = HttpMediaApi::new(
            config.http_client.clone(),
            credentials.clone(),
            config.api_base_url.clone(),
        )
        .with_timeout(Duration::from_secs(config.request_timeout_secs));

        let media = MediaServices::new(Arc::new(api), event_bus.clone())
            .with_policy(ValidationPolicy::from(&config.media))
            .with_previews(PreviewGenerator::new(config.media.preview_max_dimension));

        Self {
            config: Arc::new(config),
            event_bus,
            credentials,
            media,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to auth and media lifecycle events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn credentials(&self) -> Arc<SessionCredentials> {
        Arc::clone(&self.credentials)
    }

    pub fn media_config(&self) -> &MediaConfig {
        &self.config.media
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Start a session with a token obtained by the host's login flow.
    pub async fn sign_in(&self, token: SessionToken) -> Result<()> {
        self.credentials.init(token).await?;
        Ok(())
    }

    /// End the session. Open dialogs stay open but every API call fails with
    /// `NotAuthenticated` until the next sign-in.
    pub async fn sign_out(&self) -> Result<()> {
        self.credentials.clear().await?;
        Ok(())
    }

    pub async fn session_state(&self) -> SessionState {
        self.credentials.state().await
    }

    // ========================================================================
    // Media
    // ========================================================================

    /// Fetch the entity's images and open a manage-images dialog on them.
    #[instrument(skip(self, observer), fields(entity = %entity))]
    pub async fn open_media_dialog(
        &self,
        entity: EntityRef,
        observer: Arc<dyn DialogObserver>,
    ) -> Result<MediaDialog> {
        let dialog = MediaDialog::open(entity, self.media.clone(), observer).await?;
        Ok(dialog)
    }

    /// Read an operator-selected file from disk so it can be staged.
    ///
    /// Files over the configured size limit are rejected without reading them.
    pub async fn load_local_file(&self, path: impl AsRef<Path>) -> Result<LocalFile> {
        let fs = self.file_system()?;
        let limit = self.config.media.max_file_size_bytes;
        let file = LocalFile::from_path(fs.as_ref(), path.as_ref(), limit).await?;
        Ok(file)
    }

    fn file_system(&self) -> Result<Arc<dyn FileSystemAccess>> {
        if let Some(fs) = &self.config.file_system {
            return Ok(Arc::clone(fs));
        }
        default_file_system()
    }
}

#[cfg(feature = "desktop-shims")]
fn default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(CoreError::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "Loading files by path needs a FileSystemAccess implementation. \
                 Inject one in CoreConfig or enable the 'desktop-shims' feature; \
                 hosts that already hold the bytes can build a LocalFile directly."
            .to_string(),
    })
}

/// Build the service and restore any session persisted by a previous launch.
///
/// A corrupted stored session is discarded and the service starts signed
/// out; an unavailable secure store is an error.
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    let service = CoreService::new(config);

    match service.credentials.restore().await {
        Ok(state) => info!(?state, "Core service ready"),
        Err(AuthError::SessionCorrupted { reason }) => {
            warn!(%reason, "Discarded corrupted session, starting signed out");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(service)
}
