//! # Media Engine
//!
//! Staged image management for product and spare-part entities.
//!
//! ## Overview
//!
//! A manage-images dialog lets the operator assemble a change to an entity's
//! images locally before anything is sent:
//!
//! - replace the main image
//! - add a batch of detail images
//! - mark existing detail images for deletion, and undo that
//!
//! Every change is validated against a [`ValidationPolicy`] (file size, detail
//! image count) as it is staged. Committing runs two ordered calls against the
//! Media API: one batched delete, then one multipart upload.
//!
//! ## Components
//!
//! - [`StagedMediaSet`]: pending changes and their invariants
//! - [`PreviewGenerator`]: local thumbnails for staged files
//! - [`SyncOrchestrator`]: the delete-then-upload commit and its [`SyncSession`]
//! - [`HttpMediaApi`]: the [`MediaApi`] over the host `HttpClient`
//! - [`MediaDialog`]: the controller a host UI drives
//!
//! ## Example
//!
//! ```ignore
//! use core_media::{EntityRef, HttpMediaApi, LocalFile, MediaDialog, MediaServices, NoopObserver};
//!
//! let api = Arc::new(HttpMediaApi::new(http_client, credentials, "https://api.example.com"));
//! let services = MediaServices::new(api, event_bus);
//!
//! let dialog = MediaDialog::open(EntityRef::product("42"), services, Arc::new(NoopObserver)).await?;
//! dialog.stage_removal("uploads/old.jpg").await?;
//! dialog.stage_detail_images(vec![LocalFile::new("new.jpg", "image/jpeg", bytes)]).await?;
//! let session = dialog.commit().await?;
//! dialog.close().await;
//! ```

pub mod api;
pub mod dialog;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod policy;
pub mod preview;
pub mod session;
pub mod staged;
pub mod types;

pub use api::{HttpMediaApi, MediaApi};
pub use dialog::{DialogView, MediaDialog, MediaServices, StagedFileView};
pub use error::{ApiError, MediaError, Result, SyncErrorKind, SyncPhase, ValidationError};
pub use observer::{DialogObserver, NoopObserver};
pub use orchestrator::SyncOrchestrator;
pub use policy::ValidationPolicy;
pub use preview::PreviewGenerator;
pub use session::{SyncSession, SyncSessionId, SyncState};
pub use staged::{CommitPlan, StagedMediaSet};
pub use types::{
    EntityRef, LocalFile, MediaSet, Preview, PreviewRef, PreviewRequest, ResourceKind,
    StagedAddition, UploadBatch,
};
