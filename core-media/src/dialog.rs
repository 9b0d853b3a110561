//! Manage-images dialog controller
//!
//! Owns one entity's [`StagedMediaSet`] for as long as the dialog is open,
//! runs preview generation in the background and drives commits through the
//! [`SyncOrchestrator`]. All methods take `&self`, so the host can share the
//! dialog between UI handlers behind an `Arc`.
//!
//! The staged set is only locked for short bookkeeping steps, never across
//! a network call. While a commit runs the operator can keep staging and the
//! view shows the live session; the new changes wait for the next commit.
//! Closing the dialog waits for a running commit to finish.

use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::api::MediaApi;
use crate::error::{MediaError, Result};
use crate::observer::DialogObserver;
use crate::orchestrator::SyncOrchestrator;
use crate::policy::ValidationPolicy;
use crate::preview::PreviewGenerator;
use crate::session::{SyncSession, SyncState};
use crate::staged::StagedMediaSet;
use crate::types::{EntityRef, LocalFile, Preview, PreviewRequest, StagedAddition};

/// Everything a dialog needs besides its entity and observer.
#[derive(Clone)]
pub struct MediaServices {
    pub api: Arc<dyn MediaApi>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub previews: PreviewGenerator,
    pub policy: ValidationPolicy,
    pub event_bus: EventBus,
}

impl MediaServices {
    pub fn new(api: Arc<dyn MediaApi>, event_bus: EventBus) -> Self {
        let orchestrator = Arc::new(SyncOrchestrator::new(api.clone(), event_bus.clone()));
        Self {
            api,
            orchestrator,
            previews: PreviewGenerator::default(),
            policy: ValidationPolicy::DEFAULT,
            event_bus,
        }
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_previews(mut self, previews: PreviewGenerator) -> Self {
        self.previews = previews;
        self
    }
}

pub struct MediaDialog {
    entity: EntityRef,
    services: MediaServices,
    observer: Arc<dyn DialogObserver>,
    staged: Arc<Mutex<StagedMediaSet>>,
    /// Written only while holding the `staged` lock
    open: Arc<AtomicBool>,
    committing: AtomicBool,
    /// Held for a whole commit, including the refetch
    commit_lock: Mutex<()>,
    status: watch::Sender<SyncSession>,
    preview_tasks: Mutex<JoinSet<()>>,
}

/// Clears the committing flag however the commit future ends.
struct CommittingGuard<'a>(&'a AtomicBool);

impl Drop for CommittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MediaDialog {
    /// Fetch the entity's images and open the dialog on them.
    #[instrument(skip(services, observer), fields(entity = %entity))]
    pub async fn open(
        entity: EntityRef,
        services: MediaServices,
        observer: Arc<dyn DialogObserver>,
    ) -> Result<Self> {
        let media = services.api.fetch_media(&entity).await?;
        let staged = StagedMediaSet::new(media, services.policy);

        observer.on_open_change(true);
        services
            .event_bus
            .emit(CoreEvent::Media(MediaEvent::DialogOpened {
                resource: entity.resource.path_segment().to_string(),
                entity_id: entity.id.clone(),
            }))
            .ok();
        info!(
            details = staged.effective_detail_count(),
            "Media dialog opened"
        );

        let (status, _) = watch::channel(SyncSession::new());
        Ok(Self {
            entity,
            services,
            observer,
            staged: Arc::new(Mutex::new(staged)),
            open: Arc::new(AtomicBool::new(true)),
            committing: AtomicBool::new(false),
            commit_lock: Mutex::new(()),
            status,
            preview_tasks: Mutex::new(JoinSet::new()),
        })
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(MediaError::DialogClosed)
        }
    }

    // ========================================================================
    // Staging
    // ========================================================================

    pub async fn stage_main_image(&self, file: LocalFile) -> Result<()> {
        let request = {
            let mut staged = self.staged.lock().await;
            self.ensure_open()?;
            staged.stage_main_image(file)?
        };
        self.spawn_previews(vec![request]).await;
        Ok(())
    }

    pub async fn stage_detail_images(&self, files: Vec<LocalFile>) -> Result<()> {
        let requests = {
            let mut staged = self.staged.lock().await;
            self.ensure_open()?;
            staged.stage_detail_images(files)?
        };
        self.spawn_previews(requests).await;
        Ok(())
    }

    pub async fn stage_removal(&self, image_ref: &str) -> Result<()> {
        let mut staged = self.staged.lock().await;
        self.ensure_open()?;
        staged.stage_removal(image_ref)?;
        Ok(())
    }

    pub async fn unstage_removal(&self, image_ref: &str) -> Result<()> {
        let mut staged = self.staged.lock().await;
        self.ensure_open()?;
        staged.unstage_removal(image_ref)?;
        Ok(())
    }

    /// Discard what is staged. A running commit is not affected.
    pub async fn clear_staged(&self) -> Result<()> {
        let mut staged = self.staged.lock().await;
        self.ensure_open()?;
        staged.clear();
        Ok(())
    }

    pub async fn has_pending_changes(&self) -> bool {
        self.staged.lock().await.has_pending_changes()
    }

    pub async fn effective_detail_count(&self) -> usize {
        self.staged.lock().await.effective_detail_count()
    }

    /// Wait until every preview started so far has finished or been aborted.
    pub async fn wait_for_previews(&self) {
        let mut tasks = self.preview_tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    warn!(error = %e, "Preview task panicked");
                }
            }
        }
    }

    async fn spawn_previews(&self, requests: Vec<PreviewRequest>) {
        if requests.is_empty() {
            return;
        }

        let mut tasks = self.preview_tasks.lock().await;
        // Reap finished tasks so the set does not grow for the dialog's lifetime
        while tasks.try_join_next().is_some() {}

        for request in requests {
            let staged = Arc::clone(&self.staged);
            let open = Arc::clone(&self.open);
            let generator = self.services.previews;
            tasks.spawn(async move {
                match generator.preview(&request.file).await {
                    Ok(preview) => {
                        let mut staged = staged.lock().await;
                        if open.load(Ordering::Acquire) {
                            staged.attach_preview(request.preview, preview);
                        }
                    }
                    Err(e) => warn!(error = %e, "Preview generation failed"),
                }
            });
        }
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Whether the commit control should be enabled.
    pub async fn can_commit(&self) -> bool {
        if self.is_committing() {
            return false;
        }
        let staged = self.staged.lock().await;
        self.is_open() && staged.has_pending_changes()
    }

    pub fn is_committing(&self) -> bool {
        self.committing.load(Ordering::Acquire)
    }

    /// Commit the staged changes.
    ///
    /// After a successful commit the media set is fetched again and the
    /// dialog shows the server's state. A failed commit returns
    /// [`MediaError::Sync`]; whatever was not confirmed goes back to staged
    /// so the operator can retry or cancel.
    #[instrument(skip(self), fields(entity = %self.entity))]
    pub async fn commit(&self) -> Result<SyncSession> {
        if self.committing.swap(true, Ordering::AcqRel) {
            return Err(MediaError::CommitInProgress);
        }
        let _committing = CommittingGuard(&self.committing);

        let session = self.run_commit().await?;
        match &session.last_error {
            Some(kind) => Err(MediaError::Sync(kind.clone())),
            None => Ok(session),
        }
    }

    async fn run_commit(&self) -> Result<SyncSession> {
        let _commit = self.commit_lock.lock().await;
        self.ensure_open()?;

        let session = self
            .services
            .orchestrator
            .commit_with_status(
                &self.entity,
                &self.staged,
                self.observer.as_ref(),
                &self.status,
            )
            .await;

        if session.state == SyncState::Done && session.deleted + session.uploaded > 0 {
            match self.services.api.fetch_media(&self.entity).await {
                Ok(media) => self.staged.lock().await.reseed(media),
                Err(e) => warn!(error = %e, "Refetch after commit failed, keeping local state"),
            }
        }

        Ok(session)
    }

    /// The running commit's session, else the most recent one; `Idle` if
    /// none ran since opening.
    pub fn last_session(&self) -> SyncSession {
        self.status.borrow().clone()
    }

    /// Follow session updates as a commit advances.
    pub fn subscribe_session(&self) -> watch::Receiver<SyncSession> {
        self.status.subscribe()
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Close the dialog, discarding anything still staged.
    ///
    /// Makes no network call. A commit in progress runs to completion first.
    /// Closing twice is a no-op.
    pub async fn close(&self) {
        let _commit = self.commit_lock.lock().await;
        let discarded = {
            let mut staged = self.staged.lock().await;
            if !self.open.swap(false, Ordering::AcqRel) {
                return;
            }
            let discarded = staged.has_pending_changes();
            staged.clear();
            discarded
        };

        self.preview_tasks.lock().await.abort_all();
        self.status.send_replace(SyncSession::new());

        self.observer.on_open_change(false);
        self.services
            .event_bus
            .emit(CoreEvent::Media(MediaEvent::DialogClosed {
                resource: self.entity.resource.path_segment().to_string(),
                entity_id: self.entity.id.clone(),
                discarded_changes: discarded,
            }))
            .ok();
        debug!(entity = %self.entity, discarded, "Media dialog closed");
    }

    // ========================================================================
    // View
    // ========================================================================

    /// Snapshot of everything the dialog renders. Never waits for a commit.
    pub async fn view(&self) -> DialogView {
        let committing = self.is_committing();
        let last_session = self.last_session();

        let staged = self.staged.lock().await;
        let file_view = |addition: &StagedAddition| StagedFileView {
            name: addition.file().name.clone(),
            size: addition.file().size(),
            preview: staged.preview(addition.preview_ref()).cloned(),
        };

        DialogView {
            entity: self.entity.clone(),
            open: self.is_open(),
            main_image_ref: staged.baseline().main_image_ref.clone(),
            active_detail_refs: staged
                .active_detail_refs()
                .into_iter()
                .map(str::to_string)
                .collect(),
            staged_removals: staged.staged_removals().to_vec(),
            staged_main: staged.staged_main().map(file_view),
            staged_details: staged.staged_details().iter().map(file_view).collect(),
            in_flight_removals: staged.in_flight_removals().to_vec(),
            in_flight_files: staged.in_flight_additions().map(file_view).collect(),
            effective_detail_count: staged.effective_detail_count(),
            max_detail_images: staged.policy().max_detail_images,
            can_commit: self.is_open() && !committing && staged.has_pending_changes(),
            committing,
            last_session,
        }
    }
}

/// Read model of an open dialog.
#[derive(Debug, Clone, Serialize)]
pub struct DialogView {
    pub entity: EntityRef,
    pub open: bool,
    pub main_image_ref: String,
    pub active_detail_refs: Vec<String>,
    pub staged_removals: Vec<String>,
    pub staged_main: Option<StagedFileView>,
    pub staged_details: Vec<StagedFileView>,
    /// Removals the running commit is sending
    pub in_flight_removals: Vec<String>,
    /// Uploads the running commit is sending, main image first
    pub in_flight_files: Vec<StagedFileView>,
    pub effective_detail_count: usize,
    pub max_detail_images: usize,
    pub can_commit: bool,
    pub committing: bool,
    pub last_session: SyncSession,
}

/// A staged file as shown in the dialog; `preview` is `None` until rendered.
#[derive(Debug, Clone, Serialize)]
pub struct StagedFileView {
    pub name: String,
    pub size: u64,
    pub preview: Option<Preview>,
}
