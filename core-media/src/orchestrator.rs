//! Two-phase commit of staged media changes
//!
//! A commit runs at most two network calls, strictly in order:
//!
//! 1. **Delete**: one batched call removing every staged removal.
//! 2. **Upload**: one multipart call with the staged main and detail images.
//!
//! The upload is never attempted when the delete fails. A failed upload does
//! not undo the delete; the operator is told the deletions are final. Each
//! phase confirms its own part of the plan once the server accepts it, so
//! committing again after a failure only repeats what is still pending.
//!
//! The staged set is locked only to take the plan and to record each
//! phase's outcome, never across a network call, so the dialog can keep
//! staging and rendering while a commit runs.

use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::api::MediaApi;
use crate::error::{image_count, MediaError, Result, SyncErrorKind, SyncPhase};
use crate::observer::{DialogObserver, NoopObserver};
use crate::session::{SyncSession, SyncState};
use crate::staged::{CommitPlan, StagedMediaSet};
use crate::types::{EntityRef, UploadBatch};

pub struct SyncOrchestrator {
    api: Arc<dyn MediaApi>,
    event_bus: EventBus,
}

impl SyncOrchestrator {
    pub fn new(api: Arc<dyn MediaApi>, event_bus: EventBus) -> Self {
        Self { api, event_bus }
    }

    pub fn api(&self) -> &Arc<dyn MediaApi> {
        &self.api
    }

    /// Commit the staged changes without an observer.
    pub async fn commit(&self, entity: &EntityRef, staged: &Mutex<StagedMediaSet>) -> SyncSession {
        self.commit_observed(entity, staged, &NoopObserver).await
    }

    /// Commit the staged changes, notifying `observer` once on success.
    pub async fn commit_observed(
        &self,
        entity: &EntityRef,
        staged: &Mutex<StagedMediaSet>,
        observer: &dyn DialogObserver,
    ) -> SyncSession {
        let (status, _) = watch::channel(SyncSession::new());
        self.commit_with_status(entity, staged, observer, &status)
            .await
    }

    /// Commit the staged changes, publishing every session update on `status`.
    ///
    /// The returned session is terminal: `Done`, or `Error` with
    /// `last_error` set. Nothing staged means `Done` without any network call.
    #[instrument(skip(self, staged, observer, status), fields(entity = %entity))]
    pub async fn commit_with_status(
        &self,
        entity: &EntityRef,
        staged: &Mutex<StagedMediaSet>,
        observer: &dyn DialogObserver,
        status: &watch::Sender<SyncSession>,
    ) -> SyncSession {
        let mut session = SyncSession::new();

        let Some(plan) = staged.lock().await.begin_commit() else {
            debug!("Nothing staged, commit is a no-op");
            // Idle -> Done is always allowed
            session.advance(SyncState::Done).ok();
            status.send_replace(session.clone());
            return session;
        };

        let removals = plan.removals.len();
        let additions = plan.uploads.len();
        info!(removals, additions, session_id = %session.id, "Starting media commit");
        self.emit(MediaEvent::CommitStarted {
            session_id: session.id.to_string(),
            entity_id: entity.id.clone(),
            removals,
            additions,
        });

        let outcome = self
            .run(entity, staged, plan, observer, &mut session, status)
            .await;

        match outcome {
            Ok(()) => {
                info!(
                    deleted = session.deleted,
                    uploaded = session.uploaded,
                    "Media commit completed"
                );
                self.emit(MediaEvent::Committed {
                    session_id: session.id.to_string(),
                    entity_id: entity.id.clone(),
                    deleted: session.deleted,
                    uploaded: session.uploaded,
                    duration_ms: session.duration_ms().unwrap_or(0),
                });
            }
            Err(err) => {
                staged.lock().await.abort_commit();

                let kind = classify(err, &session);
                warn!(error = %kind, state = %session.state, "Media commit failed");

                let message = kind.message();
                if let Err(e) = session.fail(kind) {
                    warn!(error = %e, "Could not record commit failure");
                }
                self.emit(MediaEvent::CommitFailed {
                    session_id: session.id.to_string(),
                    entity_id: entity.id.clone(),
                    message,
                    deletions_applied: session.deleted > 0,
                });
            }
        }

        status.send_replace(session.clone());
        session
    }

    async fn run(
        &self,
        entity: &EntityRef,
        staged: &Mutex<StagedMediaSet>,
        plan: CommitPlan,
        observer: &dyn DialogObserver,
        session: &mut SyncSession,
        status: &watch::Sender<SyncSession>,
    ) -> Result<()> {
        let CommitPlan { removals, uploads } = plan;

        if !removals.is_empty() {
            session.advance(SyncState::Deleting)?;
            self.report(
                session,
                status,
                entity,
                format!("Deleting {}…", image_count(removals.len())),
            );

            self.api.delete_images(entity, &removals).await?;
            staged.lock().await.confirm_removals();
            session.deleted = removals.len();
        }

        if !uploads.is_empty() {
            session.advance(SyncState::Uploading)?;
            let count = uploads.len();
            self.report(session, status, entity, upload_progress(&uploads));

            self.api.upload_images(entity, uploads).await?;
            staged.lock().await.confirm_additions();
            session.uploaded = count;
        }

        session.advance(SyncState::Committing)?;
        status.send_replace(session.clone());
        staged.lock().await.finish_commit();
        observer.on_upload_complete(entity);
        session.advance(SyncState::Done)?;
        Ok(())
    }

    fn report(
        &self,
        session: &mut SyncSession,
        status: &watch::Sender<SyncSession>,
        entity: &EntityRef,
        message: String,
    ) {
        debug!(%message, "Commit progress");
        session.record_progress(message.clone());
        status.send_replace(session.clone());
        self.emit(MediaEvent::Progress {
            session_id: session.id.to_string(),
            entity_id: entity.id.clone(),
            message,
        });
    }

    fn emit(&self, event: MediaEvent) {
        self.event_bus.emit(CoreEvent::Media(event)).ok();
    }
}

/// Map a phase failure to the operator-facing error kind.
fn classify(err: MediaError, session: &SyncSession) -> SyncErrorKind {
    let phase = match session.state {
        SyncState::Deleting => SyncPhase::Delete,
        _ => SyncPhase::Upload,
    };
    let deleted = session.deleted;

    match err {
        MediaError::Api(api) if api.is_auth_expired() => {
            SyncErrorKind::AuthExpired { phase, deleted }
        }
        other => {
            let reason = other.to_string();
            match phase {
                SyncPhase::Delete => SyncErrorKind::DeleteFailed { reason },
                SyncPhase::Upload => SyncErrorKind::UploadFailed { reason, deleted },
            }
        }
    }
}

fn upload_progress(batch: &UploadBatch) -> String {
    let details = batch.detail_images.len();
    match (batch.main_image.is_some(), details) {
        (true, 0) => "Uploading 1 main image…".to_string(),
        (true, 1) => "Uploading 1 main and 1 detail image…".to_string(),
        (true, n) => format!("Uploading 1 main and {n} detail images…"),
        (false, 1) => "Uploading 1 detail image…".to_string(),
        (false, n) => format!("Uploading {n} detail images…"),
    }
}
