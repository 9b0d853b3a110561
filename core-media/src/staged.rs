//! Client-local pending changes to one entity's images
//!
//! A [`StagedMediaSet`] is seeded from the server's [`MediaSet`] when a
//! manage-images dialog opens. The operator then stages a replacement main
//! image, a batch of new detail images, and removals of existing detail
//! images. Nothing reaches the server until the orchestrator commits.
//!
//! Every mutation is atomic: it either applies completely or returns a
//! [`ValidationError`] and leaves the set untouched. The detail count the
//! entity would end up with,
//!
//! ```text
//! effective = |active baseline details| + |in-flight details|
//!           + |uploaded, not yet refetched| + |staged detail additions|
//! ```
//!
//! never exceeds the policy limit.
//!
//! ## Commits
//!
//! [`begin_commit`](StagedMediaSet::begin_commit) moves everything staged
//! into an in-flight plan, so the operator can keep staging while the
//! network calls run. The orchestrator then confirms each phase, or calls
//! [`abort_commit`](StagedMediaSet::abort_commit) to put the unconfirmed
//! part back. Staging done during the commit is never touched by either.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::ValidationError;
use crate::policy::ValidationPolicy;
use crate::types::{
    LocalFile, MediaSet, Preview, PreviewRef, PreviewRequest, StagedAddition, UploadBatch,
};

/// What one commit sends, taken by [`StagedMediaSet::begin_commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPlan {
    pub removals: Vec<String>,
    pub uploads: UploadBatch,
}

impl CommitPlan {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.uploads.is_empty()
    }
}

/// Part of a commit the server has not confirmed yet.
#[derive(Debug, Clone, Default)]
struct InFlight {
    removals: Vec<String>,
    main: Option<StagedAddition>,
    details: Vec<StagedAddition>,
}

#[derive(Debug, Clone)]
pub struct StagedMediaSet {
    policy: ValidationPolicy,
    baseline: MediaSet,
    main: Option<StagedAddition>,
    details: Vec<StagedAddition>,
    /// Baseline detail refs marked for deletion, in staging order
    removals: Vec<String>,
    in_flight: InFlight,
    /// Detail images uploaded by a commit whose refs arrive with the next fetch
    unseen_uploads: usize,
    previews: HashMap<PreviewRef, Preview>,
}

impl StagedMediaSet {
    /// Duplicate detail refs in `baseline` are collapsed, keeping the first.
    pub fn new(baseline: MediaSet, policy: ValidationPolicy) -> Self {
        Self {
            policy,
            baseline: dedup_details(baseline),
            main: None,
            details: Vec::new(),
            removals: Vec::new(),
            in_flight: InFlight::default(),
            unseen_uploads: 0,
            previews: HashMap::new(),
        }
    }

    pub fn baseline(&self) -> &MediaSet {
        &self.baseline
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    // ========================================================================
    // Staging
    // ========================================================================

    /// Stage a replacement main image.
    ///
    /// A previously staged main image and its preview are dropped.
    pub fn stage_main_image(&mut self, file: LocalFile) -> Result<PreviewRequest, ValidationError> {
        self.policy.validate_main_image(&file)?;

        if let Some(previous) = self.main.take() {
            self.previews.remove(&previous.preview_ref());
        }

        let preview = PreviewRef::new();
        debug!(file = %file.name, size = file.size(), "Staged main image");
        self.main = Some(StagedAddition::MainImage {
            file: file.clone(),
            preview,
        });
        Ok(PreviewRequest { preview, file })
    }

    /// Stage a batch of new detail images, replacing the previous batch.
    ///
    /// Images already being uploaded by a running commit are not replaced
    /// and still count against the limit.
    pub fn stage_detail_images(
        &mut self,
        files: Vec<LocalFile>,
    ) -> Result<Vec<PreviewRequest>, ValidationError> {
        self.policy.validate_detail_batch(
            &files,
            self.committed_addition_count(),
            self.active_detail_count(),
        )?;

        for previous in std::mem::take(&mut self.details) {
            self.previews.remove(&previous.preview_ref());
        }

        let mut requests = Vec::with_capacity(files.len());
        for file in files {
            let preview = PreviewRef::new();
            self.details.push(StagedAddition::DetailImage {
                file: file.clone(),
                preview,
            });
            requests.push(PreviewRequest { preview, file });
        }

        debug!(
            batch = requests.len(),
            effective = self.effective_detail_count(),
            "Staged detail images"
        );
        Ok(requests)
    }

    /// Mark an existing detail image for deletion. Idempotent.
    ///
    /// An image a running commit is already deleting is left alone.
    pub fn stage_removal(&mut self, image_ref: &str) -> Result<(), ValidationError> {
        if !self.baseline.contains_detail(image_ref) {
            return Err(ValidationError::UnknownImage {
                path: image_ref.to_string(),
            });
        }
        if !self.is_removal_staged(image_ref) && !self.is_removal_in_flight(image_ref) {
            self.removals.push(image_ref.to_string());
        }
        Ok(())
    }

    /// Undo [`stage_removal`](Self::stage_removal). Idempotent.
    ///
    /// Rejected when keeping the image would push the entity over the limit.
    /// Deletions already sent to the server cannot be undone and are ignored.
    pub fn unstage_removal(&mut self, image_ref: &str) -> Result<(), ValidationError> {
        let Some(pos) = self.removals.iter().position(|r| r == image_ref) else {
            return Ok(());
        };
        self.policy
            .validate_effective_count(self.effective_detail_count() + 1)?;
        self.removals.remove(pos);
        Ok(())
    }

    /// Discard every staged change and its preview.
    ///
    /// A running commit's plan is kept; it is resolved by the orchestrator.
    pub fn clear(&mut self) {
        self.main = None;
        self.details.clear();
        self.removals.clear();
        self.prune_previews();
    }

    /// Whether anything is staged that no commit has picked up yet.
    pub fn has_pending_changes(&self) -> bool {
        self.main.is_some() || !self.details.is_empty() || !self.removals.is_empty()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn effective_detail_count(&self) -> usize {
        self.active_detail_count() + self.committed_addition_count() + self.details.len()
    }

    /// Baseline detail refs neither staged for removal nor being deleted,
    /// in server order.
    pub fn active_detail_refs(&self) -> Vec<&str> {
        self.baseline
            .detail_image_refs
            .iter()
            .map(String::as_str)
            .filter(|r| !self.is_removal_staged(r) && !self.is_removal_in_flight(r))
            .collect()
    }

    pub fn staged_removals(&self) -> &[String] {
        &self.removals
    }

    pub fn is_removal_staged(&self, image_ref: &str) -> bool {
        self.removals.iter().any(|r| r == image_ref)
    }

    pub fn staged_main(&self) -> Option<&StagedAddition> {
        self.main.as_ref()
    }

    pub fn staged_details(&self) -> &[StagedAddition] {
        &self.details
    }

    pub fn has_pending_uploads(&self) -> bool {
        self.main.is_some() || !self.details.is_empty()
    }

    /// Files the next commit would upload.
    pub fn upload_batch(&self) -> UploadBatch {
        UploadBatch {
            main_image: self.main.as_ref().map(|a| a.file().clone()),
            detail_images: self.details.iter().map(|a| a.file().clone()).collect(),
        }
    }

    /// Whether a commit has taken a plan that is not resolved yet.
    pub fn is_committing(&self) -> bool {
        !self.in_flight.removals.is_empty()
            || self.in_flight.main.is_some()
            || !self.in_flight.details.is_empty()
    }

    /// Refs a running commit is deleting.
    pub fn in_flight_removals(&self) -> &[String] {
        &self.in_flight.removals
    }

    /// Additions a running commit is uploading, main image first.
    pub fn in_flight_additions(&self) -> impl Iterator<Item = &StagedAddition> {
        self.in_flight
            .main
            .iter()
            .chain(self.in_flight.details.iter())
    }

    fn is_removal_in_flight(&self, image_ref: &str) -> bool {
        self.in_flight.removals.iter().any(|r| r == image_ref)
    }

    fn active_detail_count(&self) -> usize {
        self.active_detail_refs().len()
    }

    /// Detail images a commit has sent or is sending.
    fn committed_addition_count(&self) -> usize {
        self.in_flight.details.len() + self.unseen_uploads
    }

    // ========================================================================
    // Previews
    // ========================================================================

    /// Store a finished preview.
    ///
    /// Returns `false` and drops the preview when its addition has been
    /// replaced, cleared or uploaded in the meantime.
    pub fn attach_preview(&mut self, preview_ref: PreviewRef, preview: Preview) -> bool {
        if !self.live_preview_refs().contains(&preview_ref) {
            debug!(preview = %preview_ref, "Discarding stale preview");
            return false;
        }
        self.previews.insert(preview_ref, preview);
        true
    }

    pub fn preview(&self, preview_ref: PreviewRef) -> Option<&Preview> {
        self.previews.get(&preview_ref)
    }

    pub fn live_preview_count(&self) -> usize {
        self.previews.len()
    }

    fn live_preview_refs(&self) -> HashSet<PreviewRef> {
        self.main
            .iter()
            .chain(self.details.iter())
            .chain(self.in_flight_additions())
            .map(StagedAddition::preview_ref)
            .collect()
    }

    fn prune_previews(&mut self) {
        let live = self.live_preview_refs();
        self.previews.retain(|r, _| live.contains(r));
    }

    // ========================================================================
    // Commit bookkeeping
    // ========================================================================

    /// Move everything staged into the in-flight plan and return what to send.
    ///
    /// Returns `None` when nothing is staged or a plan is already in flight.
    pub fn begin_commit(&mut self) -> Option<CommitPlan> {
        if self.is_committing() || !self.has_pending_changes() {
            return None;
        }

        let plan = CommitPlan {
            removals: self.removals.clone(),
            uploads: self.upload_batch(),
        };
        self.in_flight = InFlight {
            removals: std::mem::take(&mut self.removals),
            main: self.main.take(),
            details: std::mem::take(&mut self.details),
        };
        Some(plan)
    }

    /// Record that the in-flight removals were deleted on the server.
    ///
    /// The refs leave the baseline; they were already excluded from the
    /// active refs, so the effective count is unchanged.
    pub fn confirm_removals(&mut self) {
        let removed = std::mem::take(&mut self.in_flight.removals);
        self.baseline
            .detail_image_refs
            .retain(|r| !removed.contains(r));
    }

    /// Record that the in-flight additions were uploaded.
    ///
    /// The server assigns the new refs; until the next fetch the uploaded
    /// detail images are still counted.
    pub fn confirm_additions(&mut self) {
        self.in_flight.main = None;
        let uploaded = std::mem::take(&mut self.in_flight.details);
        self.unseen_uploads += uploaded.len();
        self.prune_previews();
    }

    /// Put whatever the server did not confirm back into the staged set.
    ///
    /// A main image or detail batch staged while the commit ran wins over the
    /// in-flight one it would have replaced.
    pub fn abort_commit(&mut self) {
        let in_flight = std::mem::take(&mut self.in_flight);

        let mut removals = in_flight.removals;
        for r in std::mem::take(&mut self.removals) {
            if !removals.contains(&r) {
                removals.push(r);
            }
        }
        self.removals = removals;

        if self.main.is_none() {
            self.main = in_flight.main;
        }
        if self.details.is_empty() {
            self.details = in_flight.details;
        }
        self.prune_previews();
    }

    /// Drop the in-flight plan after a successful commit. Staging done while
    /// the commit ran stays pending.
    pub fn finish_commit(&mut self) {
        self.in_flight = InFlight::default();
        self.prune_previews();
    }

    /// Replace the baseline with freshly fetched server state.
    ///
    /// Additions staged since the last commit are kept; staged removals of
    /// refs the server no longer has are dropped.
    pub fn reseed(&mut self, media_set: MediaSet) {
        self.baseline = dedup_details(media_set);
        self.unseen_uploads = 0;
        let baseline = &self.baseline;
        self.removals.retain(|r| baseline.contains_detail(r));
    }
}

fn dedup_details(mut media_set: MediaSet) -> MediaSet {
    let mut seen = HashSet::new();
    media_set
        .detail_image_refs
        .retain(|r| seen.insert(r.clone()));
    media_set
}
