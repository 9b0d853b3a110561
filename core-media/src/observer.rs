//! Notifications from a media dialog back to the host UI

use crate::types::EntityRef;

/// Listener installed by the host when it opens a media dialog.
///
/// Both methods default to no-ops. They are called on the task driving the
/// dialog and should return quickly.
pub trait DialogObserver: Send + Sync {
    /// A commit finished successfully. Called exactly once per commit, so the
    /// host can refresh its entity list.
    fn on_upload_complete(&self, _entity: &EntityRef) {}

    /// The dialog opened (`true`) or closed (`false`).
    fn on_open_change(&self, _open: bool) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DialogObserver for NoopObserver {}
