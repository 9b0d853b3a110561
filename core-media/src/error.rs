//! Error types for the media engine

use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use std::fmt;
use thiserror::Error;

/// A staging mutation that would break the image policy.
///
/// Returned before anything is applied; the staged set is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{file_name}' is {size} bytes, larger than the {limit} byte limit")]
    OversizedFile {
        file_name: String,
        size: u64,
        limit: u64,
    },

    #[error("{requested} detail images would exceed the limit of {limit}")]
    TooManyImages { requested: usize, limit: usize },

    #[error("Image '{path}' is not part of this entity")]
    UnknownImage { path: String },
}

/// Failures talking to the Media API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Media API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Media API rejected the session token (HTTP 401)")]
    AuthExpired,

    #[error("Media API request failed: {0}")]
    Transport(#[from] BridgeError),

    #[error("Unexpected Media API response: {0}")]
    Decode(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    /// Whether the operator has to sign in again before retrying.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            ApiError::AuthExpired | ApiError::Auth(AuthError::SessionExpired)
        )
    }
}

/// Commit phase in which a sync failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Delete,
    Upload,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Delete => write!(f, "delete"),
            SyncPhase::Upload => write!(f, "upload"),
        }
    }
}

/// Why a commit ended in the `Error` state.
///
/// `Display` is the single message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncErrorKind {
    #[error("Deleting images failed: {reason}. Nothing was changed.")]
    DeleteFailed { reason: String },

    #[error("{}", upload_failed_message(.reason, .deleted))]
    UploadFailed { reason: String, deleted: usize },

    #[error("{}", auth_expired_message(.phase, .deleted))]
    AuthExpired { phase: SyncPhase, deleted: usize },
}

impl SyncErrorKind {
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Number of images already deleted on the server when the commit failed.
    pub fn deleted(&self) -> usize {
        match self {
            SyncErrorKind::DeleteFailed { .. } => 0,
            SyncErrorKind::UploadFailed { deleted, .. }
            | SyncErrorKind::AuthExpired { deleted, .. } => *deleted,
        }
    }
}

fn upload_failed_message(reason: &str, deleted: &usize) -> String {
    match *deleted {
        0 => format!("Uploading images failed: {reason}."),
        n => format!(
            "Uploading images failed: {reason}. {} already deleted and cannot be restored.",
            image_count(n)
        ),
    }
}

fn auth_expired_message(phase: &SyncPhase, deleted: &usize) -> String {
    match *deleted {
        0 => format!("Your session expired during the {phase} step. Sign in again and retry."),
        n => format!(
            "Your session expired during the {phase} step. {} already deleted. Sign in again and retry the upload.",
            image_count(n)
        ),
    }
}

pub(crate) fn image_count(n: usize) -> String {
    if n == 1 {
        "1 image".to_string()
    } else {
        format!("{n} images")
    }
}

/// Top-level error for media operations.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Cannot preview '{file_name}': {reason}")]
    Preview { file_name: String, reason: String },

    #[error("Cannot read '{file_name}': {source}")]
    FileAccess {
        file_name: String,
        #[source]
        source: BridgeError,
    },

    #[error("A commit is already in progress")]
    CommitInProgress,

    #[error("The media dialog is closed")]
    DialogClosed,

    #[error("Invalid sync state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Sync(#[from] SyncErrorKind),
}

pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_name_limit_and_value() {
        let err = ValidationError::OversizedFile {
            file_name: "rotor.jpg".to_string(),
            size: 512_001,
            limit: 512_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("rotor.jpg"));
        assert!(msg.contains("512001"));
        assert!(msg.contains("512000"));

        let err = ValidationError::TooManyImages {
            requested: 6,
            limit: 5,
        };
        assert_eq!(err.to_string(), "6 detail images would exceed the limit of 5");
    }

    #[test]
    fn test_upload_failure_mentions_irreversible_deletes() {
        let clean = SyncErrorKind::UploadFailed {
            reason: "HTTP 500".to_string(),
            deleted: 0,
        };
        assert!(!clean.message().contains("cannot be restored"));

        let partial = SyncErrorKind::UploadFailed {
            reason: "HTTP 500".to_string(),
            deleted: 2,
        };
        assert!(partial.message().contains("2 images already deleted"));
        assert_eq!(partial.deleted(), 2);
    }

    #[test]
    fn test_auth_expired_message() {
        let err = SyncErrorKind::AuthExpired {
            phase: SyncPhase::Delete,
            deleted: 0,
        };
        assert!(err.message().contains("delete step"));
        assert!(err.message().contains("Sign in again"));

        assert!(ApiError::AuthExpired.is_auth_expired());
        assert!(ApiError::Auth(AuthError::SessionExpired).is_auth_expired());
        assert!(!ApiError::Auth(AuthError::NotAuthenticated).is_auth_expired());
    }

    #[test]
    fn test_image_count_pluralization() {
        assert_eq!(image_count(1), "1 image");
        assert_eq!(image_count(3), "3 images");
    }
}
