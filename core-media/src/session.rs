//! Commit session state machine
//!
//! ```text
//! Idle -> Deleting -> Uploading -> Committing -> Done
//!   |        |            ^
//!   |        +------------|------> Error
//!   +-------------------->+
//!   +--(nothing staged)--> Done
//! ```
//!
//! Either phase may be skipped when it has no work. `Done` and `Error` are
//! terminal; a retry starts a new session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{MediaError, Result, SyncErrorKind};

// ============================================================================
// Session ID
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SyncSessionId(Uuid);

impl SyncSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Deleting,
    Uploading,
    Committing,
    Done,
    Error,
}

impl SyncState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Error)
    }

    /// Network work or finalization is under way.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SyncState::Deleting | SyncState::Uploading | SyncState::Committing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Deleting => "deleting",
            SyncState::Uploading => "uploading",
            SyncState::Committing => "committing",
            SyncState::Done => "done",
            SyncState::Error => "error",
        }
    }
}

impl FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SyncState::Idle),
            "deleting" => Ok(SyncState::Deleting),
            "uploading" => Ok(SyncState::Uploading),
            "committing" => Ok(SyncState::Committing),
            "done" => Ok(SyncState::Done),
            "error" => Ok(SyncState::Error),
            other => Err(format!("Unknown sync state: {}", other)),
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Session
// ============================================================================

/// One commit attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSession {
    pub id: SyncSessionId,
    pub state: SyncState,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<SyncErrorKind>,
    /// Status lines in the order they were shown to the operator
    pub progress: Vec<String>,
    /// Images deleted on the server by this session
    pub deleted: usize,
    /// Files uploaded by this session
    pub uploaded: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self {
            id: SyncSessionId::new(),
            state: SyncState::Idle,
            last_error: None,
            progress: Vec::new(),
            deleted: 0,
            uploaded: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `to`, stamping start and finish times.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::InvalidStateTransition`] when the state machine
    /// does not allow the move.
    pub fn advance(&mut self, to: SyncState) -> Result<()> {
        self.validate_transition(to)?;
        if self.state == SyncState::Idle {
            self.started_at = Some(Utc::now());
        }
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.state = to;
        Ok(())
    }

    /// End the session in `Error` with the given cause.
    pub fn fail(&mut self, kind: SyncErrorKind) -> Result<()> {
        self.advance(SyncState::Error)?;
        self.last_error = Some(kind);
        Ok(())
    }

    pub fn record_progress(&mut self, message: impl Into<String>) {
        self.progress.push(message.into());
    }

    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(SyncErrorKind::message)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => u64::try_from((end - start).num_milliseconds()).ok(),
            _ => None,
        }
    }

    fn validate_transition(&self, to: SyncState) -> Result<()> {
        let valid = match (self.state, to) {
            // From Idle: either phase, or straight to Done with nothing staged
            (SyncState::Idle, SyncState::Deleting) => true,
            (SyncState::Idle, SyncState::Uploading) => true,
            (SyncState::Idle, SyncState::Done) => true,

            (SyncState::Deleting, SyncState::Uploading) => true,
            (SyncState::Deleting, SyncState::Committing) => true,
            (SyncState::Deleting, SyncState::Error) => true,

            (SyncState::Uploading, SyncState::Committing) => true,
            (SyncState::Uploading, SyncState::Error) => true,

            (SyncState::Committing, SyncState::Done) => true,

            // Terminal states cannot transition
            (SyncState::Done, _) => false,
            (SyncState::Error, _) => false,

            _ => false,
        };

        if !valid {
            return Err(MediaError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

fn serialize_error<S>(
    error: &Option<SyncErrorKind>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(kind) => serializer.serialize_some(&kind.message()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_flags() {
        assert!(SyncState::Done.is_terminal());
        assert!(SyncState::Error.is_terminal());
        assert!(!SyncState::Idle.is_terminal());
        assert!(SyncState::Uploading.is_in_flight());
        assert!(!SyncState::Idle.is_in_flight());
        assert!(!SyncState::Error.is_in_flight());
    }

    #[test]
    fn test_state_from_str() {
        assert_eq!("committing".parse::<SyncState>().unwrap(), SyncState::Committing);
        assert_eq!(SyncState::Deleting.to_string(), "deleting");
        assert!("paused".parse::<SyncState>().is_err());
    }

    #[test]
    fn test_full_commit_path() {
        let mut session = SyncSession::new();
        session.advance(SyncState::Deleting).unwrap();
        assert!(session.started_at.is_some());
        session.advance(SyncState::Uploading).unwrap();
        session.advance(SyncState::Committing).unwrap();
        session.advance(SyncState::Done).unwrap();
        assert!(session.finished_at.is_some());
        assert!(session.duration_ms().is_some());
    }

    #[test]
    fn test_empty_commit_goes_straight_to_done() {
        let mut session = SyncSession::new();
        session.advance(SyncState::Done).unwrap();
        assert_eq!(session.state, SyncState::Done);
    }

    #[test]
    fn test_upload_cannot_precede_delete() {
        let mut session = SyncSession::new();
        session.advance(SyncState::Uploading).unwrap();
        let err = session.advance(SyncState::Deleting).unwrap_err();
        assert!(matches!(
            err,
            MediaError::InvalidStateTransition { ref from, ref to }
                if from == "uploading" && to == "deleting"
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut session = SyncSession::new();
        session.advance(SyncState::Deleting).unwrap();
        session
            .fail(SyncErrorKind::DeleteFailed {
                reason: "HTTP 500".to_string(),
            })
            .unwrap();
        assert_eq!(session.state, SyncState::Error);
        assert!(session.error_message().unwrap().contains("HTTP 500"));
        assert!(session.advance(SyncState::Uploading).is_err());

        let mut idle = SyncSession::new();
        assert!(idle
            .fail(SyncErrorKind::DeleteFailed {
                reason: "x".to_string()
            })
            .is_err());
    }

    #[test]
    fn test_session_serializes_error_message() {
        let mut session = SyncSession::new();
        session.advance(SyncState::Uploading).unwrap();
        session
            .fail(SyncErrorKind::UploadFailed {
                reason: "HTTP 413".to_string(),
                deleted: 0,
            })
            .unwrap();

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["state"], "error");
        assert!(json["last_error"].as_str().unwrap().contains("HTTP 413"));
    }
}
