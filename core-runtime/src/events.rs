//! # Event Bus System
//!
//! Provides an event-driven architecture for the storefront core using
//! `tokio::sync::broadcast`. Modules publish typed events; the admin console
//! (status line, toast notifications, login prompt) subscribes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │ Auth Module ├──────────────>│           │     subscribe    ┌────────────┐
//! └─────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//!                               │ (broadcast│                  └────────────┘
//! ┌─────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Media Module├──────────────>│           ├─────────────────>│ Subscriber │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Media(MediaEvent::Progress {
//!         session_id: "s-1".to_string(),
//!         entity_id: "p-42".to_string(),
//!         message: "Deleting 2 images…".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Media commit in progress");
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Authentication Events
//! - `SessionStarted`: A bearer token was installed
//! - `SessionCleared`: The operator logged out
//! - `SessionExpired`: The API rejected the token (HTTP 401)
//!
//! ### Media Events
//! - `DialogOpened` / `DialogClosed`: Manage-images dialog lifecycle
//! - `CommitStarted`: A two-phase commit began
//! - `Progress`: Human-facing status line update
//! - `Committed`: Both phases finished
//! - `CommitFailed`: A phase failed; `deletions_applied` tells whether the
//!   delete phase already took effect
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Publishers ignore the "no subscribers" error (`emit(..).ok()`); events are
//! advisory and never part of a correctness contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session credential lifecycle
    Auth(AuthEvent),
    /// Media dialog and commit lifecycle
    Media(MediaEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Media(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::SessionExpired { .. }) => EventSeverity::Error,
            CoreEvent::Media(MediaEvent::CommitFailed {
                deletions_applied: true,
                ..
            }) => EventSeverity::Error,
            CoreEvent::Media(MediaEvent::CommitFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SessionStarted) => EventSeverity::Info,
            CoreEvent::Media(MediaEvent::Committed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the operator's API session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A session token was installed (login or restored from secure storage).
    SessionStarted,
    /// The session token was removed (logout).
    SessionCleared,
    /// The API answered 401; the console should prompt for a new login.
    SessionExpired {
        /// Human-readable context, e.g. which request was rejected.
        message: String,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SessionStarted => "Session started",
            AuthEvent::SessionCleared => "Session cleared",
            AuthEvent::SessionExpired { .. } => "Session expired",
        }
    }
}

// ============================================================================
// Media Events
// ============================================================================

/// Events emitted by the manage-images dialogs and the commit engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MediaEvent {
    DialogOpened {
        /// Resource path segment (`products`, `spare-parts`).
        resource: String,
        entity_id: String,
    },
    DialogClosed {
        resource: String,
        entity_id: String,
        /// Whether uncommitted staged changes were discarded.
        discarded_changes: bool,
    },
    CommitStarted {
        session_id: String,
        entity_id: String,
        /// Number of detail images staged for deletion.
        removals: usize,
        /// Number of files staged for upload (main + detail).
        additions: usize,
    },
    /// Ordered status line for the commit in progress.
    Progress {
        session_id: String,
        entity_id: String,
        message: String,
    },
    Committed {
        session_id: String,
        entity_id: String,
        deleted: usize,
        uploaded: usize,
        /// Wall time of the whole commit.
        duration_ms: u64,
    },
    CommitFailed {
        session_id: String,
        entity_id: String,
        message: String,
        /// True when the delete phase succeeded before the failure.
        deletions_applied: bool,
    },
}

impl MediaEvent {
    fn description(&self) -> &str {
        match self {
            MediaEvent::DialogOpened { .. } => "Media dialog opened",
            MediaEvent::DialogClosed { .. } => "Media dialog closed",
            MediaEvent::CommitStarted { .. } => "Media commit started",
            MediaEvent::Progress { .. } => "Media commit in progress",
            MediaEvent::Committed { .. } => "Media commit completed",
            MediaEvent::CommitFailed { .. } => "Media commit failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let media_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Media(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
