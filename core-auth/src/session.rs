//! Secure-store backed session credentials
//!
//! The token is cached in memory after `init`/`restore` and persisted as JSON
//! in the platform secure store under a single key, so the console can resume
//! a session across launches.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{CredentialProvider, SessionCredentials, SessionToken};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let credentials = SessionCredentials::new(secure_store, EventBus::default());
//!
//! credentials.init(SessionToken::new("eyJhbGciOi...")?).await?;
//! let bearer = credentials.bearer_token().await?;
//!
//! credentials.clear().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bridge_traits::storage::SecureStore;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AuthError, Result};
use crate::provider::CredentialProvider;
use crate::types::{SessionState, SessionToken};

/// Secure store key holding the serialized session token.
const SESSION_KEY: &str = "admin_session";

#[derive(Default)]
struct SessionSlot {
    token: Option<SessionToken>,
    state: SessionState,
}

/// Session credential holder implementing [`CredentialProvider`].
#[derive(Clone)]
pub struct SessionCredentials {
    secure_store: Arc<dyn SecureStore>,
    event_bus: EventBus,
    slot: Arc<RwLock<SessionSlot>>,
}

impl SessionCredentials {
    pub fn new(secure_store: Arc<dyn SecureStore>, event_bus: EventBus) -> Self {
        Self {
            secure_store,
            event_bus,
            slot: Arc::new(RwLock::new(SessionSlot::default())),
        }
    }

    /// Start a session with a freshly issued token.
    ///
    /// The token is persisted first; on storage failure the in-memory session
    /// is left unchanged.
    pub async fn init(&self, token: SessionToken) -> Result<()> {
        let json = serde_json::to_vec(&token).map_err(|e| AuthError::SessionCorrupted {
            reason: e.to_string(),
        })?;

        self.secure_store
            .set_secret(SESSION_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist session token");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        {
            let mut slot = self.slot.write().await;
            slot.token = Some(token);
            slot.state = SessionState::Active;
        }

        info!("Session started");
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionStarted))
            .ok();
        Ok(())
    }

    /// Reload a session persisted by a previous `init`.
    ///
    /// Returns the resulting state. Expired or corrupted entries are deleted
    /// from the secure store.
    pub async fn restore(&self) -> Result<SessionState> {
        let data = self
            .secure_store
            .get_secret(SESSION_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        let Some(data) = data else {
            debug!("No stored session");
            return Ok(SessionState::SignedOut);
        };

        let token: SessionToken = match serde_json::from_slice(&data) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Stored session is corrupted, discarding");
                self.delete_stored().await;
                return Err(AuthError::SessionCorrupted {
                    reason: e.to_string(),
                });
            }
        };

        if token.is_expired() {
            info!("Stored session has expired, discarding");
            self.delete_stored().await;
            return Ok(SessionState::SignedOut);
        }

        {
            let mut slot = self.slot.write().await;
            slot.token = Some(token);
            slot.state = SessionState::Active;
        }

        info!("Session restored from secure storage");
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionStarted))
            .ok();
        Ok(SessionState::Active)
    }

    /// End the session (logout). Idempotent.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut slot = self.slot.write().await;
            slot.token = None;
            slot.state = SessionState::SignedOut;
        }

        self.secure_store
            .delete_secret(SESSION_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        info!("Session cleared");
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionCleared))
            .ok();
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        self.slot.read().await.state
    }

    async fn delete_stored(&self) {
        if let Err(e) = self.secure_store.delete_secret(SESSION_KEY).await {
            warn!(error = %e, "Failed to delete stored session");
        }
    }
}

#[async_trait]
impl CredentialProvider for SessionCredentials {
    async fn bearer_token(&self) -> Result<String> {
        let slot = self.slot.read().await;
        match (&slot.token, slot.state) {
            (_, SessionState::Expired) => Err(AuthError::SessionExpired),
            (Some(token), _) if token.is_expired() => Err(AuthError::SessionExpired),
            (Some(token), SessionState::Active) => Ok(token.value().to_string()),
            _ => Err(AuthError::NotAuthenticated),
        }
    }

    async fn mark_expired(&self) {
        let mut slot = self.slot.write().await;
        if slot.state != SessionState::Active {
            return;
        }
        slot.state = SessionState::Expired;
        drop(slot);

        warn!("API rejected the session token");
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SessionExpired {
                message: "The server rejected the session token (HTTP 401)".to_string(),
            }))
            .ok();
    }
}
