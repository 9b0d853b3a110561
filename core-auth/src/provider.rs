//! Credential provider contract consumed by API clients.

use async_trait::async_trait;

use crate::error::Result;

/// Supplies the bearer token for outgoing API requests.
///
/// Injected into API clients at construction. Implementations must fail with
/// [`AuthError::NotAuthenticated`](crate::AuthError::NotAuthenticated) before
/// any network I/O happens when no session exists.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current bearer token value.
    async fn bearer_token(&self) -> Result<String>;

    /// Called by API clients when the server rejects the token (HTTP 401).
    async fn mark_expired(&self);
}
