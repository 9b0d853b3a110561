use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired, sign in again")]
    SessionExpired,

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored session is corrupted: {reason}")]
    SessionCorrupted { reason: String },

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
