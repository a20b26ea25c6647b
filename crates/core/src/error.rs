//! Error types for dashguard-core

use thiserror::Error;

/// Reasons the guard refuses a request
///
/// Every variant is recoverable: it ends the current request and is
/// surfaced to the caller as a structured response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("too many failed attempts")]
    LockedOut,

    /// Authorization header absent, not the Basic scheme, or undecodable
    #[error("authentication required")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// HTTP status code for this denial
    pub fn status_code(&self) -> u16 {
        match self {
            Self::LockedOut => 403,
            Self::MissingCredentials | Self::InvalidCredentials => 401,
        }
    }

    /// Whether the response carries a `WWW-Authenticate` challenge
    pub fn requires_challenge(&self) -> bool {
        self.status_code() == 401
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;
