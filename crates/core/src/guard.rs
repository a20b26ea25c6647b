//! Authentication guard
//!
//! Combines the configured credentials with the [`AttemptTracker`] and turns
//! a request's client address and `Authorization` header into a
//! [`Decision`]. Transport-agnostic: the host maps decisions onto HTTP.

use crate::auth::Credentials;
use crate::config::CredentialSource;
use crate::error::AuthError;
use crate::lockout::AttemptTracker;
use std::net::IpAddr;
use std::sync::Arc;

/// Realm advertised in the Basic challenge
pub const DEFAULT_REALM: &str = "Dashboard";

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// A refused request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub error: AuthError,
    /// `WWW-Authenticate` value, present on 401 denials
    pub challenge: Option<String>,
}

impl Denial {
    pub fn status_code(&self) -> u16 {
        self.error.status_code()
    }

    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

/// Outcome of `require_auth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Identity),
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Gatekeeper for the protected endpoints
#[derive(Debug, Clone)]
pub struct AuthGuard {
    expected: Credentials,
    tracker: Arc<AttemptTracker>,
    challenge: String,
}

impl AuthGuard {
    pub fn new(source: &CredentialSource, tracker: Arc<AttemptTracker>) -> Self {
        Self {
            expected: source.expected().clone(),
            tracker,
            challenge: challenge_for(DEFAULT_REALM),
        }
    }

    /// Advertise a different realm in the Basic challenge
    pub fn with_realm(mut self, realm: &str) -> Self {
        self.challenge = challenge_for(realm);
        self
    }

    pub fn tracker(&self) -> &Arc<AttemptTracker> {
        &self.tracker
    }

    /// `WWW-Authenticate` value sent with 401 responses
    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Key failures are tracked under; the port is not part of it
    pub fn client_key(client: IpAddr) -> String {
        client.to_string()
    }

    /// Authenticate a request that must carry valid credentials
    ///
    /// Locked-out clients are refused before their credentials are looked
    /// at. A missing or malformed header is refused without counting as a
    /// failure; only a well-formed but wrong pair is recorded.
    pub fn require_auth(&self, client: IpAddr, authorization: Option<&str>) -> Decision {
        let key = Self::client_key(client);

        if self.tracker.is_locked_out(&key) {
            tracing::debug!("Rejected locked out client {}", key);
            return self.deny(AuthError::LockedOut);
        }

        let Some(presented) = authorization.and_then(Credentials::from_authorization) else {
            return self.deny(AuthError::MissingCredentials);
        };

        if self.expected.matches(&presented) {
            self.tracker.clear(&key);
            return Decision::Allow(Identity {
                username: presented.name,
            });
        }

        let attempts = self.tracker.record_failure(&key);
        tracing::warn!(
            "Auth failed for {} (username: {:?}, attempt {})",
            key,
            presented.name,
            attempts
        );
        self.deny(AuthError::InvalidCredentials)
    }

    /// Identify the caller if it sent valid credentials
    ///
    /// Never refuses and never touches the tracker.
    pub fn optional_auth(&self, authorization: Option<&str>) -> Option<Identity> {
        let presented = authorization.and_then(Credentials::from_authorization)?;
        self.expected.matches(&presented).then(|| Identity {
            username: presented.name,
        })
    }

    fn deny(&self, error: AuthError) -> Decision {
        Decision::Deny(Denial {
            error,
            challenge: error.requires_challenge().then(|| self.challenge.clone()),
        })
    }
}

fn challenge_for(realm: &str) -> String {
    format!("Basic realm=\"{}\"", realm.replace('\\', "\\\\").replace('"', "\\\""))
}
