//! Dashguard Core - Authentication guard with adaptive lockout
//!
//! This crate provides:
//! - Basic credential parsing and constant-time comparison
//! - Expected credential resolution with insecure-default detection
//! - Per-client failure tracking with temporary lockout
//! - The guard that turns a request into an allow/deny decision
//! - Error types

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod lockout;

// Re-export common types
pub use auth::Credentials;
pub use config::{CredentialSource, InsecureDefault};
pub use error::{AuthError, CoreError, Result};
pub use guard::{AuthGuard, Decision, Denial, Identity};
pub use lockout::{AttemptTracker, LockoutPolicy};
