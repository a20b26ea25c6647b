//! Expected credentials for the dashboard
//!
//! Resolves the single username/password pair the guard accepts from
//! optional configuration values. Missing values fall back to fixed
//! defaults, and every fallback in use is reported so the host can warn
//! about (or refuse) an insecure deployment.

use crate::auth::Credentials;

/// Username used when none is configured
pub const FALLBACK_USERNAME: &str = "admin";

/// Password used when neither the primary nor the legacy setting is present
pub const FALLBACK_PASSWORD: &str = "changeme";

/// A credential that was not configured and fell back to its default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsecureDefault {
    Username,
    Password,
}

impl InsecureDefault {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Username => "username is not configured, using built-in default",
            Self::Password => "password is not configured, using built-in default",
        }
    }
}

/// Source of the expected credential pair
#[derive(Debug, Clone)]
pub struct CredentialSource {
    expected: Credentials,
    username_defaulted: bool,
    password_defaulted: bool,
}

impl CredentialSource {
    /// Resolve credentials from raw settings
    ///
    /// `password` takes precedence over `legacy_password`. Empty strings are
    /// treated as unset.
    pub fn resolve(
        username: Option<String>,
        password: Option<String>,
        legacy_password: Option<String>,
    ) -> Self {
        let username = non_empty(username);
        let password = non_empty(password).or_else(|| non_empty(legacy_password));

        Self {
            username_defaulted: username.is_none(),
            password_defaulted: password.is_none(),
            expected: Credentials::new(
                username.unwrap_or_else(|| FALLBACK_USERNAME.to_string()),
                password.unwrap_or_else(|| FALLBACK_PASSWORD.to_string()),
            ),
        }
    }

    /// The pair a client must present
    pub fn expected(&self) -> &Credentials {
        &self.expected
    }

    /// Fallback values currently in use
    pub fn insecure_defaults(&self) -> Vec<InsecureDefault> {
        let mut defaults = Vec::new();
        if self.username_defaulted {
            defaults.push(InsecureDefault::Username);
        }
        if self.password_defaulted {
            defaults.push(InsecureDefault::Password);
        }
        defaults
    }

    pub fn is_insecure(&self) -> bool {
        self.username_defaulted || self.password_defaulted
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
