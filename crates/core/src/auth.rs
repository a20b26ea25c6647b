//! HTTP Basic credentials
//!
//! `Credentials` is used both for the configured pair and for the pair a
//! client presents in its `Authorization` header.
//!
//! ## Security Notes
//!
//! - **Debug**: the password is redacted so credentials can be logged safely
//! - **Comparison**: `matches()` runs in constant time for equal-length inputs

use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine;
use std::fmt;
use subtle::ConstantTimeEq;

/// Authentication scheme accepted in the `Authorization` header
const BASIC_SCHEME: &str = "basic";

/// Username/password pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    pub pass: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pass: pass.into(),
        }
    }

    /// Parse credentials from an `Authorization` header value
    ///
    /// Accepts `Basic <base64(user:pass)>` with a case-insensitive scheme.
    /// The payload is split at the first colon, so passwords may contain
    /// colons. Returns `None` for any other scheme or an undecodable payload.
    ///
    /// # Example
    /// ```
    /// # use dashguard_core::auth::Credentials;
    /// let creds = Credentials::from_authorization("Basic YWRtaW46czNjcmV0").unwrap();
    /// assert_eq!(creds.name, "admin");
    /// assert_eq!(creds.pass, "s3cret");
    /// ```
    pub fn from_authorization(header: &str) -> Option<Self> {
        let header = header.trim_matches(' ');
        let (scheme, payload) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
            return None;
        }

        let payload = payload.trim_start_matches(' ');
        if payload.is_empty() || payload.contains(' ') {
            return None;
        }

        let decoded = BASE64_ENGINE.decode(payload).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (name, pass) = decoded.split_once(':')?;
        Some(Self::new(name, pass))
    }

    /// Encode as an `Authorization` header value
    pub fn to_authorization(&self) -> String {
        let encoded = BASE64_ENGINE.encode(format!("{}:{}", self.name, self.pass));
        format!("Basic {}", encoded)
    }

    /// Compare against another pair without short-circuiting
    ///
    /// Both fields are always compared so the timing does not reveal
    /// whether the username alone was correct.
    pub fn matches(&self, other: &Credentials) -> bool {
        let name_ok = ct_eq(self.name.as_bytes(), other.name.as_bytes());
        let pass_ok = ct_eq(self.pass.as_bytes(), other.pass.as_bytes());
        name_ok & pass_ok
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Constant-time comparison of two byte slices
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
