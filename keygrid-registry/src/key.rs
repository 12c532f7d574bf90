//! License key generation and normalization.
//!
//! Keys are 32 uppercase hex characters derived from a random UUID v4,
//! giving 122 bits of entropy; collisions are negligible and the store's
//! unique index is the backstop. Keys received from clients are trimmed
//! but otherwise compared verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A license key: the high-entropy token that identifies a license record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseKey(String);

impl LicenseKey {
    /// Wraps a key string received from a client, trimming whitespace.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// Generates a fresh, cryptographically random license key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LicenseKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
