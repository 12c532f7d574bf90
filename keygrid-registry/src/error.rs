//! Error types for the license registry.
//!
//! Note that "license invalid" outcomes (unknown key, wrong owner, expired,
//! seat limit) are *not* errors; they are carried in
//! [`LicenseStatus::Invalid`](crate::LicenseStatus). Only persistence
//! failures end up here.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Hard failures from the registry's persistence layer.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error (machine-id list, wire types).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded into a license record.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
