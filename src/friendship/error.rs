//! Error types for friendship operations.
//!
//! Self-targeted calls and calls with nothing to do are not errors; they
//! are reported through [`Outcome`](super::Outcome). Only missing profiles,
//! invalid input and storage failures surface here.

use thiserror::Error;

/// Error type for profile and friendship operations.
#[derive(Error, Debug)]
pub enum FriendshipError {
    /// Durable write or read failed; the operation had no effect.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Profile not found (by id, key or account).
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// Invalid data provided.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A profile for the account already exists.
    #[error("Profile already exists: {0}")]
    AlreadyExists(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FriendshipError {
    /// Returns whether the error means the referenced profile is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound(_))
    }

    /// Returns whether the error came from the storage layer.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Database(_))
    }
}

/// Result type alias for friendship operations.
pub type Result<T> = std::result::Result<T, FriendshipError>;

impl From<serde_json::Error> for FriendshipError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
