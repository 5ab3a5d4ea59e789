//! Configuration for the profile directory.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{FriendshipError, Result};

/// Days a declined request must wait before it can be sent again.
pub const DEFAULT_COOLDOWN_DAYS: u32 = 7;

/// How long a storage call may wait on a locked database, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Longest accepted cooldown, in days (about a century).
pub const MAX_COOLDOWN_DAYS: u32 = 36_500;

/// Database file name inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "social.db";

/// Configuration for a [`ProfileDirectory`](super::ProfileDirectory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Re-request cooldown after a decline, in days.
    pub cooldown_days: u32,
    /// Bounded wait for a busy database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Database file name, relative to the data directory.
    pub database_file: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            database_file: DEFAULT_DATABASE_FILE.to_string(),
        }
    }
}

impl DirectoryConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::Config`] if the JSON is malformed or the
    /// resulting configuration is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the cooldown in days.
    #[must_use]
    pub const fn with_cooldown_days(mut self, days: u32) -> Self {
        self.cooldown_days = days;
        self
    }

    /// Sets the busy timeout in milliseconds.
    #[must_use]
    pub const fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Sets the database file name.
    #[must_use]
    pub fn with_database_file(mut self, file: impl Into<String>) -> Self {
        self.database_file = file.into();
        self
    }

    /// Returns the cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.cooldown_days))
    }

    /// Returns the busy timeout as a duration.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::Config`] if the database file name is empty,
    /// the busy timeout is zero or the cooldown exceeds [`MAX_COOLDOWN_DAYS`].
    pub fn validate(&self) -> Result<()> {
        if self.cooldown_days > MAX_COOLDOWN_DAYS {
            return Err(FriendshipError::Config(format!(
                "cooldown_days must be at most {MAX_COOLDOWN_DAYS}"
            )));
        }
        if self.database_file.trim().is_empty() {
            return Err(FriendshipError::Config(
                "database_file must not be empty".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(FriendshipError::Config(
                "busy_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
