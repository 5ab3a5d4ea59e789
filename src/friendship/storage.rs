//! `SQLite` storage for profiles, friend requests and friendships.
//!
//! The directory keeps its working state in memory and writes every
//! change through a [`FriendshipStore`] first. A pair operation hands the
//! store one [`PairChange`], which is applied in a single transaction, so
//! the request record and the friendship edge are never out of step on
//! disk.
//!
//! Friendships are stored once per unordered pair (`low_id < high_id`),
//! which makes the relation symmetric by construction.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};

use super::error::{FriendshipError, Result};
use super::locks::PairKey;
use super::types::{
    AccountId, FriendRequest, Profile, ProfileId, RequestId, RequestStatus,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Change to the friendship edge of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeChange {
    /// The two profiles become friends.
    Link,
    /// The two profiles stop being friends.
    Unlink,
}

/// Everything one pair operation writes, committed atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairChange {
    /// The pair the change applies to.
    pub pair: PairKey,
    /// Request record to insert or overwrite.
    pub request: Option<FriendRequest>,
    /// Friendship edge update.
    pub edge: Option<EdgeChange>,
}

impl PairChange {
    /// Returns whether the change writes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.request.is_none() && self.edge.is_none()
    }
}

/// Everything needed to rebuild a directory.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    /// Profiles with empty friends sets.
    pub profiles: Vec<Profile>,
    /// All friend request records.
    pub requests: Vec<FriendRequest>,
    /// Friendships, one entry per unordered pair.
    pub friendships: Vec<PairKey>,
}

/// Durable backing for a [`ProfileDirectory`](super::ProfileDirectory).
///
/// Every method either commits fully or leaves the store untouched.
pub trait FriendshipStore: Send + Sync {
    /// Loads the full state.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or stored data is malformed.
    fn load(&self) -> Result<StoreSnapshot>;

    /// Inserts a new profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the account already has a profile or the write fails.
    fn insert_profile(&self, profile: &Profile) -> Result<()>;

    /// Overwrites a profile's descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile doesn't exist or the write fails.
    fn update_profile(&self, profile: &Profile) -> Result<()>;

    /// Deletes a profile with all its requests and friendships.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete_profile(&self, id: ProfileId) -> Result<()>;

    /// Applies one pair operation's writes in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing is written then.
    fn commit_pair(&self, change: &PairChange) -> Result<()>;
}

/// `SQLite`-based store.
///
/// Thread-safe wrapper around a `SQLite` connection. Waits on a busy
/// database are bounded by the configured busy timeout.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Creates a store at the given path.
    ///
    /// Creates the database file and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            FriendshipError::Persistence(format!("Failed to acquire database lock: {e}"))
        })
    }

    /// Initializes the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            -- One profile per external account
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                account_id INTEGER NOT NULL UNIQUE,
                username TEXT NOT NULL,
                bio TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL,
                birth_date TEXT
            );

            -- Directional requests, one per ordered pair
            CREATE TABLE IF NOT EXISTS friend_requests (
                id INTEGER PRIMARY KEY,
                sender_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                receiver_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                request_date INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                UNIQUE (sender_id, receiver_id),
                CHECK (sender_id <> receiver_id)
            );

            -- Symmetric friendships, one row per unordered pair
            CREATE TABLE IF NOT EXISTS friendships (
                low_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                high_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                PRIMARY KEY (low_id, high_id),
                CHECK (low_id < high_id)
            );
            ",
        )?;

        Ok(())
    }

    fn read_profiles(conn: &Connection) -> Result<Vec<Profile>> {
        let mut stmt = conn.prepare(
            r"
            SELECT id, account_id, username, bio, location, birth_date
            FROM profiles
            ORDER BY id
            ",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let account_id: i64 = row.get(1)?;
                let username: String = row.get(2)?;
                let bio: String = row.get(3)?;
                let location: String = row.get(4)?;
                let birth_date: Option<String> = row.get(5)?;
                Ok((id, account_id, username, bio, location, birth_date))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, account_id, username, bio, location, birth_date)| {
                let birth_date = birth_date
                    .map(|date| {
                        NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
                            FriendshipError::InvalidData(format!("Invalid birth_date {date}: {e}"))
                        })
                    })
                    .transpose()?;

                Ok(Profile {
                    id: ProfileId(id),
                    account_id: AccountId(account_id),
                    username,
                    bio,
                    location,
                    birth_date,
                    friends: std::collections::BTreeSet::new(),
                })
            })
            .collect()
    }

    fn read_requests(conn: &Connection) -> Result<Vec<FriendRequest>> {
        let mut stmt = conn.prepare(
            r"
            SELECT id, sender_id, receiver_id, request_date, status
            FROM friend_requests
            ORDER BY id
            ",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let sender_id: i64 = row.get(1)?;
                let receiver_id: i64 = row.get(2)?;
                let request_date: i64 = row.get(3)?;
                let status: String = row.get(4)?;
                Ok((id, sender_id, receiver_id, request_date, status))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, sender_id, receiver_id, request_date, status_str)| {
                let status = RequestStatus::parse(&status_str).ok_or_else(|| {
                    FriendshipError::InvalidData(format!("Invalid status: {status_str}"))
                })?;
                let request_date = DateTime::<Utc>::from_timestamp_millis(request_date)
                    .ok_or_else(|| {
                        FriendshipError::InvalidData(format!(
                            "Invalid request_date: {request_date}"
                        ))
                    })?;

                Ok(FriendRequest {
                    id: RequestId(id),
                    sender: ProfileId(sender_id),
                    receiver: ProfileId(receiver_id),
                    request_date,
                    status,
                })
            })
            .collect()
    }

    fn read_friendships(conn: &Connection) -> Result<Vec<PairKey>> {
        let mut stmt = conn.prepare("SELECT low_id, high_id FROM friendships")?;
        let pairs = stmt
            .query_map([], |row| {
                let low: i64 = row.get(0)?;
                let high: i64 = row.get(1)?;
                Ok(PairKey::new(ProfileId(low), ProfileId(high)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pairs)
    }
}

impl FriendshipStore for SqliteStore {
    fn load(&self) -> Result<StoreSnapshot> {
        let conn = self.lock()?;
        Ok(StoreSnapshot {
            profiles: Self::read_profiles(&conn)?,
            requests: Self::read_requests(&conn)?,
            friendships: Self::read_friendships(&conn)?,
        })
    }

    fn insert_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.lock()?;

        let result = conn.execute(
            r"
            INSERT INTO profiles (id, account_id, username, bio, location, birth_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                profile.id.0,
                profile.account_id.0,
                &profile.username,
                &profile.bio,
                &profile.location,
                profile
                    .birth_date
                    .map(|date| date.format(DATE_FORMAT).to_string()),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(FriendshipError::AlreadyExists(format!(
                    "account {}",
                    profile.account_id
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn update_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.lock()?;

        let rows = conn.execute(
            r"
            UPDATE profiles
            SET username = ?1, bio = ?2, location = ?3, birth_date = ?4
            WHERE id = ?5
            ",
            params![
                &profile.username,
                &profile.bio,
                &profile.location,
                profile
                    .birth_date
                    .map(|date| date.format(DATE_FORMAT).to_string()),
                profile.id.0,
            ],
        )?;

        if rows == 0 {
            return Err(FriendshipError::ProfileNotFound(format!(
                "id {}",
                profile.id
            )));
        }

        Ok(())
    }

    fn delete_profile(&self, id: ProfileId) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // Explicit deletes keep this correct even without foreign key support.
        tx.execute(
            "DELETE FROM friend_requests WHERE sender_id = ?1 OR receiver_id = ?1",
            params![id.0],
        )?;
        tx.execute(
            "DELETE FROM friendships WHERE low_id = ?1 OR high_id = ?1",
            params![id.0],
        )?;
        tx.execute("DELETE FROM profiles WHERE id = ?1", params![id.0])?;

        tx.commit()?;
        Ok(())
    }

    fn commit_pair(&self, change: &PairChange) -> Result<()> {
        if change.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(request) = &change.request {
            tx.execute(
                r"
                INSERT INTO friend_requests (id, sender_id, receiver_id, request_date, status)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(sender_id, receiver_id) DO UPDATE SET
                    request_date = excluded.request_date,
                    status = excluded.status
                ",
                params![
                    request.id.0,
                    request.sender.0,
                    request.receiver.0,
                    request.request_date.timestamp_millis(),
                    request.status.as_str(),
                ],
            )?;
        }

        match change.edge {
            Some(EdgeChange::Link) => {
                tx.execute(
                    "INSERT OR IGNORE INTO friendships (low_id, high_id) VALUES (?1, ?2)",
                    params![change.pair.low().0, change.pair.high().0],
                )?;
            }
            Some(EdgeChange::Unlink) => {
                tx.execute(
                    "DELETE FROM friendships WHERE low_id = ?1 AND high_id = ?2",
                    params![change.pair.low().0, change.pair.high().0],
                )?;
            }
            None => {}
        }

        tx.commit()?;
        Ok(())
    }
}
