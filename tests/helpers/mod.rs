//! Shared helpers for the friendship integration tests.

#![allow(dead_code)]

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use social_core::friendship::{
    AccountId, DirectoryConfig, FriendshipError, FriendshipStore, ManualClock, PairChange,
    Profile, ProfileDetails, ProfileDirectory, ProfileId, ProfileKey, Result, SqliteStore,
    StoreSnapshot,
};

/// Atomic counter for unique test directory names.
static HELPER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a unique temporary directory path for test isolation.
pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let id = HELPER_COUNTER.fetch_add(1, Ordering::SeqCst);
    env::temp_dir().join(format!(
        "social_core_test_{}_{}_{}",
        prefix,
        std::process::id(),
        id
    ))
}

/// Removes a temporary test directory. Ignores errors silently.
pub fn cleanup_dir(dir: &PathBuf) {
    let _ = std::fs::remove_dir_all(dir);
}

/// Fixed starting instant for manual clocks.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

/// In-memory directory driven by a manual clock.
pub fn memory_directory() -> (ProfileDirectory, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let directory = ProfileDirectory::in_memory(clock.clone()).expect("should create directory");
    (directory, clock)
}

/// Registers a profile for `account` with a generated username.
pub fn register(directory: &ProfileDirectory, account: i64) -> ProfileKey {
    directory
        .register(
            AccountId(account),
            &format!("member{account}"),
            ProfileDetails::new("Tampere"),
        )
        .expect("should register profile")
        .key()
}

/// Ids of a profile's friends, ascending.
pub fn friend_ids(directory: &ProfileDirectory, key: ProfileKey) -> Vec<ProfileId> {
    directory
        .friends_of(key)
        .expect("profile should exist")
        .iter()
        .map(|profile| profile.id)
        .collect()
}

/// Store that delegates to an in-memory `SQLite` store until told to fail.
pub struct FailingStore {
    inner: SqliteStore,
    failing: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().expect("should open store"),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FriendshipError::Persistence(
                "simulated storage outage".to_string(),
            ));
        }
        Ok(())
    }
}

impl FriendshipStore for FailingStore {
    fn load(&self) -> Result<StoreSnapshot> {
        self.check()?;
        self.inner.load()
    }

    fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.check()?;
        self.inner.insert_profile(profile)
    }

    fn update_profile(&self, profile: &Profile) -> Result<()> {
        self.check()?;
        self.inner.update_profile(profile)
    }

    fn delete_profile(&self, id: ProfileId) -> Result<()> {
        self.check()?;
        self.inner.delete_profile(id)
    }

    fn commit_pair(&self, change: &PairChange) -> Result<()> {
        self.check()?;
        self.inner.commit_pair(change)
    }
}

/// Directory over a [`FailingStore`], returning the store for toggling.
pub fn failing_directory() -> (ProfileDirectory, Arc<FailingStore>, Arc<ManualClock>) {
    let store = Arc::new(FailingStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let directory = ProfileDirectory::with_store(
        store.clone(),
        clock.clone(),
        DirectoryConfig::default(),
    )
    .expect("should create directory");
    (directory, store, clock)
}
