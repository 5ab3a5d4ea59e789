//! High-level profile and friendship API.
//!
//! This module provides the [`ProfileDirectory`], which owns the profiles
//! and their friends sets, consults the [`FriendRequestLedger`] to decide
//! how a relationship moves, and writes every change through a
//! [`FriendshipStore`] before making it visible.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::DirectoryConfig;
use super::error::{FriendshipError, Result};
use super::ledger::{self, FriendRequestLedger, SendPlan};
use super::locks::{PairKey, PairLocks, ProfileGates};
use super::storage::{EdgeChange, FriendshipStore, PairChange, SqliteStore};
use super::types::{
    AccountId, FriendRequest, Outcome, Profile, ProfileDetails, ProfileId, ProfileKey,
    RequestStatus,
};

/// Directory of profiles and the friendship graph between them.
///
/// All operations are synchronous and safe to call from many threads.
/// Calls touching the same pair of profiles run one at a time; calls on
/// unrelated pairs run in parallel.
///
/// # Example
///
/// ```ignore
/// use std::path::Path;
/// use social_core::friendship::{DirectoryConfig, ProfileDirectory};
///
/// let directory = ProfileDirectory::open(Path::new("/data/social"), DirectoryConfig::default())?;
/// let alice = directory.lookup(alice_account)?;
/// let bob = directory.lookup(bob_account)?;
/// directory.send_friend_request(alice.key(), bob.key())?;
/// ```
pub struct ProfileDirectory {
    store: Arc<dyn FriendshipStore>,
    clock: Arc<dyn Clock>,
    config: DirectoryConfig,
    profiles: DashMap<ProfileId, Profile>,
    accounts: DashMap<AccountId, ProfileId>,
    ledger: FriendRequestLedger,
    pair_locks: PairLocks,
    gates: ProfileGates,
    next_profile_id: AtomicI64,
}

impl std::fmt::Debug for ProfileDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileDirectory")
            .field("config", &self.config)
            .field("profiles", &self.profiles.len())
            .field("requests", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

impl ProfileDirectory {
    /// Opens a directory backed by a `SQLite` database in `data_dir`.
    ///
    /// Creates the directory and database if they don't exist, and loads
    /// everything already stored there.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or initialization
    /// fails.
    pub fn open(data_dir: &Path, config: DirectoryConfig) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(data_dir).map_err(|e| {
            FriendshipError::Persistence(format!("Failed to create data directory: {e}"))
        })?;

        let db_path = data_dir.join(&config.database_file);
        let store = SqliteStore::new(&db_path, config.busy_timeout())?;

        Self::with_store(Arc::new(store), Arc::new(SystemClock), config)
    }

    /// Creates a directory over an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_store(
            Arc::new(SqliteStore::in_memory()?),
            clock,
            DirectoryConfig::default(),
        )
    }

    /// Creates a directory over any store, loading its current contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be read.
    pub fn with_store(
        store: Arc<dyn FriendshipStore>,
        clock: Arc<dyn Clock>,
        config: DirectoryConfig,
    ) -> Result<Self> {
        config.validate()?;
        let snapshot = store.load()?;

        let profiles = DashMap::new();
        let accounts = DashMap::new();
        let mut max_id = 0;
        for profile in snapshot.profiles {
            max_id = max_id.max(profile.id.0);
            accounts.insert(profile.account_id, profile.id);
            profiles.insert(profile.id, profile);
        }

        for pair in &snapshot.friendships {
            if let Some(mut low) = profiles.get_mut(&pair.low()) {
                low.friends.insert(pair.high());
            }
            if let Some(mut high) = profiles.get_mut(&pair.high()) {
                high.friends.insert(pair.low());
            }
        }

        let ledger = FriendRequestLedger::from_requests(snapshot.requests);

        debug!(
            profiles = profiles.len(),
            requests = ledger.len(),
            friendships = snapshot.friendships.len(),
            "loaded profile directory"
        );

        Ok(Self {
            store,
            clock,
            config,
            profiles,
            accounts,
            ledger,
            pair_locks: PairLocks::default(),
            gates: ProfileGates::default(),
            next_profile_id: AtomicI64::new(max_id + 1),
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    // ==================== Profile Lifecycle ====================

    /// Registers a profile for a newly created account.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::AlreadyExists`] if the account already has
    /// a profile, [`FriendshipError::InvalidData`] for a blank username or
    /// invalid details, or a persistence error.
    pub fn register(
        &self,
        account_id: AccountId,
        username: &str,
        details: ProfileDetails,
    ) -> Result<Profile> {
        if username.trim().is_empty() {
            return Err(FriendshipError::InvalidData(
                "username must not be blank".to_string(),
            ));
        }
        details.validate()?;

        // Holding the account slot serializes registrations of one account.
        let Entry::Vacant(slot) = self.accounts.entry(account_id) else {
            return Err(FriendshipError::AlreadyExists(format!(
                "account {account_id}"
            )));
        };

        let profile = Profile {
            id: ProfileId(self.next_profile_id.fetch_add(1, Ordering::SeqCst)),
            account_id,
            username: username.to_string(),
            bio: details.bio,
            location: details.location,
            birth_date: details.birth_date,
            friends: std::collections::BTreeSet::new(),
        };

        self.store.insert_profile(&profile).inspect_err(|err| {
            warn!(account = %account_id, error = %err, "failed to store new profile");
        })?;

        self.profiles.insert(profile.id, profile.clone());
        slot.insert(profile.id);

        info!(profile = %profile.id, account = %account_id, "registered profile");
        Ok(profile)
    }

    /// Replaces a profile's descriptive fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile doesn't exist, the details are
    /// invalid, or the write fails.
    pub fn update_details(&self, key: ProfileKey, details: ProfileDetails) -> Result<Profile> {
        details.validate()?;

        self.gates.with_exclusive(key.id, || {
            let mut updated = self.resolve(key)?;
            updated.bio = details.bio;
            updated.location = details.location;
            updated.birth_date = details.birth_date;

            self.store.update_profile(&updated)?;

            if let Some(mut entry) = self.profiles.get_mut(&key.id) {
                entry.bio.clone_from(&updated.bio);
                entry.location.clone_from(&updated.location);
                entry.birth_date = updated.birth_date;
            }

            debug!(profile = %key.id, "updated profile details");
            Ok(updated)
        })
    }

    /// Deletes a profile together with every request and friendship it is
    /// part of.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile doesn't exist or the write fails.
    pub fn delete_profile(&self, key: ProfileKey) -> Result<()> {
        self.gates.with_exclusive(key.id, || -> Result<()> {
            let profile = self.resolve(key)?;

            self.store.delete_profile(key.id).inspect_err(|err| {
                warn!(profile = %key.id, error = %err, "failed to delete profile");
            })?;

            self.profiles.remove(&key.id);
            self.accounts.remove(&key.account_id);
            for friend in &profile.friends {
                if let Some(mut entry) = self.profiles.get_mut(friend) {
                    entry.friends.remove(&key.id);
                }
            }
            let removed = self.ledger.remove_involving(key.id);

            info!(
                profile = %key.id,
                friends = profile.friends.len(),
                requests = removed,
                "deleted profile"
            );
            Ok(())
        })?;

        self.gates.forget(key.id);
        Ok(())
    }

    // ==================== Lookups ====================

    /// Finds the profile of an account.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if the account has none.
    pub fn lookup(&self, account_id: AccountId) -> Result<Profile> {
        let id = self
            .accounts
            .get(&account_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| FriendshipError::ProfileNotFound(format!("account {account_id}")))?;
        self.get_profile(id)
    }

    /// Returns a snapshot of a profile by id.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if there is no such profile.
    pub fn get_profile(&self, id: ProfileId) -> Result<Profile> {
        self.profiles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FriendshipError::ProfileNotFound(format!("id {id}")))
    }

    /// Returns the request `other` sent to `me`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if either profile is unknown.
    pub fn check_incoming_request(
        &self,
        me: ProfileKey,
        other: ProfileKey,
    ) -> Result<Option<FriendRequest>> {
        self.resolve(me)?;
        self.resolve(other)?;
        Ok(self.ledger.get(other.id, me.id))
    }

    /// Returns whether the two profiles are friends.
    ///
    /// Reads under the pair lock, so both sides are seen in the same state.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if either profile is unknown.
    pub fn are_friends(&self, a: ProfileKey, b: ProfileKey) -> Result<bool> {
        if a.id == b.id {
            self.resolve(a)?;
            return Ok(false);
        }
        self.with_pair(a, b, || Ok(self.is_linked(a.id, b.id)))
    }

    /// Returns the profiles `key` is friends with, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if the profile is unknown.
    pub fn friends_of(&self, key: ProfileKey) -> Result<Vec<Profile>> {
        let profile = self.resolve(key)?;
        Ok(profile
            .friends
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|entry| entry.value().clone()))
            .collect())
    }

    /// Pending requests waiting for `key` to answer, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if the profile is unknown.
    pub fn incoming_requests(&self, key: ProfileKey) -> Result<Vec<FriendRequest>> {
        self.resolve(key)?;
        Ok(self.ledger.pending_to(key.id))
    }

    /// Pending requests `key` has sent, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::ProfileNotFound`] if the profile is unknown.
    pub fn outgoing_requests(&self, key: ProfileKey) -> Result<Vec<FriendRequest>> {
        self.resolve(key)?;
        Ok(self.ledger.pending_from(key.id))
    }

    // ==================== Friendship Operations ====================

    /// Sends a friend request from `me` to `other`.
    ///
    /// If `other` has a pending or accepted request to `me`, that request is
    /// accepted instead. A declined request can be sent again once the cooldown has
    /// passed since its request date.
    ///
    /// # Errors
    ///
    /// Returns an error if either profile is unknown or the write fails.
    pub fn send_friend_request(&self, me: ProfileKey, other: ProfileKey) -> Result<Outcome> {
        if me.id == other.id {
            debug!(profile = %me.id, "ignoring friend request to self");
            return Ok(Outcome::SelfReferenceIgnored);
        }
        self.with_pair(me, other, || self.send_locked(me.id, other.id))
    }

    /// Accepts the request `other` sent to `me` and makes them friends.
    ///
    /// A declined request stays declined; `other` has to send a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if either profile is unknown or the write fails.
    pub fn accept_friend_request(&self, me: ProfileKey, other: ProfileKey) -> Result<Outcome> {
        if me.id == other.id {
            return Ok(Outcome::SelfReferenceIgnored);
        }
        self.with_pair(me, other, || self.accept_locked(me.id, other.id))
    }

    /// Declines the request `other` sent to `me`. The request date is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if either profile is unknown or the write fails.
    pub fn reject_friend_request(&self, me: ProfileKey, other: ProfileKey) -> Result<Outcome> {
        if me.id == other.id {
            return Ok(Outcome::SelfReferenceIgnored);
        }
        self.with_pair(me, other, || self.reject_locked(me.id, other.id))
    }

    /// Puts each profile into the other's friends set.
    ///
    /// # Errors
    ///
    /// Returns an error if either profile is unknown or the write fails.
    pub fn add_friend(&self, me: ProfileKey, other: ProfileKey) -> Result<Outcome> {
        if me.id == other.id {
            return Ok(Outcome::SelfReferenceIgnored);
        }
        self.with_pair(me, other, || {
            if self.is_linked(me.id, other.id) {
                return Ok(Outcome::NoOp);
            }
            self.apply(PairChange {
                pair: PairKey::new(me.id, other.id),
                request: None,
                edge: Some(EdgeChange::Link),
            })?;
            debug!(a = %me.id, b = %other.id, "added friend");
            Ok(Outcome::Applied)
        })
    }

    /// Ends a friendship, marking its request declined.
    ///
    /// Whichever request between the two is still pending or accepted is
    /// marked declined. Without any request between the two nothing happens.
    ///
    /// # Errors
    ///
    /// Returns an error if either profile is unknown or the write fails.
    pub fn remove_friend(&self, me: ProfileKey, other: ProfileKey) -> Result<Outcome> {
        if me.id == other.id {
            return Ok(Outcome::SelfReferenceIgnored);
        }
        self.with_pair(me, other, || self.remove_locked(me.id, other.id))
    }

    // ==================== Internals ====================

    /// Runs a pair operation after checking both profiles, holding their
    /// gates shared and the pair lock.
    fn with_pair<R>(
        &self,
        a: ProfileKey,
        b: ProfileKey,
        f: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        self.gates.with_shared(a.id, b.id, || {
            self.resolve(a)?;
            self.resolve(b)?;
            self.pair_locks.with_pair(PairKey::new(a.id, b.id), f)
        })
    }

    /// Returns the live profile matching both halves of `key`.
    fn resolve(&self, key: ProfileKey) -> Result<Profile> {
        self.profiles
            .get(&key.id)
            .map(|entry| entry.value().clone())
            .filter(|profile| profile.account_id == key.account_id)
            .ok_or_else(|| {
                FriendshipError::ProfileNotFound(format!(
                    "id {} (account {})",
                    key.id, key.account_id
                ))
            })
    }

    fn is_linked(&self, a: ProfileId, b: ProfileId) -> bool {
        self.profiles
            .get(&a)
            .is_some_and(|profile| profile.friends.contains(&b))
    }

    fn send_locked(&self, me: ProfileId, other: ProfileId) -> Result<Outcome> {
        let now = self.clock.now();
        let incoming = self.ledger.get(other, me);
        let outgoing = self.ledger.get(me, other);

        match ledger::plan_send(
            incoming.as_ref(),
            outgoing.as_ref(),
            now,
            self.config.cooldown(),
        ) {
            SendPlan::AcceptIncoming => {
                debug!(sender = %me, receiver = %other, "request exists the other way, accepting it");
                self.accept_locked(me, other)
            }
            SendPlan::Create => {
                let request = FriendRequest {
                    id: self.ledger.next_id(),
                    sender: me,
                    receiver: other,
                    request_date: now,
                    status: RequestStatus::Pending,
                };
                self.apply(PairChange {
                    pair: PairKey::new(me, other),
                    request: Some(request),
                    edge: None,
                })?;
                debug!(sender = %me, receiver = %other, "friend request created");
                Ok(Outcome::Applied)
            }
            SendPlan::Reset(request) => {
                self.apply(PairChange {
                    pair: PairKey::new(me, other),
                    request: Some(request),
                    edge: None,
                })?;
                debug!(sender = %me, receiver = %other, "declined request sent again after cooldown");
                Ok(Outcome::Applied)
            }
            SendPlan::Unchanged => {
                debug!(
                    sender = %me,
                    receiver = %other,
                    status = ?outgoing.map(|request| request.status),
                    "friend request left unchanged"
                );
                Ok(Outcome::NoOp)
            }
        }
    }

    fn accept_locked(&self, me: ProfileId, other: ProfileId) -> Result<Outcome> {
        let Some(incoming) = self.ledger.get(other, me) else {
            debug!(receiver = %me, sender = %other, "no request to accept");
            return Ok(Outcome::NoOp);
        };
        if incoming.status == RequestStatus::Declined {
            debug!(receiver = %me, sender = %other, "declined request cannot be accepted");
            return Ok(Outcome::NoOp);
        }

        let linked = self.is_linked(me, other);
        let change = PairChange {
            pair: PairKey::new(me, other),
            request: (incoming.status != RequestStatus::Accepted)
                .then(|| ledger::accepted(&incoming)),
            edge: (!linked).then_some(EdgeChange::Link),
        };
        if change.is_empty() {
            return Ok(Outcome::NoOp);
        }

        self.apply(change)?;
        debug!(receiver = %me, sender = %other, "friend request accepted");
        Ok(Outcome::Applied)
    }

    fn reject_locked(&self, me: ProfileId, other: ProfileId) -> Result<Outcome> {
        let Some(incoming) = self.ledger.get(other, me) else {
            debug!(receiver = %me, sender = %other, "no request to reject");
            return Ok(Outcome::NoOp);
        };
        if incoming.status == RequestStatus::Declined {
            return Ok(Outcome::NoOp);
        }

        // Friends only while accepted, so declining an accepted request
        // also ends the friendship.
        let change = PairChange {
            pair: PairKey::new(me, other),
            request: Some(ledger::declined(&incoming)),
            edge: self
                .is_linked(me, other)
                .then_some(EdgeChange::Unlink),
        };

        self.apply(change)?;
        debug!(receiver = %me, sender = %other, "friend request rejected");
        Ok(Outcome::Applied)
    }

    fn remove_locked(&self, me: ProfileId, other: ProfileId) -> Result<Outcome> {
        let records: Vec<FriendRequest> = [self.ledger.get(me, other), self.ledger.get(other, me)]
            .into_iter()
            .flatten()
            .collect();
        if records.is_empty() {
            debug!(a = %me, b = %other, "no request between profiles, nothing to remove");
            return Ok(Outcome::NoOp);
        }

        // At most one record per pair is not declined; that one ends.
        let live = records
            .iter()
            .find(|request| request.status != RequestStatus::Declined);

        let change = PairChange {
            pair: PairKey::new(me, other),
            request: live.map(ledger::declined),
            edge: self
                .is_linked(me, other)
                .then_some(EdgeChange::Unlink),
        };
        if change.is_empty() {
            return Ok(Outcome::NoOp);
        }

        self.apply(change)?;
        debug!(a = %me, b = %other, "friend removed");
        Ok(Outcome::Applied)
    }

    /// Commits `change` to the store, then mirrors it in memory.
    ///
    /// Caller must hold the pair lock.
    fn apply(&self, change: PairChange) -> Result<()> {
        self.store.commit_pair(&change).inspect_err(|err| {
            warn!(
                a = %change.pair.low(),
                b = %change.pair.high(),
                error = %err,
                "failed to commit friendship change"
            );
        })?;

        let (low, high) = (change.pair.low(), change.pair.high());
        if let Some(request) = change.request {
            self.ledger.put(request);
        }
        match change.edge {
            Some(EdgeChange::Link) => {
                if let Some(mut profile) = self.profiles.get_mut(&low) {
                    profile.friends.insert(high);
                }
                if let Some(mut profile) = self.profiles.get_mut(&high) {
                    profile.friends.insert(low);
                }
            }
            Some(EdgeChange::Unlink) => {
                if let Some(mut profile) = self.profiles.get_mut(&low) {
                    profile.friends.remove(&high);
                }
                if let Some(mut profile) = self.profiles.get_mut(&high) {
                    profile.friends.remove(&low);
                }
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::friendship::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use tracing_test::traced_test;

    struct Fixture {
        directory: ProfileDirectory,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
        ));
        let directory = ProfileDirectory::in_memory(clock.clone()).unwrap();
        Fixture { directory, clock }
    }

    fn register(directory: &ProfileDirectory, account: i64) -> ProfileKey {
        directory
            .register(
                AccountId(account),
                &format!("user{account}"),
                ProfileDetails::new("Espoo"),
            )
            .unwrap()
            .key()
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        assert_eq!(a.id, ProfileId(1));
        assert_eq!(b.id, ProfileId(2));
    }

    #[test]
    fn register_rejects_duplicate_account() {
        let f = fixture();
        register(&f.directory, 10);
        let err = f
            .directory
            .register(AccountId(10), "again", ProfileDetails::new("Vantaa"))
            .unwrap_err();
        assert!(matches!(err, FriendshipError::AlreadyExists(_)));
    }

    #[test]
    fn register_rejects_blank_username() {
        let f = fixture();
        let err = f
            .directory
            .register(AccountId(1), "  ", ProfileDetails::new("Lahti"))
            .unwrap_err();
        assert!(matches!(err, FriendshipError::InvalidData(_)));
    }

    #[test]
    fn lookup_unknown_account_is_not_found() {
        let f = fixture();
        let err = f.directory.lookup(AccountId(404)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn mismatched_key_is_not_found() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        let forged = ProfileKey::new(a.id, AccountId(20));

        let err = f.directory.send_friend_request(forged, b).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn send_to_self_is_ignored() {
        let f = fixture();
        let a = register(&f.directory, 10);
        assert_eq!(
            f.directory.send_friend_request(a, a).unwrap(),
            Outcome::SelfReferenceIgnored
        );
        assert!(f.directory.incoming_requests(a).unwrap().is_empty());
    }

    #[test]
    fn send_creates_pending_request_dated_now() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);

        assert_eq!(
            f.directory.send_friend_request(a, b).unwrap(),
            Outcome::Applied
        );

        let request = f.directory.check_incoming_request(b, a).unwrap().unwrap();
        assert_eq!(request.sender, a.id);
        assert_eq!(request.receiver, b.id);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.request_date, f.clock.now());
        assert!(f.directory.check_incoming_request(a, b).unwrap().is_none());
    }

    #[test]
    fn resend_pending_is_no_op() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        let first = f.directory.check_incoming_request(b, a).unwrap().unwrap();

        f.clock.advance(Duration::days(1));
        assert_eq!(f.directory.send_friend_request(a, b).unwrap(), Outcome::NoOp);

        let second = f.directory.check_incoming_request(b, a).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn accept_links_both_profiles() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();

        assert_eq!(
            f.directory.accept_friend_request(b, a).unwrap(),
            Outcome::Applied
        );

        assert!(f.directory.get_profile(a.id).unwrap().is_friend_of(b.id));
        assert!(f.directory.get_profile(b.id).unwrap().is_friend_of(a.id));
        assert!(f.directory.are_friends(a, b).unwrap());
    }

    #[test]
    fn accept_without_request_is_no_op() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        assert_eq!(
            f.directory.accept_friend_request(a, b).unwrap(),
            Outcome::NoOp
        );
        assert!(!f.directory.are_friends(a, b).unwrap());
    }

    #[test]
    fn sender_cannot_accept_own_request() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();

        assert_eq!(
            f.directory.accept_friend_request(a, b).unwrap(),
            Outcome::NoOp
        );
        assert!(!f.directory.are_friends(a, b).unwrap());
    }

    #[test]
    fn reject_declines_and_keeps_date() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        let sent_at = f.clock.now();

        f.clock.advance(Duration::hours(5));
        assert_eq!(
            f.directory.reject_friend_request(b, a).unwrap(),
            Outcome::Applied
        );

        let request = f.directory.check_incoming_request(b, a).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Declined);
        assert_eq!(request.request_date, sent_at);
        assert_eq!(
            f.directory.reject_friend_request(b, a).unwrap(),
            Outcome::NoOp
        );
    }

    #[test]
    fn reject_accepted_request_ends_friendship() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        f.directory.accept_friend_request(b, a).unwrap();

        f.directory.reject_friend_request(b, a).unwrap();

        assert!(!f.directory.are_friends(a, b).unwrap());
        assert!(f.directory.friends_of(a).unwrap().is_empty());
    }

    #[test]
    fn removed_friend_cannot_revive_friendship_by_sending() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        f.directory.accept_friend_request(b, a).unwrap();
        f.directory.remove_friend(a, b).unwrap();

        assert_eq!(
            f.directory.send_friend_request(b, a).unwrap(),
            Outcome::Applied
        );

        assert!(!f.directory.are_friends(a, b).unwrap());
        let original = f.directory.check_incoming_request(b, a).unwrap().unwrap();
        assert_eq!(original.status, RequestStatus::Declined);
        let fresh = f.directory.check_incoming_request(a, b).unwrap().unwrap();
        assert_eq!(fresh.sender, b.id);
        assert_eq!(fresh.status, RequestStatus::Pending);
    }

    #[test]
    fn declined_request_cannot_be_accepted() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        f.directory.reject_friend_request(b, a).unwrap();

        assert_eq!(
            f.directory.accept_friend_request(b, a).unwrap(),
            Outcome::NoOp
        );
        assert!(!f.directory.are_friends(a, b).unwrap());
    }

    #[test]
    fn remove_declines_the_live_record_of_two() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        f.directory.accept_friend_request(b, a).unwrap();
        f.directory.remove_friend(a, b).unwrap();
        f.directory.send_friend_request(b, a).unwrap();
        f.directory.accept_friend_request(a, b).unwrap();
        assert!(f.directory.are_friends(a, b).unwrap());

        // a -> b is already declined; the accepted b -> a record must end.
        assert_eq!(f.directory.remove_friend(a, b).unwrap(), Outcome::Applied);

        assert!(!f.directory.are_friends(a, b).unwrap());
        for (me, other) in [(a, b), (b, a)] {
            let request = f.directory.check_incoming_request(me, other).unwrap().unwrap();
            assert_eq!(request.status, RequestStatus::Declined);
        }
    }

    #[test]
    fn add_friend_is_idempotent() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);

        assert_eq!(f.directory.add_friend(a, b).unwrap(), Outcome::Applied);
        assert_eq!(f.directory.add_friend(b, a).unwrap(), Outcome::NoOp);
        assert_eq!(f.directory.friends_of(a).unwrap().len(), 1);
        assert_eq!(
            f.directory.add_friend(a, a).unwrap(),
            Outcome::SelfReferenceIgnored
        );
    }

    #[test]
    fn remove_friend_finds_request_in_either_direction() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.send_friend_request(a, b).unwrap();
        f.directory.accept_friend_request(b, a).unwrap();

        // b never sent anything; the a -> b record is found the other way.
        assert_eq!(f.directory.remove_friend(b, a).unwrap(), Outcome::Applied);

        let request = f.directory.check_incoming_request(b, a).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Declined);
        assert!(!f.directory.are_friends(a, b).unwrap());
    }

    #[test]
    fn remove_friend_without_request_is_no_op() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.add_friend(a, b).unwrap();

        assert_eq!(f.directory.remove_friend(a, b).unwrap(), Outcome::NoOp);
        assert!(f.directory.are_friends(a, b).unwrap());
    }

    #[test]
    fn update_details_changes_only_descriptive_fields() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        f.directory.add_friend(a, b).unwrap();

        let updated = f
            .directory
            .update_details(a, ProfileDetails::new("Kuopio").with_bio("Hi there"))
            .unwrap();
        assert_eq!(updated.location, "Kuopio");
        assert_eq!(updated.bio, "Hi there");

        let stored = f.directory.get_profile(a.id).unwrap();
        assert_eq!(stored.location, "Kuopio");
        assert!(stored.is_friend_of(b.id));
    }

    #[test]
    fn update_details_rejects_invalid_input() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let err = f
            .directory
            .update_details(a, ProfileDetails::new(""))
            .unwrap_err();
        assert!(matches!(err, FriendshipError::InvalidData(_)));
        assert_eq!(f.directory.get_profile(a.id).unwrap().location, "Espoo");
    }

    #[test]
    fn delete_profile_cascades_to_requests_and_friends() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        let c = register(&f.directory, 30);
        f.directory.send_friend_request(a, b).unwrap();
        f.directory.accept_friend_request(b, a).unwrap();
        f.directory.send_friend_request(c, a).unwrap();

        f.directory.delete_profile(a).unwrap();

        assert!(f.directory.lookup(AccountId(10)).unwrap_err().is_not_found());
        assert!(f.directory.friends_of(b).unwrap().is_empty());
        assert!(f.directory.outgoing_requests(c).unwrap().is_empty());
        assert!(f
            .directory
            .send_friend_request(b, a)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn account_can_register_again_after_deletion() {
        let f = fixture();
        let a = register(&f.directory, 10);
        f.directory.delete_profile(a).unwrap();

        let again = register(&f.directory, 10);
        assert_ne!(again.id, a.id);
    }

    #[test]
    #[traced_test]
    fn transitions_are_logged() {
        let f = fixture();
        let a = register(&f.directory, 10);
        let b = register(&f.directory, 20);
        assert!(logs_contain("registered profile"));

        f.directory.send_friend_request(a, b).unwrap();
        f.directory.send_friend_request(b, a).unwrap();
        assert!(logs_contain("friend request created"));
        assert!(logs_contain("friend request accepted"));
    }

    #[test]
    fn with_store_rejects_invalid_config() {
        let err = ProfileDirectory::with_store(
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(SystemClock),
            DirectoryConfig::default().with_cooldown_days(u32::MAX),
        )
        .unwrap_err();
        assert!(matches!(err, FriendshipError::Config(_)));
    }

    #[test]
    fn debug_output_is_summary() {
        let f = fixture();
        register(&f.directory, 10);
        let debug_str = format!("{:?}", f.directory);
        assert!(debug_str.contains("ProfileDirectory"));
        assert!(debug_str.contains("profiles: 1"));
    }
}
