//! Profiles and the friendship relationship between them.
//!
//! This module holds the one piece of the site with real state-transition
//! logic: the profile-to-profile friendship graph, mediated by directional
//! friend requests that are either pending, accepted or declined.
//!
//! # Architecture
//!
//! ```text
//! ProfileDirectory (high-level API)
//!     ├── profiles + friends sets (in memory, sharded)
//!     ├── FriendRequestLedger (ordered-pair keyed request records)
//!     ├── PairLocks (one lock per unordered profile pair)
//!     └── FriendshipStore (SQLite, write-through)
//! ```
//!
//! # Consistency Model
//!
//! - Every mutation is committed to the store in a single transaction
//!   before the in-memory state changes, so a failed commit has no effect.
//! - Operations on the same pair of profiles serialize on that pair's lock;
//!   operations on disjoint pairs never wait for each other.
//! - A pair is friends exactly when one of its two requests is `Accepted`.
//!
//! # Types
//!
//! - [`Profile`]: A registered person's social identity
//! - [`FriendRequest`]: Directional proposal with a [`RequestStatus`]
//! - [`Outcome`]: What a friendship operation actually did

mod clock;
mod config;
mod directory;
mod error;
pub mod ledger;
mod locks;
mod storage;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use config::DirectoryConfig;
pub use directory::ProfileDirectory;
pub use error::{FriendshipError, Result};
pub use ledger::FriendRequestLedger;
pub use locks::PairKey;
pub use storage::{EdgeChange, FriendshipStore, PairChange, SqliteStore, StoreSnapshot};
pub use types::{
    AccountId, FriendRequest, Outcome, Profile, ProfileDetails, ProfileId, ProfileKey, RequestId,
    RequestStatus,
};
