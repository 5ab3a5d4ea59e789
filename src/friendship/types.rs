//! Core types for profiles and friend requests.
//!
//! This module defines the identifiers, the profile record with its
//! friends set, the directional friend request record and the outcome
//! reported by every friendship operation.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::{FriendshipError, Result};

/// Maximum length of a profile bio, in characters.
pub const MAX_BIO_CHARS: usize = 500;

/// Maximum length of a profile location, in characters.
pub const MAX_LOCATION_CHARS: usize = 255;

/// Unique identifier of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub i64);

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the external account a profile belongs to.
///
/// Accounts are owned by the authentication layer; this crate only
/// guarantees that no two profiles share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a friend request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a profile: its own id together with its account id.
///
/// Two profiles are the same profile only when both halves match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileKey {
    /// The profile's own identifier.
    pub id: ProfileId,
    /// The account the profile is bound to.
    pub account_id: AccountId,
}

impl ProfileKey {
    /// Creates a key from its two halves.
    #[must_use]
    pub const fn new(id: ProfileId, account_id: AccountId) -> Self {
        Self { id, account_id }
    }
}

impl From<&Profile> for ProfileKey {
    fn from(profile: &Profile) -> Self {
        profile.key()
    }
}

/// Status of a friend request.
///
/// A pair of profiles with no request record at all is a separate state
/// and is represented by the absence of a [`FriendRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Sent, not yet answered.
    Pending,
    /// Accepted; the two profiles are friends.
    Accepted,
    /// Rejected by the receiver, or the friendship was removed.
    Declined,
}

impl RequestStatus {
    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered person's social identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier.
    pub id: ProfileId,
    /// Account the profile belongs to.
    pub account_id: AccountId,
    /// Account username, used for display.
    pub username: String,
    /// Free-form "about me" text.
    pub bio: String,
    /// Where the person says they are.
    pub location: String,
    /// Date of birth, if given.
    pub birth_date: Option<NaiveDate>,
    /// Profiles this profile is friends with. Always symmetric.
    pub friends: BTreeSet<ProfileId>,
}

impl Profile {
    /// Returns the identity key of this profile.
    #[must_use]
    pub const fn key(&self) -> ProfileKey {
        ProfileKey::new(self.id, self.account_id)
    }

    /// Returns whether `other` is in this profile's friends set.
    #[must_use]
    pub fn is_friend_of(&self, other: ProfileId) -> bool {
        self.friends.contains(&other)
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Profile {}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ID = {}) Profile: {}", self.id, self.username)
    }
}

/// Descriptive profile fields, owned by the profile's holder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDetails {
    /// Bio text, at most [`MAX_BIO_CHARS`] characters.
    pub bio: String,
    /// Location, non-blank and at most [`MAX_LOCATION_CHARS`] characters.
    pub location: String,
    /// Optional date of birth.
    pub birth_date: Option<NaiveDate>,
}

impl ProfileDetails {
    /// Creates details with the given location and an empty bio.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            bio: String::new(),
            location: location.into(),
            birth_date: None,
        }
    }

    /// Sets the bio.
    #[must_use]
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    /// Sets the birth date.
    #[must_use]
    pub const fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    /// Checks the length and presence rules.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::InvalidData`] if the bio is too long or the
    /// location is blank or too long.
    pub fn validate(&self) -> Result<()> {
        let bio_chars = self.bio.chars().count();
        if bio_chars > MAX_BIO_CHARS {
            return Err(FriendshipError::InvalidData(format!(
                "bio is {bio_chars} characters, at most {MAX_BIO_CHARS} allowed"
            )));
        }
        if self.location.trim().is_empty() {
            return Err(FriendshipError::InvalidData(
                "location must not be blank".to_string(),
            ));
        }
        let location_chars = self.location.chars().count();
        if location_chars > MAX_LOCATION_CHARS {
            return Err(FriendshipError::InvalidData(format!(
                "location is {location_chars} characters, at most {MAX_LOCATION_CHARS} allowed"
            )));
        }
        Ok(())
    }
}

/// Directional friend request between two distinct profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Record identifier.
    pub id: RequestId,
    /// Profile that sent the request.
    pub sender: ProfileId,
    /// Profile the request was sent to.
    pub receiver: ProfileId,
    /// Creation time, or time of the most recent reset to pending.
    pub request_date: DateTime<Utc>,
    /// Current status.
    pub status: RequestStatus,
}

impl FriendRequest {
    /// Returns whether `profile` is the sender or the receiver.
    #[must_use]
    pub fn involves(&self, profile: ProfileId) -> bool {
        self.sender == profile || self.receiver == profile
    }

    /// Renders the request with the two usernames in place of the ids.
    ///
    /// # Errors
    ///
    /// Returns [`FriendshipError::InvalidData`] if `sender` or `receiver` is
    /// not the matching profile of this request.
    pub fn describe(&self, sender: &Profile, receiver: &Profile) -> Result<String> {
        if sender.id != self.sender || receiver.id != self.receiver {
            return Err(FriendshipError::InvalidData(format!(
                "profiles {} / {} do not match request {}",
                sender.id, receiver.id, self.id
            )));
        }
        Ok(format!(
            "(ID = {}) Friend Request - Sender / Receiver: {} / {}",
            self.id, sender.username, receiver.username
        ))
    }
}

/// Identifies both sides by profile id, since a bare request carries no
/// usernames. Use [`FriendRequest::describe`] for the username form.
impl fmt::Display for FriendRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(ID = {}) Friend Request - Sender / Receiver: {} / {}",
            self.id, self.sender, self.receiver
        )
    }
}

/// What a friendship operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and was committed.
    Applied,
    /// Valid call with nothing to do (no request, still cooling down, ...).
    NoOp,
    /// The profile targeted itself; silently ignored.
    SelfReferenceIgnored,
}

impl Outcome {
    /// Returns whether the operation changed any state.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
