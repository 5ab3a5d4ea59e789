//! Friend request ledger and its state machine.
//!
//! The ledger holds at most one [`FriendRequest`] per ordered
//! `(sender, receiver)` pair. The functions in this module decide how a
//! record evolves; they never touch storage or the friends sets, which is
//! the [`ProfileDirectory`](super::ProfileDirectory)'s job.
//!
//! ```text
//! NoRequest --send--> Pending --accept--> Accepted
//!                        |                    |
//!                     reject            remove_friend
//!                        v                    |
//!                    Declined <---------------+
//!                        |
//!       send after cooldown: back to Pending (fresh request date)
//! ```

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::types::{FriendRequest, ProfileId, RequestId, RequestStatus};

/// What a send from `sender` to `receiver` should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendPlan {
    /// The receiver already sent a request the other way; accept it instead.
    AcceptIncoming,
    /// No request yet; create a pending one dated now.
    Create,
    /// Declined and cooled down; this is the record reset to pending.
    Reset(FriendRequest),
    /// Pending, accepted, or still cooling down.
    Unchanged,
}

/// Returns whether a declined request dated `request_date` may be sent again.
///
/// The cooldown must have strictly elapsed. A threshold past the end of
/// representable time is never reached.
#[must_use]
pub fn cooldown_elapsed(request_date: DateTime<Utc>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    request_date
        .checked_add_signed(cooldown)
        .is_some_and(|threshold| now > threshold)
}

/// Decides a send given the request in each direction.
///
/// `incoming` is the record from the receiver to the sender, `outgoing` the
/// record from the sender to the receiver. A declined incoming record is
/// the receiver's decision and is never revived by the sender.
#[must_use]
pub fn plan_send(
    incoming: Option<&FriendRequest>,
    outgoing: Option<&FriendRequest>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> SendPlan {
    if incoming.is_some_and(|request| request.status != RequestStatus::Declined) {
        return SendPlan::AcceptIncoming;
    }
    let Some(existing) = outgoing else {
        return SendPlan::Create;
    };
    match existing.status {
        RequestStatus::Declined if cooldown_elapsed(existing.request_date, now, cooldown) => {
            SendPlan::Reset(FriendRequest {
                request_date: now,
                status: RequestStatus::Pending,
                ..existing.clone()
            })
        }
        RequestStatus::Declined | RequestStatus::Pending | RequestStatus::Accepted => {
            SendPlan::Unchanged
        }
    }
}

/// Returns the record marked accepted.
#[must_use]
pub fn accepted(request: &FriendRequest) -> FriendRequest {
    FriendRequest {
        status: RequestStatus::Accepted,
        ..request.clone()
    }
}

/// Returns the record marked declined. The request date is kept.
#[must_use]
pub fn declined(request: &FriendRequest) -> FriendRequest {
    FriendRequest {
        status: RequestStatus::Declined,
        ..request.clone()
    }
}

/// In-memory index of friend requests, keyed by `(sender, receiver)`.
#[derive(Debug)]
pub struct FriendRequestLedger {
    requests: DashMap<(ProfileId, ProfileId), FriendRequest>,
    next_id: AtomicI64,
}

impl Default for FriendRequestLedger {
    fn default() -> Self {
        Self {
            requests: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl FriendRequestLedger {
    /// Creates a ledger holding `requests`.
    ///
    /// New ids continue after the largest id present.
    #[must_use]
    pub fn from_requests(requests: impl IntoIterator<Item = FriendRequest>) -> Self {
        let ledger = Self::default();
        let mut max_id = 0;
        for request in requests {
            max_id = max_id.max(request.id.0);
            ledger
                .requests
                .insert((request.sender, request.receiver), request);
        }
        ledger.next_id.store(max_id + 1, Ordering::SeqCst);
        ledger
    }

    /// Reserves a fresh request id.
    pub fn next_id(&self) -> RequestId {
        RequestId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the request from `sender` to `receiver`, if any.
    #[must_use]
    pub fn get(&self, sender: ProfileId, receiver: ProfileId) -> Option<FriendRequest> {
        self.requests
            .get(&(sender, receiver))
            .map(|entry| entry.value().clone())
    }

    /// Inserts or replaces the record for its ordered pair.
    pub fn put(&self, request: FriendRequest) {
        self.requests
            .insert((request.sender, request.receiver), request);
    }

    /// Removes every record `profile` takes part in. Returns how many.
    pub fn remove_involving(&self, profile: ProfileId) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|(sender, receiver), _| *sender != profile && *receiver != profile);
        before.saturating_sub(self.requests.len())
    }

    /// Pending requests sent to `receiver`, oldest first.
    #[must_use]
    pub fn pending_to(&self, receiver: ProfileId) -> Vec<FriendRequest> {
        self.collect_sorted(|request| {
            request.receiver == receiver && request.status == RequestStatus::Pending
        })
    }

    /// Pending requests sent by `sender`, oldest first.
    #[must_use]
    pub fn pending_from(&self, sender: ProfileId) -> Vec<FriendRequest> {
        self.collect_sorted(|request| {
            request.sender == sender && request.status == RequestStatus::Pending
        })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns whether the ledger holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn collect_sorted(&self, keep: impl Fn(&FriendRequest) -> bool) -> Vec<FriendRequest> {
        let mut found: Vec<FriendRequest> = self
            .requests
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|request| (request.request_date, request.id));
        found
    }
}
