use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use tally_schemas::{ChannelId, LedgerMutation, MemberId, MemberRecord, SequenceState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or the write was not confirmed.
    Unavailable(String),
    /// A mutation targeted a member with no record.
    UnknownMember(MemberId),
    /// Stored data violates a model invariant (e.g. a negative count column).
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            Self::UnknownMember(id) => write!(f, "no ledger record for member {id}"),
            Self::Corrupt(msg) => write!(f, "store data corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// MemberLedger
// ---------------------------------------------------------------------------

/// Per-member record store.
///
/// Single-row mutations are atomic. Rank and leaderboard reads may observe a
/// mutation that is still in progress elsewhere and be off by one.
#[async_trait]
pub trait MemberLedger: Send + Sync {
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberRecord>, StoreError>;

    /// Records for every id in `member_ids` that has one, ordered by id.
    async fn get_many(
        &self,
        member_ids: &BTreeSet<MemberId>,
    ) -> Result<Vec<MemberRecord>, StoreError>;

    /// Create a zeroed record. Existing records are left untouched; either
    /// way the current record is returned.
    async fn upsert_new(&self, member_id: MemberId) -> Result<MemberRecord, StoreError>;

    /// `score += 1`, `correct_count += 1`, raise `highest_valid_streak` to
    /// `new_highest_valid_streak` when supplied.
    async fn apply_correct(
        &self,
        member_id: MemberId,
        new_highest_valid_streak: Option<u64>,
    ) -> Result<MemberRecord, StoreError>;

    /// `score -= 1`, `wrong_count += 1`.
    async fn apply_wrong(&self, member_id: MemberId) -> Result<MemberRecord, StoreError>;

    /// 1-based rank by score: the number of records with `score >=` this
    /// member's score. `None` if the member has no record.
    async fn rank_of(&self, member_id: MemberId) -> Result<Option<u64>, StoreError>;

    /// Highest scores first; ties by first-seen order.
    async fn top_n(&self, n: usize) -> Result<Vec<(MemberId, i64)>, StoreError>;

    /// Delete every record whose id is not in `active`. Returns the count removed.
    async fn prune(&self, active: &BTreeSet<MemberId>) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// GameStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GameStore: MemberLedger {
    async fn load_sequence(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<SequenceState>, StoreError>;

    async fn save_sequence(&self, state: &SequenceState) -> Result<(), StoreError>;

    /// Apply `mutation` and persist `state` as one unit. On error neither is
    /// visible. Returns the member record after the mutation.
    async fn commit_move(
        &self,
        state: &SequenceState,
        mutation: &LedgerMutation,
    ) -> Result<MemberRecord, StoreError>;

    /// Cheap health check used to resume after a persistence failure.
    async fn ping(&self) -> Result<(), StoreError>;
}
