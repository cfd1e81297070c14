//! tally-schemas
//!
//! Shared data model for the counting game. Plain data only: identifiers,
//! the durable per-member record, the single sequence state document, the
//! ledger mutations the engine asks the store to apply, and role intents.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of consecutive accepted submissions a penalized member needs
/// before the penalty is lifted.
pub const PENALTY_REDEMPTION_THRESHOLD: u32 = 30;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! snowflake_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

snowflake_id!(MemberId);
snowflake_id!(ChannelId);
snowflake_id!(MessageId);

// ---------------------------------------------------------------------------
// MemberRecord
// ---------------------------------------------------------------------------

/// Durable per-member statistics.
///
/// `score == correct_count - wrong_count` always holds: the only two
/// mutation paths ([`MemberRecord::record_correct`] and
/// [`MemberRecord::record_wrong`]) move both sides together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub member_id: MemberId,
    pub score: i64,
    pub correct_count: u64,
    pub wrong_count: u64,
    pub highest_valid_streak: u64,
}

impl MemberRecord {
    /// Zeroed record, as created lazily on a member's first submission.
    pub fn new(member_id: MemberId) -> Self {
        Self {
            member_id,
            score: 0,
            correct_count: 0,
            wrong_count: 0,
            highest_valid_streak: 0,
        }
    }

    pub fn attempts(&self) -> u64 {
        self.correct_count + self.wrong_count
    }

    /// Accuracy in percent, `None` for a member with no attempts.
    pub fn accuracy_percent(&self) -> Option<f64> {
        let total = self.attempts();
        if total == 0 {
            return None;
        }
        Some(self.correct_count as f64 * 100.0 / total as f64)
    }

    pub fn record_correct(&mut self, new_highest_valid_streak: Option<u64>) {
        self.score += 1;
        self.correct_count += 1;
        if let Some(streak) = new_highest_valid_streak {
            self.highest_valid_streak = self.highest_valid_streak.max(streak);
        }
    }

    pub fn record_wrong(&mut self) {
        self.score -= 1;
        self.wrong_count += 1;
    }

    pub fn apply(&mut self, mutation: &LedgerMutation) {
        match mutation {
            LedgerMutation::Correct {
                new_highest_valid_streak,
                ..
            } => self.record_correct(*new_highest_valid_streak),
            LedgerMutation::Wrong { .. } => self.record_wrong(),
        }
    }

    /// `score == correct_count - wrong_count`.
    pub fn is_consistent(&self) -> bool {
        self.score == self.correct_count as i64 - self.wrong_count as i64
    }
}

/// Ledger change produced by one counting move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerMutation {
    /// `score += 1`, `correct_count += 1`, and raise `highest_valid_streak`
    /// when a new value is supplied.
    Correct {
        member_id: MemberId,
        new_highest_valid_streak: Option<u64>,
    },
    /// `score -= 1`, `wrong_count += 1`.
    Wrong { member_id: MemberId },
}

impl LedgerMutation {
    pub fn member_id(&self) -> MemberId {
        match self {
            LedgerMutation::Correct { member_id, .. } | LedgerMutation::Wrong { member_id } => {
                *member_id
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SequenceState
// ---------------------------------------------------------------------------

/// The active game for one counting channel.
///
/// Invariant: `current_count == 0` implies `current_member_id == None`.
/// Mutated only through `tally-engine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    pub channel_id: ChannelId,
    pub current_count: u64,
    pub current_member_id: Option<MemberId>,
    pub high_score: u64,
    pub high_score_emoji_shown: bool,
    pub penalized_member_id: Option<MemberId>,
    pub penalty_redemption_progress: u32,
}

impl SequenceState {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            current_count: 0,
            current_member_id: None,
            high_score: 0,
            high_score_emoji_shown: false,
            penalized_member_id: None,
            penalty_redemption_progress: 0,
        }
    }

    /// The number the next submission must evaluate to.
    pub fn next_expected(&self) -> u64 {
        self.current_count + 1
    }

    pub fn is_consistent(&self) -> bool {
        (self.current_count != 0 || self.current_member_id.is_none())
            && self.high_score >= self.current_count
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Granted to consistently accurate members.
    Reliable,
    /// Held by the member who most recently broke the sequence.
    Penalty,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Reliable => "reliable",
            RoleKind::Penalty => "penalty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    Grant,
    Revoke,
}

/// A role change for the role-membership collaborator to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleIntent {
    pub member_id: MemberId,
    pub action: RoleAction,
    pub role_kind: RoleKind,
}

impl RoleIntent {
    pub fn grant(member_id: MemberId, role_kind: RoleKind) -> Self {
        Self {
            member_id,
            action: RoleAction::Grant,
            role_kind,
        }
    }

    pub fn revoke(member_id: MemberId, role_kind: RoleKind) -> Self {
        Self {
            member_id,
            action: RoleAction::Revoke,
            role_kind,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// A message posted in the counting channel, as delivered by the event source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub channel_id: ChannelId,
    pub member_id: MemberId,
    pub message_id: MessageId,
    pub text: String,
    pub ts_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_mutations_keep_score_consistent() {
        let mut r = MemberRecord::new(MemberId(7));
        r.record_correct(Some(3));
        r.record_correct(None);
        r.record_wrong();
        assert_eq!(r.score, 1);
        assert_eq!(r.correct_count, 2);
        assert_eq!(r.wrong_count, 1);
        assert_eq!(r.highest_valid_streak, 3);
        assert!(r.is_consistent());
    }

    #[test]
    fn highest_valid_streak_never_lowered() {
        let mut r = MemberRecord::new(MemberId(1));
        r.record_correct(Some(10));
        r.record_correct(Some(4));
        assert_eq!(r.highest_valid_streak, 10);
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&MemberId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn fresh_state_is_consistent() {
        let s = SequenceState::new(ChannelId(1));
        assert!(s.is_consistent());
        assert_eq!(s.next_expected(), 1);
    }
}
