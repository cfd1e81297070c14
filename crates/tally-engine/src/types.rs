use serde::{Deserialize, Serialize};
use tally_expr::ValidationError;
use tally_schemas::{LedgerMutation, MemberId, MessageId};

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Classification of raw submitted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake {
    /// Not a counting attempt. No reaction, no state change.
    Ignore,
    /// A counting attempt that could not be evaluated (syntax or range).
    /// User-visible, but the chain is not broken.
    Rejected(ValidationError),
    /// A game move.
    Move(Evaluation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Value(i64),
    /// No numeric comparison is possible; breaks the chain like a repeat.
    DivisionByZero,
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Feature toggles derived from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    /// A penalty role is configured: rule breakers are marked as penalized.
    pub penalty_enabled: bool,
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// Marker attached to the submitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    /// First time the high score is reached in this cycle.
    HighScore,
    Hundred,
    Nice,
    Beast,
    Accepted,
    Broken,
    Warning,
}

impl Reaction {
    pub fn emoji(&self) -> &'static str {
        match self {
            Reaction::HighScore => "🎉",
            Reaction::Hundred => "💯",
            Reaction::Nice => "😏",
            Reaction::Beast => "👹",
            Reaction::Accepted => "✅",
            Reaction::Broken => "❌",
            Reaction::Warning => "⚠️",
        }
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

/// Why the chain was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakKind {
    /// Same member posted two accepted numbers in a row.
    RepeatedMember,
    WrongNumber { expected: u64, got: i64 },
    DivisionByZero,
}

/// Channel announcement content. Rendering and delivery belong to the
/// notice sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    CountBroken {
        member_id: MemberId,
        kind: BreakKind,
        high_score: u64,
    },
    SyntaxError {
        member_id: MemberId,
        message_id: MessageId,
        detail: String,
    },
    NumberDeleted {
        member_id: MemberId,
        next_expected: u64,
    },
    NumberEdited {
        member_id: MemberId,
        message_id: MessageId,
        next_expected: u64,
    },
    Online {
        current_count: u64,
        high_score: u64,
        last_member_id: Option<MemberId>,
    },
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Accepted { count: u64 },
    Broken(BreakKind),
}

/// Everything one move asks of the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub outcome: Outcome,
    pub mutation: LedgerMutation,
    pub reaction: Reaction,
    pub notice: Option<Notice>,
    /// The submitter was marked as the penalized member by this move.
    pub penalized: bool,
    /// The submitter completed redemption with this move.
    pub penalty_lifted: bool,
}
