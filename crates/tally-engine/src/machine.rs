//! Transition function for one counting move.
//!
//! # Transitions
//!
//! ```text
//!   DivisionByZero, or same member twice ──► Broken(RepeatedMember | DivisionByZero)
//!   value != current_count + 1           ──► Broken(WrongNumber)
//!   otherwise                             ──► Accepted
//! ```
//!
//! Every `Broken` outcome applies `Wrong` to the submitter, optionally marks
//! them as penalized, and resets the sequence. High score survives resets;
//! only [`admin_reset`] lowers it.

use tally_expr::ValidationError;
use tally_schemas::{
    LedgerMutation, MemberId, MemberRecord, SequenceState, PENALTY_REDEMPTION_THRESHOLD,
};

use crate::{BreakKind, Evaluation, Features, Intake, Notice, Outcome, Reaction, Transition};

/// Classify raw text.
pub fn intake(text: &str) -> Intake {
    match tally_expr::validate(text) {
        Ok(v) => Intake::Move(Evaluation::Value(v)),
        Err(ValidationError::NotANumberExpression) => Intake::Ignore,
        Err(ValidationError::DivisionByZero) => Intake::Move(Evaluation::DivisionByZero),
        Err(e) => Intake::Rejected(e),
    }
}

/// Apply one move by `record.member_id`.
///
/// `record` must be the submitter's ledger record as read before this move;
/// it is only consulted for `highest_valid_streak`.
pub fn apply_move(
    state: &mut SequenceState,
    record: &MemberRecord,
    evaluation: Evaluation,
    features: &Features,
) -> Transition {
    let member_id = record.member_id;

    let repeated = state.current_count > 0 && state.current_member_id == Some(member_id);

    let broken = match evaluation {
        Evaluation::DivisionByZero => Some(BreakKind::DivisionByZero),
        Evaluation::Value(_) if repeated => Some(BreakKind::RepeatedMember),
        Evaluation::Value(v) if v != state.next_expected() as i64 => Some(BreakKind::WrongNumber {
            expected: state.next_expected(),
            got: v,
        }),
        Evaluation::Value(_) => None,
    };

    if let Some(kind) = broken {
        return break_chain(state, member_id, kind, features);
    }

    state.current_count += 1;
    state.current_member_id = Some(member_id);
    state.high_score = state.high_score.max(state.current_count);
    let reaction = reaction_for_count(state);

    let count = state.current_count;
    let new_highest_valid_streak = (count > record.highest_valid_streak).then_some(count);

    let mut penalty_lifted = false;
    if state.penalized_member_id == Some(member_id) {
        state.penalty_redemption_progress += 1;
        if state.penalty_redemption_progress >= PENALTY_REDEMPTION_THRESHOLD {
            clear_penalty(state);
            penalty_lifted = true;
        }
    }

    Transition {
        outcome: Outcome::Accepted { count },
        mutation: LedgerMutation::Correct {
            member_id,
            new_highest_valid_streak,
        },
        reaction,
        notice: None,
        penalized: false,
        penalty_lifted,
    }
}

fn break_chain(
    state: &mut SequenceState,
    member_id: MemberId,
    kind: BreakKind,
    features: &Features,
) -> Transition {
    if features.penalty_enabled {
        // Role change is queued for the next reconciliation pass.
        state.penalized_member_id = Some(member_id);
    }
    reset(state);

    Transition {
        outcome: Outcome::Broken(kind),
        mutation: LedgerMutation::Wrong { member_id },
        reaction: Reaction::Broken,
        notice: Some(Notice::CountBroken {
            member_id,
            kind,
            high_score: state.high_score,
        }),
        penalized: features.penalty_enabled,
        penalty_lifted: false,
    }
}

fn reset(state: &mut SequenceState) {
    state.current_count = 0;
    state.current_member_id = None;
    state.high_score_emoji_shown = false;
    state.penalty_redemption_progress = 0;
}

/// Marker for the count just accepted. Sets the shown flag when the
/// celebration marker is handed out.
fn reaction_for_count(state: &mut SequenceState) -> Reaction {
    if state.current_count == state.high_score && !state.high_score_emoji_shown {
        state.high_score_emoji_shown = true;
        return Reaction::HighScore;
    }
    match state.current_count {
        100 => Reaction::Hundred,
        69 => Reaction::Nice,
        666 => Reaction::Beast,
        _ => Reaction::Accepted,
    }
}

/// Administrative reset: the only path that lowers `high_score`.
pub fn admin_reset(state: &mut SequenceState) {
    reset(state);
    state.high_score = 0;
}

/// Drop the penalty designation and its redemption progress.
pub fn clear_penalty(state: &mut SequenceState) {
    state.penalized_member_id = None;
    state.penalty_redemption_progress = 0;
}

/// Forget who posted the current count (member left the space).
/// Returns `true` if anything changed.
pub fn forget_current_member(state: &mut SequenceState) -> bool {
    state.current_member_id.take().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_schemas::ChannelId;

    #[test]
    fn celebration_marker_once_per_cycle() {
        let mut s = SequenceState::new(ChannelId(1));
        s.current_count = 10;
        s.high_score = 10;
        assert_eq!(reaction_for_count(&mut s), Reaction::HighScore);
        assert!(s.high_score_emoji_shown);
        s.current_count = 11;
        s.high_score = 11;
        assert_eq!(reaction_for_count(&mut s), Reaction::Accepted);
    }

    #[test]
    fn milestone_markers_below_high_score() {
        let mut s = SequenceState::new(ChannelId(1));
        s.high_score = 1000;
        for (count, want) in [
            (100, Reaction::Hundred),
            (69, Reaction::Nice),
            (666, Reaction::Beast),
            (70, Reaction::Accepted),
        ] {
            s.current_count = count;
            assert_eq!(reaction_for_count(&mut s), want);
        }
    }
}
