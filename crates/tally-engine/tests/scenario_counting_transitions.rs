use tally_engine::*;
use tally_schemas::{ChannelId, LedgerMutation, MemberId, MemberRecord, SequenceState, PENALTY_REDEMPTION_THRESHOLD};

const A: MemberId = MemberId(1);
const B: MemberId = MemberId(2);

fn state_at(count: u64, by: Option<MemberId>, high: u64) -> SequenceState {
    let mut s = SequenceState::new(ChannelId(99));
    s.current_count = count;
    s.current_member_id = by;
    s.high_score = high;
    s
}

fn value(v: i64) -> Evaluation {
    Evaluation::Value(v)
}

#[test]
fn accepted_move_increments_and_tracks_high_score() {
    let mut s = state_at(3, Some(B), 10);
    let t = apply_move(&mut s, &MemberRecord::new(A), value(4), &Features::default());

    assert_eq!(t.outcome, Outcome::Accepted { count: 4 });
    assert_eq!(s.current_count, 4);
    assert_eq!(s.current_member_id, Some(A));
    assert_eq!(s.high_score, 10);
    assert_eq!(t.reaction, Reaction::Accepted);
    assert_eq!(
        t.mutation,
        LedgerMutation::Correct {
            member_id: A,
            new_highest_valid_streak: Some(4)
        }
    );
    assert!(t.notice.is_none());
}

#[test]
fn streak_only_reported_when_it_beats_the_record() {
    let mut s = state_at(3, Some(B), 10);
    let mut rec = MemberRecord::new(A);
    rec.highest_valid_streak = 50;
    let t = apply_move(&mut s, &rec, value(4), &Features::default());
    assert_eq!(
        t.mutation,
        LedgerMutation::Correct {
            member_id: A,
            new_highest_valid_streak: None
        }
    );
}

#[test]
fn new_high_score_then_repeat_breaks_chain() {
    // count 5, high 5: A posts 6, then immediately 7.
    let mut s = state_at(5, Some(B), 5);
    let features = Features::default();

    let t = apply_move(&mut s, &MemberRecord::new(A), value(6), &features);
    assert_eq!(t.reaction, Reaction::HighScore);
    assert_eq!(s.high_score, 6);
    assert!(s.high_score_emoji_shown);

    let t = apply_move(&mut s, &MemberRecord::new(A), value(7), &features);
    assert_eq!(t.outcome, Outcome::Broken(BreakKind::RepeatedMember));
    assert_eq!(t.mutation, LedgerMutation::Wrong { member_id: A });
    assert_eq!(t.reaction, Reaction::Broken);
    assert_eq!(s.current_count, 0);
    assert_eq!(s.current_member_id, None);
    assert!(!s.high_score_emoji_shown);
    assert_eq!(s.high_score, 6);
    assert_eq!(
        t.notice,
        Some(Notice::CountBroken {
            member_id: A,
            kind: BreakKind::RepeatedMember,
            high_score: 6
        })
    );
    assert_eq!(s.next_expected(), 1);
}

#[test]
fn wrong_number_reports_the_expected_value() {
    let mut s = state_at(9, Some(A), 20);
    let t = apply_move(&mut s, &MemberRecord::new(B), value(11), &Features::default());
    assert_eq!(
        t.outcome,
        Outcome::Broken(BreakKind::WrongNumber {
            expected: 10,
            got: 11
        })
    );
    assert_eq!(s.current_count, 0);
    let text = t.notice.unwrap().to_string();
    assert!(text.contains("The correct number was 10."));
}

#[test]
fn division_by_zero_is_a_violation_distinct_from_syntax() {
    let mut s = state_at(9, Some(A), 9);
    assert_eq!(intake("10/0"), Intake::Move(Evaluation::DivisionByZero));

    let t = apply_move(&mut s, &MemberRecord::new(B), Evaluation::DivisionByZero, &Features::default());
    assert_eq!(t.outcome, Outcome::Broken(BreakKind::DivisionByZero));
    assert_eq!(s.current_count, 0);
    assert_eq!(t.mutation, LedgerMutation::Wrong { member_id: B });
}

#[test]
fn syntax_errors_and_chatter_are_not_moves() {
    assert!(matches!(intake("1 +"), Intake::Rejected(_)));
    assert_eq!(intake("good morning"), Intake::Ignore);
    assert_eq!(intake("1 + 1"), Intake::Move(Evaluation::Value(2)));
}

#[test]
fn first_move_after_reset_may_come_from_the_breaker() {
    let mut s = state_at(0, None, 4);
    let t = apply_move(&mut s, &MemberRecord::new(A), value(1), &Features::default());
    assert_eq!(t.outcome, Outcome::Accepted { count: 1 });
}

#[test]
fn breaker_is_penalized_only_when_feature_enabled() {
    let mut s = state_at(2, Some(A), 2);
    let t = apply_move(&mut s, &MemberRecord::new(B), value(7), &Features::default());
    assert!(!t.penalized);
    assert_eq!(s.penalized_member_id, None);

    let mut s = state_at(2, Some(A), 2);
    let t = apply_move(
        &mut s,
        &MemberRecord::new(B),
        value(7),
        &Features { penalty_enabled: true },
    );
    assert!(t.penalized);
    assert_eq!(s.penalized_member_id, Some(B));
    assert_eq!(s.penalty_redemption_progress, 0);
}

#[test]
fn penalty_lifted_after_threshold_correct_moves_by_the_penalized_member() {
    let features = Features { penalty_enabled: true };
    let mut s = state_at(0, None, 100);
    s.penalized_member_id = Some(A);

    let mut lifted_at = None;
    for i in 0..(2 * PENALTY_REDEMPTION_THRESHOLD as i64) {
        let who = if i % 2 == 0 { A } else { B };
        let t = apply_move(&mut s, &MemberRecord::new(who), value(i + 1), &features);
        assert!(matches!(t.outcome, Outcome::Accepted { .. }));
        if t.penalty_lifted {
            lifted_at = Some(i);
        }
    }

    // A posts on even turns; the 30th A move is turn 58.
    assert_eq!(lifted_at, Some(58));
    assert_eq!(s.penalized_member_id, None);
    assert_eq!(s.penalty_redemption_progress, 0);
}

#[test]
fn reset_clears_redemption_progress() {
    let features = Features { penalty_enabled: true };
    let mut s = state_at(0, None, 100);
    s.penalized_member_id = Some(A);
    apply_move(&mut s, &MemberRecord::new(A), value(1), &features);
    assert_eq!(s.penalty_redemption_progress, 1);

    apply_move(&mut s, &MemberRecord::new(B), value(5), &features);
    assert_eq!(s.penalized_member_id, Some(B));
    assert_eq!(s.penalty_redemption_progress, 0);
}

#[test]
fn admin_reset_is_the_only_way_down_for_high_score() {
    let mut s = state_at(12, Some(A), 40);
    admin_reset(&mut s);
    assert_eq!(s.current_count, 0);
    assert_eq!(s.high_score, 0);
    assert!(s.is_consistent());
}

#[test]
fn edits_and_deletions_only_warn() {
    let s = state_at(7, Some(A), 7);

    let n = deletion_notice(&s, A, "7", false).unwrap();
    assert_eq!(
        n,
        Notice::NumberDeleted {
            member_id: A,
            next_expected: 8
        }
    );
    assert!(deletion_notice(&s, A, "just chatting", false).is_none());
    assert!(deletion_notice(&s, A, "edited away", true).is_some());

    let msg = tally_schemas::MessageId(5);
    assert!(edit_notice(&s, A, msg, "7", "7").is_none());
    assert!(edit_notice(&s, A, msg, "hi", "hello").is_none());
    assert!(edit_notice(&s, A, msg, "7", "seven").is_some());
    assert!(edit_notice(&s, A, msg, "seven", "7").is_some());
}
