//! Counting rules driven through the runtime with fake collaborators.

use std::sync::Arc;

use tally_engine::{BreakKind, Notice, Outcome, Reaction};
use tally_ledger::{GameStore, InMemoryStore, MemberLedger};
use tally_runtime::SubmitReport;
use tally_schemas::{ChannelId, MemberId, MemberRecord, MessageId, SequenceState};
use tally_testkit::*;

async fn seeded(count: u64, last: u64, high: u64) -> Harness {
    let inner = Arc::new(InMemoryStore::new());
    for id in [1, 2, last] {
        inner.upsert_new(MemberId(id)).await.unwrap();
    }
    let mut state = SequenceState::new(CHANNEL);
    state.current_count = count;
    state.current_member_id = Some(MemberId(last));
    state.high_score = high;
    inner.save_sequence(&state).await.unwrap();
    Harness::start_with(Arc::new(FlakyStore::new(inner)), options())
        .await
        .unwrap()
}

fn applied(r: SubmitReport) -> (Outcome, Reaction, MemberRecord) {
    match r {
        SubmitReport::Applied {
            outcome,
            reaction,
            record,
        } => (outcome, reaction, record),
        other => panic!("expected a move, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn starts_with_online_notice() {
    let h = seeded(12, 2, 40).await;
    assert_eq!(
        h.sink.notices(),
        vec![Notice::Online {
            current_count: 12,
            high_score: 40,
            last_member_id: Some(MemberId(2)),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn new_high_score_celebrated_then_repeat_breaks() {
    let mut h = seeded(5, 2, 5).await;

    let (outcome, reaction, _) = applied(h.say(1, "6").await.unwrap());
    assert_eq!(outcome, Outcome::Accepted { count: 6 });
    assert_eq!(reaction, Reaction::HighScore);
    let s = h.runtime.sequence().await;
    assert_eq!((s.current_count, s.high_score), (6, 6));
    assert!(s.high_score_emoji_shown);

    let (outcome, _, record) = applied(h.say(1, "7").await.unwrap());
    assert_eq!(outcome, Outcome::Broken(BreakKind::RepeatedMember));
    assert_eq!((record.score, record.correct_count, record.wrong_count), (0, 1, 1));

    let s = h.runtime.sequence().await;
    assert_eq!(s.current_count, 0);
    assert_eq!(s.current_member_id, None);
    assert_eq!(s.high_score, 6);
    assert_eq!(s.penalized_member_id, Some(MemberId(1)));

    // Durable state matches memory.
    assert_eq!(h.store.inner().load_sequence(CHANNEL).await.unwrap(), Some(s));
}

#[tokio::test(start_paused = true)]
async fn division_by_zero_breaks_with_its_own_notice() {
    let mut h = seeded(9, 1, 20).await;
    h.sink.clear();

    let r = h.say(2, "10/0").await.unwrap();
    assert!(matches!(
        r,
        SubmitReport::Applied {
            outcome: Outcome::Broken(BreakKind::DivisionByZero),
            reaction: Reaction::Broken,
            ..
        }
    ));
    assert_eq!(h.runtime.sequence().await.current_count, 0);

    let Some(Notice::CountBroken { member_id, kind, .. }) = h.sink.last_notice() else {
        panic!("expected a count-broken notice");
    };
    assert_eq!(member_id, MemberId(2));
    assert_eq!(kind, BreakKind::DivisionByZero);
    let rec = h.store.inner().get(MemberId(2)).await.unwrap().unwrap();
    assert_eq!((rec.score, rec.wrong_count), (-1, 1));
}

#[tokio::test(start_paused = true)]
async fn syntax_error_warns_without_touching_the_chain() {
    let mut h = seeded(3, 1, 3).await;
    h.sink.clear();
    let before = h.runtime.sequence().await;

    let r = h.say(2, "(4").await.unwrap();
    assert!(matches!(r, SubmitReport::Rejected(_)));
    assert_eq!(h.runtime.sequence().await, before);
    assert!(matches!(h.sink.last_notice(), Some(Notice::SyntaxError { .. })));
    assert_eq!(h.sink.reactions().last().map(|(_, r)| *r), Some(Reaction::Warning));
    assert_eq!(h.store.commits(), 0);

    // Still expecting 4.
    let r = h.say(2, "2*2").await.unwrap();
    assert!(matches!(
        r,
        SubmitReport::Applied {
            outcome: Outcome::Accepted { count: 4 },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn chatter_and_other_channels_are_ignored() {
    let mut h = Harness::start().await.unwrap();
    h.sink.clear();

    assert_eq!(h.say(1, "good morning").await.unwrap(), SubmitReport::Ignored);
    assert_eq!(h.say(1, "()").await.unwrap(), SubmitReport::Ignored);

    let mut elsewhere = submission(1, 99, "1");
    elsewhere.channel_id = ChannelId(7);
    assert_eq!(h.runtime.submit(&elsewhere).await.unwrap(), SubmitReport::Ignored);

    assert!(h.sink.events().is_empty());
    assert_eq!(h.runtime.sequence().await.current_count, 0);
}

#[tokio::test(start_paused = true)]
async fn edits_and_deletes_only_warn() {
    let mut h = Harness::start().await.unwrap();
    h.say(1, "1").await.unwrap();
    h.say(2, "2").await.unwrap();
    let before = h.runtime.sequence().await;

    let n = h
        .runtime
        .edit(MemberId(2), MessageId(2), "2", "3")
        .await;
    assert!(matches!(n, Some(Notice::NumberEdited { next_expected: 3, .. })));
    assert!(h.runtime.edit(MemberId(2), MessageId(2), "hi", "hey").await.is_none());

    let n = h.runtime.delete(MemberId(1), "1", true).await;
    assert!(matches!(n, Some(Notice::NumberDeleted { next_expected: 3, .. })));
    assert!(h.runtime.delete(MemberId(1), "lol", false).await.is_none());

    assert_eq!(h.runtime.sequence().await, before);
}

#[tokio::test(start_paused = true)]
async fn stats_rank_and_leaderboard() {
    let mut h = Harness::start().await.unwrap();
    // 1 and 2 alternate up to 6; 3 then breaks.
    for n in 1..=6u64 {
        h.say(if n % 2 == 1 { 1 } else { 2 }, &n.to_string()).await.unwrap();
    }
    h.say(3, "100").await.unwrap();

    let top = h.runtime.member_stats(MemberId(1)).await.unwrap().unwrap();
    assert_eq!(top.rank, 2); // tied with member 2
    assert_eq!(top.score, 3);
    assert_eq!(top.highest_valid_streak, 5);
    assert_eq!(top.accuracy_percent, Some(100.0));

    let loser = h.runtime.member_stats(MemberId(3)).await.unwrap().unwrap();
    assert_eq!(loser.rank, 3);
    assert_eq!(loser.accuracy_percent, Some(0.0));
    assert!(h.runtime.member_stats(MemberId(77)).await.unwrap().is_none());

    let board = h.runtime.leaderboard(10).await.unwrap();
    assert_eq!(
        board.iter().map(|e| (e.position, e.member_id.0, e.score)).collect::<Vec<_>>(),
        vec![(1, 1, 3), (2, 2, 3), (3, 3, -1)]
    );

    let server = h.runtime.server_stats().await;
    assert_eq!((server.current_count, server.high_score), (0, 6));
}

#[tokio::test(start_paused = true)]
async fn admin_reset_is_the_only_way_down_for_high_score() {
    let mut h = Harness::start().await.unwrap();
    h.say(1, "1").await.unwrap();
    h.say(2, "2").await.unwrap();
    h.say(2, "3").await.unwrap();
    assert_eq!(h.runtime.sequence().await.high_score, 2);

    let s = h.runtime.admin_reset().await.unwrap();
    assert_eq!((s.current_count, s.high_score), (0, 0));
    assert_eq!(h.store.inner().load_sequence(CHANNEL).await.unwrap(), Some(s));
}
