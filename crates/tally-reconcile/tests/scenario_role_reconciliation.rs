use std::collections::BTreeSet;

use tally_reconcile::*;
use tally_schemas::{MemberId, MemberRecord, RoleIntent, RoleKind};

fn rec(id: u64, correct: u64, wrong: u64) -> MemberRecord {
    let mut r = MemberRecord::new(MemberId(id));
    for _ in 0..correct {
        r.record_correct(None);
    }
    for _ in 0..wrong {
        r.record_wrong();
    }
    r
}

fn ids(v: &[u64]) -> BTreeSet<MemberId> {
    v.iter().copied().map(MemberId).collect()
}

#[test]
fn scenario_accurate_member_is_granted_reliable_status() {
    let dirty = [rec(1, 150, 1)];
    let holders = RoleHolders::default();
    let p = plan(&ReconcileInput {
        dirty: &dirty,
        holders: &holders,
        penalized_member_id: None,
        presence: &Presence::Unknown,
        features: RoleFeatures::all(),
    });
    assert_eq!(p.intents, vec![RoleIntent::grant(MemberId(1), RoleKind::Reliable)]);
    assert!(!p.clear_penalized);
}

#[test]
fn scenario_inaccurate_holder_loses_reliable_status() {
    let dirty = [rec(1, 150, 10), rec(2, 50, 0)];
    let holders = RoleHolders {
        reliable: ids(&[1, 2]),
        penalty: BTreeSet::new(),
    };
    let p = plan(&ReconcileInput {
        dirty: &dirty,
        holders: &holders,
        penalized_member_id: None,
        presence: &Presence::Unknown,
        features: RoleFeatures::all(),
    });
    assert_eq!(
        p.intents,
        vec![
            RoleIntent::revoke(MemberId(1), RoleKind::Reliable),
            RoleIntent::revoke(MemberId(2), RoleKind::Reliable),
        ]
    );
}

#[test]
fn scenario_penalty_moves_to_the_designated_member() {
    let holders = RoleHolders {
        reliable: BTreeSet::new(),
        penalty: ids(&[3, 4]),
    };
    let p = plan(&ReconcileInput {
        dirty: &[],
        holders: &holders,
        penalized_member_id: Some(MemberId(7)),
        presence: &Presence::Known(ids(&[3, 4, 7])),
        features: RoleFeatures::all(),
    });
    assert_eq!(
        p.intents,
        vec![
            RoleIntent::revoke(MemberId(3), RoleKind::Penalty),
            RoleIntent::revoke(MemberId(4), RoleKind::Penalty),
            RoleIntent::grant(MemberId(7), RoleKind::Penalty),
        ]
    );
}

#[test]
fn scenario_departed_penalized_member_is_cleared() {
    let holders = RoleHolders {
        reliable: BTreeSet::new(),
        penalty: ids(&[7]),
    };
    let p = plan(&ReconcileInput {
        dirty: &[],
        holders: &holders,
        penalized_member_id: Some(MemberId(7)),
        presence: &Presence::Known(ids(&[1])),
        features: RoleFeatures::all(),
    });
    assert!(p.intents.is_empty());
    assert!(p.clear_penalized);
}

#[test]
fn scenario_disabled_roles_produce_nothing() {
    let dirty = [rec(1, 150, 0)];
    let holders = RoleHolders {
        reliable: BTreeSet::new(),
        penalty: ids(&[2]),
    };
    let p = plan(&ReconcileInput {
        dirty: &dirty,
        holders: &holders,
        penalized_member_id: Some(MemberId(9)),
        presence: &Presence::Unknown,
        features: RoleFeatures::default(),
    });
    assert!(p.is_empty());
}

#[test]
fn scenario_second_pass_is_empty_after_applying_the_first() {
    let dirty = [rec(1, 150, 1), rec(2, 10, 10), rec(3, 300, 0)];
    let mut holders = RoleHolders {
        reliable: ids(&[2]),
        penalty: ids(&[1, 3]),
    };
    let presence = Presence::Known(ids(&[1, 2, 3]));

    let input = |holders: &RoleHolders| {
        plan(&ReconcileInput {
            dirty: &dirty,
            holders,
            penalized_member_id: Some(MemberId(2)),
            presence: &presence,
            features: RoleFeatures::all(),
        })
    };

    let first = input(&holders);
    assert_eq!(first.intents.len(), 6);
    for intent in &first.intents {
        holders.apply(intent);
    }

    let second = input(&holders);
    assert!(second.is_empty(), "second pass not empty: {second:?}");
    assert_eq!(holders.reliable, ids(&[1, 3]));
    assert_eq!(holders.penalty, ids(&[2]));
}
