use tally_schemas::{MemberRecord, RoleIntent, RoleKind};

use crate::{
    ReconcileInput, ReconcilePlan, RELIABLE_MIN_ACCURACY_PERCENT, RELIABLE_MIN_CORRECT,
};

/// Reliable status eligibility.
///
/// Integer comparison: `correct / attempts >= 0.99` is
/// `100 * correct >= 99 * attempts`, so no rounding at the boundary.
pub fn is_reliable(record: &MemberRecord) -> bool {
    let attempts = record.attempts();
    if attempts == 0 || record.correct_count < RELIABLE_MIN_CORRECT {
        return false;
    }
    u128::from(record.correct_count) * 100
        >= u128::from(attempts) * u128::from(RELIABLE_MIN_ACCURACY_PERCENT)
}

/// Compute the role changes needed to bring holders in line with the ledger
/// and the sequence state.
pub fn plan(input: &ReconcileInput<'_>) -> ReconcilePlan {
    let mut out = ReconcilePlan::default();

    if input.features.penalty {
        plan_penalty(input, &mut out);
    }
    if input.features.reliable {
        plan_reliable(input, &mut out);
    }

    out
}

fn plan_penalty(input: &ReconcileInput<'_>, out: &mut ReconcilePlan) {
    let holders = input.holders.holders(RoleKind::Penalty);

    let designated = match input.penalized_member_id {
        Some(id) if input.presence.contains(id) => Some(id),
        Some(_) => {
            out.clear_penalized = true;
            None
        }
        None => None,
    };

    // 1) Everyone else still here loses it
    for id in holders {
        if Some(*id) != designated && input.presence.contains(*id) {
            out.intents.push(RoleIntent::revoke(*id, RoleKind::Penalty));
        }
    }

    // 2) The designated member gains it
    if let Some(id) = designated {
        if !holders.contains(&id) {
            out.intents.push(RoleIntent::grant(id, RoleKind::Penalty));
        }
    }
}

fn plan_reliable(input: &ReconcileInput<'_>, out: &mut ReconcilePlan) {
    let holders = input.holders.holders(RoleKind::Reliable);

    let mut dirty: Vec<&MemberRecord> = input.dirty.iter().collect();
    dirty.sort_by_key(|r| r.member_id);
    dirty.dedup_by_key(|r| r.member_id);

    for record in dirty {
        let id = record.member_id;
        if !input.presence.contains(id) {
            continue;
        }
        let holds = holders.contains(&id);
        match (is_reliable(record), holds) {
            (true, false) => out.intents.push(RoleIntent::grant(id, RoleKind::Reliable)),
            (false, true) => out.intents.push(RoleIntent::revoke(id, RoleKind::Reliable)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_schemas::MemberId;

    fn rec(correct: u64, wrong: u64) -> MemberRecord {
        let mut r = MemberRecord::new(MemberId(1));
        for _ in 0..correct {
            r.record_correct(None);
        }
        for _ in 0..wrong {
            r.record_wrong();
        }
        r
    }

    #[test]
    fn reliable_boundary() {
        assert!(is_reliable(&rec(150, 1)));
        assert!(is_reliable(&rec(99 * 2, 2)));
        assert!(!is_reliable(&rec(197, 3)));
        assert!(!is_reliable(&rec(99, 0)));
        assert!(is_reliable(&rec(100, 0)));
        assert!(!is_reliable(&rec(0, 0)));
    }
}
