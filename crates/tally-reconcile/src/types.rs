use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tally_schemas::{MemberId, MemberRecord, RoleAction, RoleIntent, RoleKind};

/// Minimum accepted submissions before reliable status is considered.
pub const RELIABLE_MIN_CORRECT: u64 = 100;

/// Required accuracy, in whole percent.
pub const RELIABLE_MIN_ACCURACY_PERCENT: u64 = 99;

/// Which status roles are configured. A role with no configured identifier is
/// never granted or revoked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFeatures {
    pub reliable: bool,
    pub penalty: bool,
}

impl RoleFeatures {
    pub fn all() -> Self {
        Self {
            reliable: true,
            penalty: true,
        }
    }
}

/// Who is currently in the space.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Presence {
    /// The directory has not been synced yet. Everyone is assumed present.
    #[default]
    Unknown,
    Known(BTreeSet<MemberId>),
}

impl Presence {
    pub fn contains(&self, member_id: MemberId) -> bool {
        match self {
            Presence::Unknown => true,
            Presence::Known(ids) => ids.contains(&member_id),
        }
    }
}

/// Current holders of each status role as reported by the directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleHolders {
    pub reliable: BTreeSet<MemberId>,
    pub penalty: BTreeSet<MemberId>,
}

impl RoleHolders {
    pub fn holders(&self, role_kind: RoleKind) -> &BTreeSet<MemberId> {
        match role_kind {
            RoleKind::Reliable => &self.reliable,
            RoleKind::Penalty => &self.penalty,
        }
    }

    fn holders_mut(&mut self, role_kind: RoleKind) -> &mut BTreeSet<MemberId> {
        match role_kind {
            RoleKind::Reliable => &mut self.reliable,
            RoleKind::Penalty => &mut self.penalty,
        }
    }

    /// Apply an intent as if the collaborator carried it out.
    pub fn apply(&mut self, intent: &RoleIntent) {
        let set = self.holders_mut(intent.role_kind);
        match intent.action {
            RoleAction::Grant => {
                set.insert(intent.member_id);
            }
            RoleAction::Revoke => {
                set.remove(&intent.member_id);
            }
        }
    }
}

/// Everything one pass needs.
#[derive(Clone, Debug)]
pub struct ReconcileInput<'a> {
    /// Ledger records of members touched since the last pass.
    pub dirty: &'a [MemberRecord],
    pub holders: &'a RoleHolders,
    pub penalized_member_id: Option<MemberId>,
    pub presence: &'a Presence,
    pub features: RoleFeatures,
}

/// Output of one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Ordered: penalty revokes, penalty grant, then reliable changes by member id.
    pub intents: Vec<RoleIntent>,
    /// The designated penalized member could not be resolved; the caller must
    /// clear the designation and persist the sequence state.
    pub clear_penalized: bool,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty() && !self.clear_penalized
    }
}
