use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tally_reconcile::{Presence, RoleHolders};
use tally_runtime::{RoleDirectory, RoleError};
use tally_schemas::{MemberId, RoleIntent, RoleKind};

#[derive(Debug, Default)]
struct Inner {
    presence: Presence,
    holders: RoleHolders,
    applied: Vec<RoleIntent>,
    unreachable: BTreeSet<MemberId>,
}

/// Member directory held in memory. Presence starts unknown (everyone
/// counts as present).
#[derive(Debug, Default)]
pub struct FakeDirectory {
    inner: Mutex<Inner>,
}

impl FakeDirectory {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_present(&self, members: &[u64]) {
        self.lock().presence =
            Presence::Known(members.iter().copied().map(MemberId).collect());
    }

    pub fn grant_directly(&self, member: u64, role_kind: RoleKind) {
        self.lock()
            .holders
            .apply(&RoleIntent::grant(MemberId(member), role_kind));
    }

    /// Role changes for `member` fail with a transport error.
    pub fn make_unreachable(&self, member: u64) {
        self.lock().unreachable.insert(MemberId(member));
    }

    pub fn role_holders(&self) -> RoleHolders {
        self.lock().holders.clone()
    }

    pub fn applied(&self) -> Vec<RoleIntent> {
        self.lock().applied.clone()
    }
}

#[async_trait]
impl RoleDirectory for FakeDirectory {
    async fn holders(&self, role_kind: RoleKind) -> Result<BTreeSet<MemberId>, RoleError> {
        Ok(self.lock().holders.holders(role_kind).clone())
    }

    async fn presence(&self) -> Result<Presence, RoleError> {
        Ok(self.lock().presence.clone())
    }

    async fn apply(&self, intent: RoleIntent) -> Result<(), RoleError> {
        let mut inner = self.lock();
        if !inner.presence.contains(intent.member_id) {
            return Err(RoleError::MemberNotResolvable(intent.member_id));
        }
        if inner.unreachable.contains(&intent.member_id) {
            return Err(RoleError::Transport("connection reset".to_string()));
        }
        inner.holders.apply(&intent);
        inner.applied.push(intent);
        Ok(())
    }
}
