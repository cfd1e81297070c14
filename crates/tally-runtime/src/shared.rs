//! State shared by the submission path and the reconciliation pass.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdGuard};
use std::time::Duration;

use tally_engine::Features;
use tally_ledger::{GameStore, StoreError};
use tally_reconcile::RoleFeatures;
use tally_schemas::{ChannelId, MemberId, SequenceState};
use tokio::sync::Mutex;

use crate::{NoticeSink, PassReport, RoleDirectory, RuntimeError};

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub channel_id: ChannelId,
    pub features: Features,
    pub roles: RoleFeatures,
    pub quiet_delay: Duration,
}

impl RuntimeOptions {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            features: Features::default(),
            roles: RoleFeatures::default(),
            quiet_delay: Duration::from_secs(5),
        }
    }
}

pub(crate) struct Core {
    pub(crate) store: Arc<dyn GameStore>,
    pub(crate) notices: Arc<dyn NoticeSink>,
    pub(crate) roles: Arc<dyn RoleDirectory>,
    pub(crate) opts: RuntimeOptions,
    /// The serialization point: held across the durable commit of a move.
    pub(crate) state: Mutex<SequenceState>,
    dirty: StdMutex<BTreeSet<MemberId>>,
    halted: AtomicBool,
    last_pass: StdMutex<Option<PassReport>>,
}

fn lock<T>(m: &StdMutex<T>) -> StdGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Core {
    pub(crate) fn new(
        store: Arc<dyn GameStore>,
        notices: Arc<dyn NoticeSink>,
        roles: Arc<dyn RoleDirectory>,
        opts: RuntimeOptions,
        state: SequenceState,
    ) -> Self {
        Self {
            store,
            notices,
            roles,
            opts,
            state: Mutex::new(state),
            dirty: StdMutex::new(BTreeSet::new()),
            halted: AtomicBool::new(false),
            last_pass: StdMutex::new(None),
        }
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub(crate) fn halt(&self, err: &StoreError, during: &'static str) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            tracing::error!(error = %err, during, "durable write failed; halting game mutations");
        }
    }

    pub(crate) fn resume(&self) -> bool {
        self.halted.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn mark_dirty(&self, member_id: MemberId) {
        lock(&self.dirty).insert(member_id);
    }

    /// Hand the current batch to a pass. Members dirtied while the pass runs
    /// land in a fresh batch and are checked by the next pass.
    pub(crate) fn take_dirty(&self) -> BTreeSet<MemberId> {
        std::mem::take(&mut *lock(&self.dirty))
    }

    /// Put members back for the next pass.
    pub(crate) fn restore_dirty(&self, members: BTreeSet<MemberId>) {
        lock(&self.dirty).extend(members);
    }

    pub(crate) fn dirty_len(&self) -> usize {
        lock(&self.dirty).len()
    }

    pub(crate) fn set_last_pass(&self, report: PassReport) {
        *lock(&self.last_pass) = Some(report);
    }

    pub(crate) fn last_pass(&self) -> Option<PassReport> {
        lock(&self.last_pass).clone()
    }

    /// Apply `change` to a copy of the state, persist the copy, and only then
    /// make it current. `change` returns `false` when there is nothing to do.
    pub(crate) async fn persist_change<F>(
        &self,
        during: &'static str,
        change: F,
    ) -> Result<Option<SequenceState>, RuntimeError>
    where
        F: FnOnce(&mut SequenceState) -> bool,
    {
        if self.is_halted() {
            return Err(RuntimeError::StoreHalted);
        }
        let mut state = self.state.lock().await;
        // A writer ahead of us may have halted while we waited.
        if self.is_halted() {
            return Err(RuntimeError::StoreHalted);
        }
        let mut next = state.clone();
        if !change(&mut next) {
            return Ok(None);
        }
        if let Err(e) = self.store.save_sequence(&next).await {
            self.halt(&e, during);
            return Err(RuntimeError::Persistence(e));
        }
        *state = next.clone();
        Ok(Some(next))
    }
}
