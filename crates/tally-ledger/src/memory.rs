//! In-memory [`GameStore`].
//!
//! One mutex guards members and sequences together, so `commit_move` is
//! trivially atomic. Records remember the order in which they were first
//! seen for leaderboard tie-breaks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tally_schemas::{ChannelId, LedgerMutation, MemberId, MemberRecord, SequenceState};

use crate::{GameStore, MemberLedger, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    first_seen: u64,
    record: MemberRecord,
}

#[derive(Debug, Default)]
struct Inner {
    members: BTreeMap<MemberId, Entry>,
    next_seen: u64,
    sequences: BTreeMap<ChannelId, SequenceState>,
}

impl Inner {
    fn ensure(&mut self, member_id: MemberId) -> &mut Entry {
        let next_seen = &mut self.next_seen;
        self.members.entry(member_id).or_insert_with(|| {
            let first_seen = *next_seen;
            *next_seen += 1;
            Entry {
                first_seen,
                record: MemberRecord::new(member_id),
            }
        })
    }

    fn mutate(&mut self, mutation: &LedgerMutation) -> Result<MemberRecord, StoreError> {
        let member_id = mutation.member_id();
        let entry = self
            .members
            .get_mut(&member_id)
            .ok_or(StoreError::UnknownMember(member_id))?;
        entry.record.apply(mutation);
        Ok(entry.record.clone())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl MemberLedger for InMemoryStore {
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberRecord>, StoreError> {
        Ok(self.lock()?.members.get(&member_id).map(|e| e.record.clone()))
    }

    async fn get_many(
        &self,
        member_ids: &BTreeSet<MemberId>,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(member_ids
            .iter()
            .filter_map(|id| inner.members.get(id).map(|e| e.record.clone()))
            .collect())
    }

    async fn upsert_new(&self, member_id: MemberId) -> Result<MemberRecord, StoreError> {
        Ok(self.lock()?.ensure(member_id).record.clone())
    }

    async fn apply_correct(
        &self,
        member_id: MemberId,
        new_highest_valid_streak: Option<u64>,
    ) -> Result<MemberRecord, StoreError> {
        self.lock()?.mutate(&LedgerMutation::Correct {
            member_id,
            new_highest_valid_streak,
        })
    }

    async fn apply_wrong(&self, member_id: MemberId) -> Result<MemberRecord, StoreError> {
        self.lock()?.mutate(&LedgerMutation::Wrong { member_id })
    }

    async fn rank_of(&self, member_id: MemberId) -> Result<Option<u64>, StoreError> {
        let inner = self.lock()?;
        let Some(me) = inner.members.get(&member_id) else {
            return Ok(None);
        };
        let rank = inner
            .members
            .values()
            .filter(|e| e.record.score >= me.record.score)
            .count();
        Ok(Some(rank as u64))
    }

    async fn top_n(&self, n: usize) -> Result<Vec<(MemberId, i64)>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<&Entry> = inner.members.values().collect();
        rows.sort_by(|a, b| {
            b.record
                .score
                .cmp(&a.record.score)
                .then(a.first_seen.cmp(&b.first_seen))
        });
        Ok(rows
            .into_iter()
            .take(n)
            .map(|e| (e.record.member_id, e.record.score))
            .collect())
    }

    async fn prune(&self, active: &BTreeSet<MemberId>) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.members.len();
        inner.members.retain(|id, _| active.contains(id));
        Ok((before - inner.members.len()) as u64)
    }
}

#[async_trait]
impl GameStore for InMemoryStore {
    async fn load_sequence(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<SequenceState>, StoreError> {
        Ok(self.lock()?.sequences.get(&channel_id).cloned())
    }

    async fn save_sequence(&self, state: &SequenceState) -> Result<(), StoreError> {
        self.lock()?
            .sequences
            .insert(state.channel_id, state.clone());
        Ok(())
    }

    async fn commit_move(
        &self,
        state: &SequenceState,
        mutation: &LedgerMutation,
    ) -> Result<MemberRecord, StoreError> {
        let mut inner = self.lock()?;
        let record = inner.mutate(mutation)?;
        inner.sequences.insert(state.channel_id, state.clone());
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
