use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tally_ledger::{GameStore, InMemoryStore, MemberLedger, StoreError};
use tally_schemas::{ChannelId, LedgerMutation, MemberId, MemberRecord, SequenceState};

/// Store that can be taken down. While down every call fails with
/// `StoreError::Unavailable`; the wrapped data is untouched.
#[derive(Debug)]
pub struct FlakyStore {
    inner: Arc<InMemoryStore>,
    down: AtomicBool,
    latency: Mutex<Duration>,
    calls: AtomicU64,
    commits: AtomicU64,
    sequence_saves: AtomicU64,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            calls: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            sequence_saves: AtomicU64::new(0),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Every call waits this long before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Calls made, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &Arc<InMemoryStore> {
        &self.inner
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn sequence_saves(&self) -> u64 {
        self.sequence_saves.load(Ordering::SeqCst)
    }

    async fn check(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MemberLedger for FlakyStore {
    async fn get(&self, member_id: MemberId) -> Result<Option<MemberRecord>, StoreError> {
        self.check().await?;
        self.inner.get(member_id).await
    }

    async fn get_many(
        &self,
        member_ids: &BTreeSet<MemberId>,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        self.check().await?;
        self.inner.get_many(member_ids).await
    }

    async fn upsert_new(&self, member_id: MemberId) -> Result<MemberRecord, StoreError> {
        self.check().await?;
        self.inner.upsert_new(member_id).await
    }

    async fn apply_correct(
        &self,
        member_id: MemberId,
        new_highest_valid_streak: Option<u64>,
    ) -> Result<MemberRecord, StoreError> {
        self.check().await?;
        self.inner
            .apply_correct(member_id, new_highest_valid_streak)
            .await
    }

    async fn apply_wrong(&self, member_id: MemberId) -> Result<MemberRecord, StoreError> {
        self.check().await?;
        self.inner.apply_wrong(member_id).await
    }

    async fn rank_of(&self, member_id: MemberId) -> Result<Option<u64>, StoreError> {
        self.check().await?;
        self.inner.rank_of(member_id).await
    }

    async fn top_n(&self, n: usize) -> Result<Vec<(MemberId, i64)>, StoreError> {
        self.check().await?;
        self.inner.top_n(n).await
    }

    async fn prune(&self, active: &BTreeSet<MemberId>) -> Result<u64, StoreError> {
        self.check().await?;
        self.inner.prune(active).await
    }
}

#[async_trait]
impl GameStore for FlakyStore {
    async fn load_sequence(
        &self,
        channel_id: ChannelId,
    ) -> Result<Option<SequenceState>, StoreError> {
        self.check().await?;
        self.inner.load_sequence(channel_id).await
    }

    async fn save_sequence(&self, state: &SequenceState) -> Result<(), StoreError> {
        self.check().await?;
        self.sequence_saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_sequence(state).await
    }

    async fn commit_move(
        &self,
        state: &SequenceState,
        mutation: &LedgerMutation,
    ) -> Result<MemberRecord, StoreError> {
        self.check().await?;
        let record = self.inner.commit_move(state, mutation).await?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check().await
    }
}
