//! Moves that land while a reconciliation pass is running are picked up by a
//! later pass.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tally_ledger::{InMemoryStore, MemberLedger};
use tally_reconcile::Presence;
use tally_runtime::{FlushOutcome, GameRuntime, RoleDirectory, RoleError};
use tally_schemas::{MemberId, RoleIntent, RoleKind};
use tally_testkit::*;
use tokio::sync::Notify;

/// Directory whose next holder lookup can be parked until released, or
/// made to fail.
#[derive(Default)]
struct ParkingDirectory {
    inner: FakeDirectory,
    park_next: AtomicBool,
    fail_reads: AtomicBool,
    parked: Notify,
    release: Notify,
}

#[async_trait]
impl RoleDirectory for ParkingDirectory {
    async fn holders(&self, role_kind: RoleKind) -> Result<BTreeSet<MemberId>, RoleError> {
        if self.park_next.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.release.notified().await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RoleError::Transport("gateway offline".to_string()));
        }
        self.inner.holders(role_kind).await
    }

    async fn presence(&self) -> Result<Presence, RoleError> {
        self.inner.presence().await
    }

    async fn apply(&self, intent: RoleIntent) -> Result<(), RoleError> {
        self.inner.apply(intent).await
    }
}

async fn start() -> (Arc<GameRuntime>, Arc<FlakyStore>, Arc<ParkingDirectory>) {
    let store = Arc::new(FlakyStore::new(Arc::new(InMemoryStore::new())));
    let directory = Arc::new(ParkingDirectory::default());
    let runtime = GameRuntime::start(
        store.clone(),
        Arc::new(RecordingSink::default()),
        directory.clone(),
        options(),
    )
    .await
    .unwrap();
    (Arc::new(runtime), store, directory)
}

async fn seed_correct(store: &FlakyStore, member: u64, correct: u32) {
    let ledger = store.inner();
    ledger.upsert_new(MemberId(member)).await.unwrap();
    for _ in 0..correct {
        ledger.apply_correct(MemberId(member), None).await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn member_reaching_eligibility_mid_pass_is_granted_by_the_timed_pass() {
    let (runtime, store, directory) = start().await;
    seed_correct(&store, 1, 98).await;

    runtime.submit(&submission(1, 1, "1")).await.unwrap();

    // The forced pass reads member 1 at 99 correct, then parks.
    directory.park_next.store(true, Ordering::SeqCst);
    let forced = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.force_flush().await })
    };
    directory.parked.notified().await;

    runtime.submit(&submission(2, 2, "2")).await.unwrap();
    runtime.submit(&submission(1, 3, "3")).await.unwrap();
    assert_eq!(store.inner().get(MemberId(1)).await.unwrap().unwrap().correct_count, 100);

    directory.release.notify_one();
    assert_eq!(forced.await.unwrap(), FlushOutcome::Ran);

    // The stale read granted nothing; the new moves wait for their own pass.
    assert!(directory.inner.role_holders().reliable.is_empty());
    let health = runtime.health();
    assert_eq!(health.dirty_members, 2);
    assert!(health.flush_pending);
    assert_eq!(runtime.scheduler().passes_run(), 1);

    tokio::time::sleep(QUIET_DELAY + Duration::from_secs(1)).await;

    assert_eq!(runtime.scheduler().passes_run(), 2);
    assert!(directory
        .inner
        .role_holders()
        .reliable
        .contains(&MemberId(1)));
    let health = runtime.health();
    assert_eq!(health.dirty_members, 0);
    assert!(!health.flush_pending);
}

#[tokio::test(start_paused = true)]
async fn pass_that_cannot_read_the_directory_keeps_its_batch() {
    let (runtime, store, directory) = start().await;
    seed_correct(&store, 1, 99).await;
    runtime.submit(&submission(1, 1, "1")).await.unwrap();

    directory.fail_reads.store(true, Ordering::SeqCst);
    assert_eq!(runtime.force_flush().await, FlushOutcome::Ran);
    let health = runtime.health();
    assert!(health.last_pass.unwrap().aborted);
    assert_eq!(health.dirty_members, 1);
    assert!(!health.store_halted);

    directory.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(runtime.force_flush().await, FlushOutcome::Ran);
    assert!(directory
        .inner
        .role_holders()
        .reliable
        .contains(&MemberId(1)));
    assert_eq!(runtime.health().dirty_members, 0);
}
