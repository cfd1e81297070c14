//! Test doubles for the runtime's collaborators and a few builders.
//!
//! - [`RecordingSink`] keeps every notice and reaction
//! - [`FakeDirectory`] is an in-memory member directory with role holders
//! - [`FlakyStore`] wraps [`InMemoryStore`] and can be switched off

mod directory;
mod flaky;
mod sink;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tally_engine::Features;
use tally_ledger::InMemoryStore;
use tally_reconcile::RoleFeatures;
use tally_runtime::{GameRuntime, RuntimeError, RuntimeOptions};
use tally_schemas::{ChannelId, MemberId, MessageId, Submission};

pub use directory::FakeDirectory;
pub use flaky::FlakyStore;
pub use sink::{RecordingSink, SinkEvent};

pub const CHANNEL: ChannelId = ChannelId(4242);
pub const QUIET_DELAY: Duration = Duration::from_secs(5);

pub fn submission(member: u64, message: u64, text: &str) -> Submission {
    Submission {
        channel_id: CHANNEL,
        member_id: MemberId(member),
        message_id: MessageId(message),
        text: text.to_string(),
        ts_utc: Utc::now(),
    }
}

/// Options with every feature on.
pub fn options() -> RuntimeOptions {
    RuntimeOptions {
        channel_id: CHANNEL,
        features: Features {
            penalty_enabled: true,
        },
        roles: RoleFeatures::all(),
        quiet_delay: QUIET_DELAY,
    }
}

/// A runtime wired to fakes, plus handles to the fakes.
pub struct Harness {
    pub runtime: GameRuntime,
    pub store: Arc<FlakyStore>,
    pub sink: Arc<RecordingSink>,
    pub directory: Arc<FakeDirectory>,
    next_message: u64,
}

impl Harness {
    pub async fn start() -> Result<Self, RuntimeError> {
        Self::start_with(Arc::new(FlakyStore::new(Arc::new(InMemoryStore::new()))), options())
            .await
    }

    pub async fn start_with(
        store: Arc<FlakyStore>,
        opts: RuntimeOptions,
    ) -> Result<Self, RuntimeError> {
        let sink = Arc::new(RecordingSink::default());
        let directory = Arc::new(FakeDirectory::default());
        let runtime =
            GameRuntime::start(store.clone(), sink.clone(), directory.clone(), opts).await?;
        Ok(Self {
            runtime,
            store,
            sink,
            directory,
            next_message: 1,
        })
    }

    /// Submit `text` as `member` with a fresh message id.
    pub async fn say(
        &mut self,
        member: u64,
        text: &str,
    ) -> Result<tally_runtime::SubmitReport, RuntimeError> {
        let sub = submission(member, self.next_message, text);
        self.next_message += 1;
        self.runtime.submit(&sub).await
    }
}
