//! Shared runtime state for tally-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The chat gateway bridge
//! sits on the other side of the bus: it posts events in, listens to the SSE
//! stream for notices, reactions and role intents, and keeps the directory
//! view current through `PUT /v1/directory`.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_config::TallyConfig;
use tally_engine::{Features, Notice, Reaction};
use tally_ledger::GameStore;
use tally_reconcile::{Presence, RoleFeatures, RoleHolders};
use tally_runtime::{GameRuntime, NoticeSink, RoleDirectory, RoleError, RuntimeError, RuntimeOptions};
use tally_schemas::{ChannelId, MemberId, MessageId, RoleIntent, RoleKind};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    Notice {
        channel_id: ChannelId,
        /// Rendered announcement text.
        text: String,
        notice: Notice,
    },
    Reaction {
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: Reaction,
        emoji: String,
    },
    RoleIntent(RoleIntent),
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Collaborators backed by the bus
// ---------------------------------------------------------------------------

/// Publishes notices and reactions for the gateway bridge.
pub struct BusNoticeSink {
    bus: broadcast::Sender<BusMsg>,
}

impl BusNoticeSink {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self { bus }
    }
}

impl NoticeSink for BusNoticeSink {
    fn notice(&self, channel_id: ChannelId, notice: &Notice) {
        let msg = BusMsg::Notice {
            channel_id,
            text: notice.to_string(),
            notice: notice.clone(),
        };
        if self.bus.send(msg).is_err() {
            tracing::debug!(%channel_id, "notice dropped; no bridge subscribed");
        }
    }

    fn react(&self, channel_id: ChannelId, message_id: MessageId, reaction: Reaction) {
        let _ = self.bus.send(BusMsg::Reaction {
            channel_id,
            message_id,
            reaction,
            emoji: reaction.emoji().to_string(),
        });
    }
}

#[derive(Debug, Default)]
struct DirectoryView {
    presence: Presence,
    holders: RoleHolders,
}

/// Directory view pushed by the gateway bridge.
///
/// Presence stays [`Presence::Unknown`] until the first sync. Role intents are
/// published on the bus; the local holder view is updated as soon as an
/// intent is handed off, and the next sync corrects it if delivery failed.
pub struct BridgeDirectory {
    bus: broadcast::Sender<BusMsg>,
    view: Mutex<DirectoryView>,
}

impl BridgeDirectory {
    pub fn new(bus: broadcast::Sender<BusMsg>) -> Self {
        Self {
            bus,
            view: Mutex::new(DirectoryView::default()),
        }
    }

    fn view(&self) -> MutexGuard<'_, DirectoryView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole view.
    pub fn sync(&self, present: BTreeSet<MemberId>, holders: RoleHolders) {
        let mut view = self.view();
        view.presence = Presence::Known(present);
        view.holders = holders;
    }

    pub fn is_synced(&self) -> bool {
        matches!(self.view().presence, Presence::Known(_))
    }

    pub fn member_count(&self) -> Option<usize> {
        match &self.view().presence {
            Presence::Known(ids) => Some(ids.len()),
            Presence::Unknown => None,
        }
    }
}

#[async_trait]
impl RoleDirectory for BridgeDirectory {
    async fn holders(&self, role_kind: RoleKind) -> Result<BTreeSet<MemberId>, RoleError> {
        Ok(self.view().holders.holders(role_kind).clone())
    }

    async fn presence(&self) -> Result<Presence, RoleError> {
        Ok(self.view().presence.clone())
    }

    async fn apply(&self, intent: RoleIntent) -> Result<(), RoleError> {
        let mut view = self.view();
        if !view.presence.contains(intent.member_id) {
            return Err(RoleError::MemberNotResolvable(intent.member_id));
        }
        self.bus
            .send(BusMsg::RoleIntent(intent))
            .map_err(|_| RoleError::Transport("no gateway bridge subscribed".to_string()))?;
        view.holders.apply(&intent);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared handle across all Axum handlers.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub runtime: Arc<GameRuntime>,
    pub directory: Arc<BridgeDirectory>,
}

impl AppState {
    /// Wire the bus-backed collaborators and start the game runtime.
    pub async fn start(
        store: Arc<dyn GameStore>,
        opts: RuntimeOptions,
    ) -> Result<Self, RuntimeError> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let sink = Arc::new(BusNoticeSink::new(bus.clone()));
        let directory = Arc::new(BridgeDirectory::new(bus.clone()));
        let runtime = GameRuntime::start(store, sink, directory.clone(), opts).await?;

        Ok(Self {
            bus,
            build: BuildInfo {
                service: "tally-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            runtime: Arc::new(runtime),
            directory,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Runtime options from the typed config. A role feature is on exactly when
/// its role id is configured.
pub fn runtime_options(cfg: &TallyConfig) -> RuntimeOptions {
    RuntimeOptions {
        channel_id: ChannelId(cfg.game.channel_id),
        features: Features {
            penalty_enabled: cfg.penalty_enabled(),
        },
        roles: RoleFeatures {
            reliable: cfg.reliable_enabled(),
            penalty: cfg.penalty_enabled(),
        },
        quiet_delay: Duration::from_millis(cfg.reconcile.quiet_delay_ms),
    }
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
