use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_engine::{Intake, Notice, Outcome, Reaction};
use tally_expr::ValidationError;
use tally_ledger::{GameStore, StoreError};
use tally_reconcile::Presence;
use tally_schemas::{ChannelId, MemberId, MemberRecord, MessageId, SequenceState, Submission};
use tokio::task::JoinHandle;

use crate::shared::{Core, RuntimeOptions};
use crate::reconciler::{PassReport, RoleReconciler};
use crate::{FlushOutcome, NoticeSink, ReconcileScheduler, RoleDirectory, RuntimeError};

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitReport {
    /// Not a counting attempt, or another channel.
    Ignored,
    /// A counting attempt that could not be evaluated. The chain is intact.
    Rejected(ValidationError),
    Applied {
        outcome: Outcome,
        reaction: Reaction,
        record: MemberRecord,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeHealth {
    pub store_halted: bool,
    pub in_flight: usize,
    pub dirty_members: usize,
    pub flush_pending: bool,
    pub passes_run: u64,
    pub last_pass: Option<PassReport>,
}

/// Owner of one channel's game.
///
/// Submissions are processed one at a time. A move's ledger mutation and the
/// resulting sequence state are committed together before the in-memory
/// state changes; if that commit fails the runtime halts mutations until
/// [`GameRuntime::check_store_health`] succeeds.
pub struct GameRuntime {
    core: Arc<Core>,
    scheduler: ReconcileScheduler,
}

impl GameRuntime {
    /// Load the channel's state, start the reconciliation timer and announce
    /// that the game is online.
    pub async fn start(
        store: Arc<dyn GameStore>,
        notices: Arc<dyn NoticeSink>,
        roles: Arc<dyn RoleDirectory>,
        opts: RuntimeOptions,
    ) -> Result<Self, RuntimeError> {
        let channel_id = opts.channel_id;
        let state = load_state(store.as_ref(), channel_id).await?;
        let quiet_delay = opts.quiet_delay;

        let core = Arc::new(Core::new(store, notices, roles, opts, state.clone()));
        let scheduler = ReconcileScheduler::start(
            Arc::new(RoleReconciler {
                core: Arc::clone(&core),
            }),
            quiet_delay,
        );

        tracing::info!(
            %channel_id,
            count = state.current_count,
            high_score = state.high_score,
            "game runtime online"
        );
        core.notices
            .notice(channel_id, &tally_engine::online_notice(&state));

        Ok(Self { core, scheduler })
    }

    pub fn channel_id(&self) -> ChannelId {
        self.core.opts.channel_id
    }

    pub fn scheduler(&self) -> &ReconcileScheduler {
        &self.scheduler
    }

    pub fn is_halted(&self) -> bool {
        self.core.is_halted()
    }

    pub async fn sequence(&self) -> SequenceState {
        self.core.state.lock().await.clone()
    }

    pub(crate) fn core(&self) -> &Core {
        &self.core
    }

    // -----------------------------------------------------------------------
    // Event source
    // -----------------------------------------------------------------------

    pub async fn submit(&self, sub: &Submission) -> Result<SubmitReport, RuntimeError> {
        if sub.channel_id != self.channel_id() {
            return Ok(SubmitReport::Ignored);
        }
        let _guard = self.scheduler.begin();

        let evaluation = match tally_engine::intake(&sub.text) {
            Intake::Ignore => return Ok(SubmitReport::Ignored),
            Intake::Rejected(err) => {
                self.reject(sub, &err);
                return Ok(SubmitReport::Rejected(err));
            }
            Intake::Move(evaluation) => evaluation,
        };

        if self.core.is_halted() {
            return Err(RuntimeError::StoreHalted);
        }

        let core = &self.core;
        let mut state = core.state.lock().await;
        // The move ahead of us may have failed its commit while we waited.
        if core.is_halted() {
            return Err(RuntimeError::StoreHalted);
        }

        let record = match core.store.upsert_new(sub.member_id).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e, "upsert_member")),
        };

        let mut next = state.clone();
        let transition =
            tally_engine::apply_move(&mut next, &record, evaluation, &core.opts.features);

        let record = match core.store.commit_move(&next, &transition.mutation).await {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e, "commit_move")),
        };
        *state = next;
        drop(state);

        core.mark_dirty(sub.member_id);
        self.scheduler.notify_activity();

        match transition.outcome {
            Outcome::Accepted { count } => tracing::debug!(
                member_id = %sub.member_id,
                count,
                "count accepted"
            ),
            Outcome::Broken(kind) => tracing::info!(
                member_id = %sub.member_id,
                ?kind,
                "count broken"
            ),
        }
        if transition.penalty_lifted {
            tracing::info!(member_id = %sub.member_id, "penalty redeemed");
        }

        // Committed; now tell the outside world.
        core.notices
            .react(sub.channel_id, sub.message_id, transition.reaction);
        if let Some(notice) = &transition.notice {
            core.notices.notice(sub.channel_id, notice);
        }

        Ok(SubmitReport::Applied {
            outcome: transition.outcome,
            reaction: transition.reaction,
            record,
        })
    }

    fn reject(&self, sub: &Submission, err: &ValidationError) {
        tracing::debug!(member_id = %sub.member_id, error = %err, "submission rejected");
        let notices = &self.core.notices;
        notices.react(sub.channel_id, sub.message_id, Reaction::Warning);
        notices.notice(
            sub.channel_id,
            &Notice::SyntaxError {
                member_id: sub.member_id,
                message_id: sub.message_id,
                detail: err.to_string(),
            },
        );
    }

    fn fail(&self, err: StoreError, during: &'static str) -> RuntimeError {
        self.core.halt(&err, during);
        RuntimeError::Persistence(err)
    }

    /// Warn about an edited counting message. No state change.
    pub async fn edit(
        &self,
        member_id: MemberId,
        message_id: MessageId,
        before: &str,
        after: &str,
    ) -> Option<Notice> {
        let state = self.sequence().await;
        let notice = tally_engine::edit_notice(&state, member_id, message_id, before, after)?;
        self.core.notices.notice(self.channel_id(), &notice);
        Some(notice)
    }

    /// Warn about a deleted counting message. No state change.
    pub async fn delete(
        &self,
        member_id: MemberId,
        text: &str,
        bot_reacted: bool,
    ) -> Option<Notice> {
        let state = self.sequence().await;
        let notice = tally_engine::deletion_notice(&state, member_id, text, bot_reacted)?;
        self.core.notices.notice(self.channel_id(), &notice);
        Some(notice)
    }

    // -----------------------------------------------------------------------
    // Directory and administration
    // -----------------------------------------------------------------------

    /// The member directory changed. Forget a departed current member and
    /// schedule a pass so penalty status catches up.
    pub async fn on_directory_synced(&self) -> Result<bool, RuntimeError> {
        let presence = self.core.roles.presence().await.map_err(|e| {
            tracing::warn!(error = %e, "directory read failed");
            RuntimeError::DirectoryUnknown
        })?;
        let Presence::Known(present) = presence else {
            return Ok(false);
        };

        let changed = self
            .core
            .persist_change("forget_current_member", |s| match s.current_member_id {
                Some(id) if !present.contains(&id) => tally_engine::forget_current_member(s),
                _ => false,
            })
            .await?
            .is_some();
        if changed {
            tracing::info!("current member left; reference cleared");
        }
        self.scheduler.notify_activity();
        Ok(changed)
    }

    /// Reset the sequence and the high score.
    pub async fn admin_reset(&self) -> Result<SequenceState, RuntimeError> {
        let next = self
            .core
            .persist_change("admin_reset", |s| {
                tally_engine::admin_reset(s);
                true
            })
            .await?
            .unwrap_or_else(|| SequenceState::new(self.channel_id()));
        tracing::warn!(channel_id = %self.channel_id(), "sequence reset by administrator");
        Ok(next)
    }

    /// Remove ledger records of members no longer in the space.
    pub async fn prune(&self) -> Result<u64, RuntimeError> {
        if self.core.is_halted() {
            return Err(RuntimeError::StoreHalted);
        }
        let presence = self
            .core
            .roles
            .presence()
            .await
            .map_err(|_| RuntimeError::DirectoryUnknown)?;
        let Presence::Known(active) = presence else {
            return Err(RuntimeError::DirectoryUnknown);
        };
        let removed = self.core.store.prune(&active).await?;
        tracing::info!(removed, "ledger pruned");
        Ok(removed)
    }

    pub async fn force_flush(&self) -> FlushOutcome {
        self.scheduler.force_flush().await
    }

    /// Probe the store. On success reload the sequence state from it and
    /// resume mutations.
    pub async fn check_store_health(&self) -> Result<(), RuntimeError> {
        let core = &self.core;
        core.store.ping().await?;
        let mut state = core.state.lock().await;
        let fresh = load_state(core.store.as_ref(), self.channel_id()).await?;
        *state = fresh;
        drop(state);
        if core.resume() {
            tracing::info!("store healthy again; mutations resumed");
        }
        Ok(())
    }

    pub fn health(&self) -> RuntimeHealth {
        RuntimeHealth {
            store_halted: self.core.is_halted(),
            in_flight: self.scheduler.in_flight(),
            dirty_members: self.core.dirty_len(),
            flush_pending: self.scheduler.is_pending(),
            passes_run: self.scheduler.passes_run(),
            last_pass: self.core.last_pass(),
        }
    }
}

async fn load_state(
    store: &dyn GameStore,
    channel_id: ChannelId,
) -> Result<SequenceState, RuntimeError> {
    let state = store
        .load_sequence(channel_id)
        .await?
        .unwrap_or_else(|| SequenceState::new(channel_id));
    if !state.is_consistent() {
        return Err(RuntimeError::Persistence(StoreError::Corrupt(format!(
            "sequence state for channel {channel_id} violates its invariants"
        ))));
    }
    Ok(state)
}

/// Probe the store every `interval` while the runtime is halted.
pub fn spawn_store_probe(runtime: Arc<GameRuntime>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if !runtime.is_halted() {
                continue;
            }
            if let Err(e) = runtime.check_store_health().await {
                tracing::warn!(error = %e, "store still unavailable");
            }
        }
    })
}
