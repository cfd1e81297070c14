//! One reconciliation pass: persist the sequence state, plan role changes
//! for the dirty batch, carry them out. The batch is taken at the start of
//! the pass; failures put members back.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_reconcile::{plan, ReconcileInput, RoleHolders};
use tally_schemas::{MemberId, RoleAction, RoleKind};
use tracing::Instrument;
use uuid::Uuid;

use crate::shared::Core;
use crate::{FlushTarget, RoleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub members_checked: usize,
    pub intents_applied: usize,
    pub intents_failed: usize,
    pub penalized_cleared: bool,
    /// The pass stopped early; the dirty batch is kept for the next one.
    pub aborted: bool,
}

impl PassReport {
    fn new(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            members_checked: 0,
            intents_applied: 0,
            intents_failed: 0,
            penalized_cleared: false,
            aborted: false,
        }
    }
}

pub(crate) struct RoleReconciler {
    pub(crate) core: Arc<Core>,
}

#[async_trait]
impl FlushTarget for RoleReconciler {
    async fn flush(&self) {
        let pass_id = Uuid::new_v4();
        let report = self
            .run(pass_id)
            .instrument(tracing::info_span!("reconcile_pass", %pass_id))
            .await;
        self.core.set_last_pass(report);
    }
}

impl RoleReconciler {
    async fn run(&self, pass_id: Uuid) -> PassReport {
        let core = &self.core;
        let mut report = PassReport::new(pass_id);

        if core.is_halted() {
            tracing::warn!("store halted; reconciliation deferred");
            report.aborted = true;
            return report;
        }

        // 1) Persist the sequence state
        let state = core.state.lock().await.clone();
        if let Err(e) = core.store.save_sequence(&state).await {
            core.halt(&e, "reconcile_persist");
            report.aborted = true;
            return report;
        }

        // 2) Gather inputs
        let batch = core.take_dirty();
        let records = match core.store.get_many(&batch).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "ledger read failed; pass aborted");
                core.restore_dirty(batch);
                report.aborted = true;
                return report;
            }
        };
        let (holders, presence) = match self.directory_view().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "role directory read failed; pass aborted");
                core.restore_dirty(batch);
                report.aborted = true;
                return report;
            }
        };
        report.members_checked = records.len();

        let p = plan(&ReconcileInput {
            dirty: &records,
            holders: &holders,
            penalized_member_id: state.penalized_member_id,
            presence: &presence,
            features: core.opts.roles,
        });

        // 3) Departed penalized member
        if p.clear_penalized {
            if let Some(id) = state.penalized_member_id {
                report.penalized_cleared |= self.clear_penalized(id).await;
            }
        }

        // 4) Role changes; failures never stop the pass
        let mut retry = BTreeSet::new();
        for intent in p.intents {
            match core.roles.apply(intent).await {
                Ok(()) => {
                    report.intents_applied += 1;
                    tracing::info!(
                        member_id = %intent.member_id,
                        role = intent.role_kind.as_str(),
                        action = ?intent.action,
                        "role intent applied"
                    );
                }
                Err(RoleError::MemberNotResolvable(id))
                    if intent.role_kind == RoleKind::Penalty
                        && intent.action == RoleAction::Grant =>
                {
                    report.intents_failed += 1;
                    report.penalized_cleared |= self.clear_penalized(id).await;
                }
                Err(RoleError::MemberNotResolvable(id)) => {
                    report.intents_failed += 1;
                    tracing::debug!(member_id = %id, "member left; role intent dropped");
                }
                Err(e) => {
                    report.intents_failed += 1;
                    retry.insert(intent.member_id);
                    tracing::warn!(
                        member_id = %intent.member_id,
                        role = intent.role_kind.as_str(),
                        error = %e,
                        "role intent failed; retried next pass"
                    );
                }
            }
        }

        // 5) Failed members go back for the next pass
        core.restore_dirty(retry);
        tracing::info!(
            members = report.members_checked,
            applied = report.intents_applied,
            failed = report.intents_failed,
            "reconcile pass complete"
        );
        report
    }

    async fn directory_view(&self) -> Result<(RoleHolders, tally_reconcile::Presence), RoleError> {
        let roles = &self.core.roles;
        let features = self.core.opts.roles;
        let reliable = if features.reliable {
            roles.holders(RoleKind::Reliable).await?
        } else {
            BTreeSet::new()
        };
        let penalty = if features.penalty {
            roles.holders(RoleKind::Penalty).await?
        } else {
            BTreeSet::new()
        };
        let presence = roles.presence().await?;
        Ok((RoleHolders { reliable, penalty }, presence))
    }

    /// Drop the designation if it still names `member_id`.
    async fn clear_penalized(&self, member_id: MemberId) -> bool {
        let res = self
            .core
            .persist_change("clear_penalized", |s| {
                if s.penalized_member_id != Some(member_id) {
                    return false;
                }
                tally_engine::clear_penalty(s);
                true
            })
            .await;
        match res {
            Ok(Some(_)) => {
                tracing::info!(%member_id, "penalized member not resolvable; designation cleared");
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(%member_id, error = %e, "could not clear penalized member");
                false
            }
        }
    }
}
