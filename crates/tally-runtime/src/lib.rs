//! tally-runtime
//!
//! Runs one counting channel.
//!
//! - [`GameRuntime`] serializes submissions against the sequence state and
//!   commits each move durably before publishing its effects
//! - [`ReconcileScheduler`] debounces role reconciliation behind an in-flight
//!   counter and a single quiet-delay timer
//! - A pass persists the sequence state, applies role intents for the dirty
//!   batch through the [`RoleDirectory`], and clears the batch
//! - A failed durable write halts mutations (fail-closed) until the store
//!   answers a health probe

mod collab;
mod shared;
mod error;
mod game;
mod queries;
mod reconciler;
mod scheduler;

pub use collab::{NoticeSink, RoleDirectory, RoleError};
pub use shared::RuntimeOptions;
pub use error::RuntimeError;
pub use game::{spawn_store_probe, GameRuntime, RuntimeHealth, SubmitReport};
pub use queries::{calc, CalcResult, LeaderboardEntry, MemberStats, ServerStats, LEADERBOARD_SIZE};
pub use reconciler::PassReport;
pub use scheduler::{FlushOutcome, FlushTarget, InFlightGuard, ReconcileScheduler};
