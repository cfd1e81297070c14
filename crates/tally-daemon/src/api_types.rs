//! Request and response types for all tally-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No game logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_engine::{Notice, Outcome, Reaction};
use tally_runtime::{FlushOutcome, LeaderboardEntry, RuntimeHealth, ServerStats};
use tally_schemas::{ChannelId, MemberId, MemberRecord, MessageId, SequenceState};

// ---------------------------------------------------------------------------
// /v1/health  /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub server: ServerStats,
    pub runtime: RuntimeHealth,
    pub directory_synced: bool,
    pub directory_members: Option<usize>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Event source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub channel_id: ChannelId,
    pub member_id: MemberId,
    pub message_id: MessageId,
    pub text: String,
    /// Defaults to the time of receipt.
    #[serde(default)]
    pub ts_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmissionResponse {
    Ignored,
    Rejected {
        detail: String,
    },
    Applied {
        outcome: Outcome,
        reaction: Reaction,
        record: MemberRecord,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub channel_id: ChannelId,
    pub member_id: MemberId,
    pub message_id: MessageId,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub channel_id: ChannelId,
    pub member_id: MemberId,
    pub text: String,
    /// Whether the deleted message carried a marker from the game.
    pub bot_reacted: bool,
}

/// Warning produced by an edit or delete event, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeResponse {
    pub notice: Option<Notice>,
    pub text: Option<String>,
}

impl From<Option<Notice>> for NoticeResponse {
    fn from(notice: Option<Notice>) -> Self {
        let text = notice.as_ref().map(ToString::to_string);
        Self { notice, text }
    }
}

// ---------------------------------------------------------------------------
// /v1/directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySyncRequest {
    pub present: Vec<MemberId>,
    #[serde(default)]
    pub reliable: Vec<MemberId>,
    #[serde(default)]
    pub penalty: Vec<MemberId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySyncResponse {
    pub members: usize,
    /// The poster of the current count has left and was forgotten.
    pub current_member_forgotten: bool,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcRequest {
    pub text: String,
}

// ---------------------------------------------------------------------------
// /v1/admin/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushResponse {
    /// "ran" | "busy" | "nothing_pending"
    pub outcome: String,
    pub passes_run: u64,
}

impl FlushResponse {
    pub fn new(outcome: FlushOutcome, passes_run: u64) -> Self {
        let outcome = match outcome {
            FlushOutcome::Ran => "ran",
            FlushOutcome::Busy => "busy",
            FlushOutcome::NothingPending => "nothing_pending",
        };
        Self {
            outcome: outcome.to_string(),
            passes_run,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneResponse {
    pub removed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeResponse {
    pub store_halted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub sequence: SequenceState,
}
