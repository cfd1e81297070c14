//! Axum router and all HTTP handlers for tally-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Scenario tests in `tests/` compose the bare router.

use std::{collections::BTreeSet, convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tally_engine::Notice;
use tally_reconcile::RoleHolders;
use tally_runtime::{calc, RuntimeError, SubmitReport, LEADERBOARD_SIZE};
use tally_schemas::{MemberId, Submission};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{
        CalcRequest, DeleteRequest, DirectorySyncRequest, DirectorySyncResponse, EditRequest,
        ErrorResponse, FlushResponse, HealthResponse, LeaderboardQuery, LeaderboardResponse,
        NoticeResponse, PruneResponse, ResetResponse, ResumeResponse, StatusResponse,
        SubmissionRequest, SubmissionResponse,
    },
    state::{AppState, BusMsg},
};

/// Upper bound for `GET /v1/leaderboard?limit=`.
const MAX_LEADERBOARD_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/events/submission", post(submission))
        .route("/v1/events/edit", post(edit))
        .route("/v1/events/delete", post(delete))
        .route("/v1/directory", put(directory_sync))
        .route("/v1/members/:id", get(member_stats))
        .route("/v1/leaderboard", get(leaderboard))
        .route("/v1/calc", post(calc_handler))
        .route("/v1/admin/flush", post(admin_flush))
        .route("/v1/admin/prune", post(admin_prune))
        .route("/v1/admin/resume", post(admin_resume))
        .route("/v1/admin/reset", post(admin_reset))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Store trouble is 503 so the bridge retries later; an unsynced directory
/// is 409 until `PUT /v1/directory` has run.
fn runtime_error(err: RuntimeError) -> Response {
    let status = match err {
        RuntimeError::StoreHalted | RuntimeError::Persistence(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RuntimeError::DirectoryUnknown => StatusCode::CONFLICT,
    };
    error_response(status, err.to_string())
}

// ---------------------------------------------------------------------------
// GET /v1/health  /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = StatusResponse {
        server: st.runtime.server_stats().await,
        runtime: st.runtime.health(),
        directory_synced: st.directory.is_synced(),
        directory_members: st.directory.member_count(),
    };
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/events/*
// ---------------------------------------------------------------------------

pub(crate) async fn submission(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SubmissionRequest>,
) -> Response {
    let sub = Submission {
        channel_id: req.channel_id,
        member_id: req.member_id,
        message_id: req.message_id,
        text: req.text,
        ts_utc: req.ts_utc.unwrap_or_else(Utc::now),
    };

    match st.runtime.submit(&sub).await {
        Ok(SubmitReport::Ignored) => Json(SubmissionResponse::Ignored).into_response(),
        Ok(SubmitReport::Rejected(err)) => Json(SubmissionResponse::Rejected {
            detail: err.to_string(),
        })
        .into_response(),
        Ok(SubmitReport::Applied {
            outcome,
            reaction,
            record,
        }) => Json(SubmissionResponse::Applied {
            outcome,
            reaction,
            record,
        })
        .into_response(),
        Err(e) => runtime_error(e),
    }
}

pub(crate) async fn edit(
    State(st): State<Arc<AppState>>,
    Json(req): Json<EditRequest>,
) -> Json<NoticeResponse> {
    if req.channel_id != st.runtime.channel_id() {
        return Json(NoticeResponse::from(None::<Notice>));
    }
    let notice = st
        .runtime
        .edit(req.member_id, req.message_id, &req.before, &req.after)
        .await;
    Json(notice.into())
}

pub(crate) async fn delete(
    State(st): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> Json<NoticeResponse> {
    if req.channel_id != st.runtime.channel_id() {
        return Json(NoticeResponse::from(None::<Notice>));
    }
    let notice = st
        .runtime
        .delete(req.member_id, &req.text, req.bot_reacted)
        .await;
    Json(notice.into())
}

// ---------------------------------------------------------------------------
// PUT /v1/directory
// ---------------------------------------------------------------------------

pub(crate) async fn directory_sync(
    State(st): State<Arc<AppState>>,
    Json(req): Json<DirectorySyncRequest>,
) -> Response {
    let present: BTreeSet<MemberId> = req.present.into_iter().collect();
    let members = present.len();
    let holders = RoleHolders {
        reliable: req.reliable.into_iter().collect(),
        penalty: req.penalty.into_iter().collect(),
    };
    st.directory.sync(present, holders);
    info!(members, "directory synced");

    match st.runtime.on_directory_synced().await {
        Ok(forgotten) => Json(DirectorySyncResponse {
            members,
            current_member_forgotten: forgotten,
        })
        .into_response(),
        Err(e) => runtime_error(e),
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub(crate) async fn member_stats(
    State(st): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Response {
    match st.runtime.member_stats(MemberId(id)).await {
        Ok(Some(stats)) => Json(stats).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("member {id} has no record")),
        Err(e) => runtime_error(e),
    }
}

pub(crate) async fn leaderboard(
    State(st): State<Arc<AppState>>,
    Query(q): Query<LeaderboardQuery>,
) -> Response {
    let limit = q
        .limit
        .unwrap_or(LEADERBOARD_SIZE)
        .min(MAX_LEADERBOARD_LIMIT);
    match st.runtime.leaderboard(limit).await {
        Ok(entries) => Json(LeaderboardResponse { entries }).into_response(),
        Err(e) => runtime_error(e),
    }
}

pub(crate) async fn calc_handler(Json(req): Json<CalcRequest>) -> impl IntoResponse {
    Json(calc(&req.text))
}

// ---------------------------------------------------------------------------
// POST /v1/admin/*
// ---------------------------------------------------------------------------

pub(crate) async fn admin_flush(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = st.runtime.force_flush().await;
    info!(?outcome, "admin/flush");
    Json(FlushResponse::new(
        outcome,
        st.runtime.scheduler().passes_run(),
    ))
}

pub(crate) async fn admin_prune(State(st): State<Arc<AppState>>) -> Response {
    match st.runtime.prune().await {
        Ok(removed) => Json(PruneResponse { removed }).into_response(),
        Err(e) => runtime_error(e),
    }
}

pub(crate) async fn admin_resume(State(st): State<Arc<AppState>>) -> Response {
    match st.runtime.check_store_health().await {
        Ok(()) => Json(ResumeResponse {
            store_halted: st.runtime.is_halted(),
        })
        .into_response(),
        Err(e) => runtime_error(e),
    }
}

pub(crate) async fn admin_reset(State(st): State<Arc<AppState>>) -> Response {
    match st.runtime.admin_reset().await {
        Ok(sequence) => Json(ResetResponse { sequence }).into_response(),
        Err(e) => runtime_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Notice { .. } => "notice",
                    BusMsg::Reaction { .. } => "reaction",
                    BusMsg::RoleIntent(_) => "role_intent",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
