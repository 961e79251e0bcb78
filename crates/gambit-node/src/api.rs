//! HTTP API for the game node.

use crate::error::Error;
use crate::lifecycle::{unix_now, RoundScheduler};
use crate::models::{Lobby, Round, RoundScore, RoundStatus, Submission};
use crate::storage::Store;
use crate::ws::{ws_events_handler, EndReason, RoundEvent};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use gambit_scoring::{Action, ScoringParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for API handlers - store, event channel, scheduler.
pub struct AppState {
    /// Single shared store instance
    pub store: Arc<Store>,
    /// Round event fan-out
    pub events: broadcast::Sender<RoundEvent>,
    /// Lifecycle controller (admin end/rescore go through it)
    pub scheduler: Arc<RoundScheduler>,
}

/// Handler state alias.
pub type SharedState = Arc<AppState>;

/// JSON error body with a machine-readable reason.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: msg.into() }))
}

fn map_error(e: Error) -> ApiError {
    match e {
        Error::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        Error::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        Error::Rejected(reason) => api_error(StatusCode::BAD_REQUEST, reason.to_string()),
        Error::Scoring(e) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
    }
}

/// Build the API router.
pub fn build_router(state: SharedState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Lobbies
        .route("/api/v1/lobbies", get(list_lobbies))
        .route("/api/v1/lobbies", post(create_lobby))
        .route("/api/v1/lobbies/:id", get(get_lobby))
        .route("/api/v1/lobbies/:id/join", post(join_lobby))
        .route("/api/v1/lobbies/:id/rounds", get(get_lobby_rounds))
        .route("/api/v1/lobbies/:id/leaderboard", get(get_leaderboard))
        // Rounds
        .route("/api/v1/rounds", post(create_round))
        .route("/api/v1/rounds/:id", get(get_round))
        .route("/api/v1/rounds/:id/start", post(start_round))
        .route("/api/v1/rounds/:id/end", post(end_round))
        .route("/api/v1/rounds/:id/rescore", post(rescore_round))
        // Submissions
        .route("/api/v1/rounds/:id/submissions", get(list_submissions))
        .route("/api/v1/rounds/:id/submissions", post(submit))
        // Results
        .route("/api/v1/rounds/:id/results", get(get_results))
        // WebSocket for real-time round events
        .route("/api/v1/ws/events", get(ws_events_handler))
        .layer(cors)
        .with_state(state)
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "OK"
}

// --- Lobby endpoints ---

#[derive(Debug, Deserialize)]
struct CreateLobbyRequest {
    name: String,
}

async fn create_lobby(
    State(state): State<SharedState>,
    Json(req): Json<CreateLobbyRequest>,
) -> Result<(StatusCode, Json<Lobby>), ApiError> {
    let content = format!(
        "{}:{}",
        req.name,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis()
    );
    let id = Lobby::generate_id(content.as_bytes());

    let lobby = Lobby::new(id, req.name);
    state.store.put_lobby(&lobby).map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(lobby)))
}

async fn list_lobbies(
    State(state): State<SharedState>,
) -> Result<Json<Vec<Lobby>>, ApiError> {
    let lobbies = state.store.list_lobbies().map_err(map_error)?;
    Ok(Json(lobbies))
}

async fn get_lobby(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Lobby>, ApiError> {
    match state.store.get_lobby(&id).map_err(map_error)? {
        Some(lobby) => Ok(Json(lobby)),
        None => Err(api_error(StatusCode::NOT_FOUND, format!("lobby {id}"))),
    }
}

#[derive(Debug, Deserialize)]
struct JoinLobbyRequest {
    participant_id: String,
}

#[derive(Debug, Serialize)]
struct JoinLobbyResponse {
    joined: bool,
    member_count: usize,
}

async fn join_lobby(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<JoinLobbyRequest>,
) -> Result<Json<JoinLobbyResponse>, ApiError> {
    let joined = state
        .store
        .add_lobby_member(&id, req.participant_id)
        .map_err(map_error)?;
    let member_count = state.store.lobby_members(&id).map_err(map_error)?.len();
    Ok(Json(JoinLobbyResponse {
        joined,
        member_count,
    }))
}

async fn get_lobby_rounds(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RoundInfo>>, ApiError> {
    if state.store.get_lobby(&id).map_err(map_error)?.is_none() {
        return Err(api_error(StatusCode::NOT_FOUND, format!("lobby {id}")));
    }
    let rounds = state
        .store
        .list_rounds_for_lobby(&id)
        .map_err(map_error)?;
    Ok(Json(rounds.iter().map(RoundInfo::from).collect()))
}

/// One leaderboard row: cumulative totals across completed rounds.
#[derive(Debug, Serialize)]
struct LeaderboardEntry {
    participant_id: String,
    cumulative_score: f64,
    rounds_played: usize,
}

async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let members = state.store.lobby_members(&id).map_err(map_error)?;
    let rounds = state.store.list_rounds_for_lobby(&id).map_err(map_error)?;

    let mut entries: Vec<LeaderboardEntry> = members
        .into_iter()
        .map(|participant_id| LeaderboardEntry {
            participant_id,
            cumulative_score: 0.0,
            rounds_played: 0,
        })
        .collect();

    for round in rounds.iter().filter(|r| r.status == RoundStatus::Completed) {
        let scores = state.store.list_scores(&round.id).map_err(map_error)?;
        for score in scores {
            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.participant_id == score.participant_id)
            {
                entry.cumulative_score += score.total_score;
                entry.rounds_played += 1;
            }
        }
    }

    entries.sort_by(|a, b| {
        b.cumulative_score
            .partial_cmp(&a.cumulative_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(Json(entries))
}

// --- Round endpoints ---

#[derive(Debug, Deserialize)]
struct CreateRoundRequest {
    game_id: String,
    lobby_id: String,
    round_number: u32,
    question: String,
    correct_answer: String,
    duration_secs: u64,
    #[serde(default)]
    params: Option<ScoringParams>,
}

async fn create_round(
    State(state): State<SharedState>,
    Json(req): Json<CreateRoundRequest>,
) -> Result<(StatusCode, Json<RoundInfo>), ApiError> {
    let params = req.params.unwrap_or_default();
    params
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    if req.duration_secs == 0 {
        return Err(api_error(StatusCode::BAD_REQUEST, "duration must be positive"));
    }
    if state
        .store
        .get_lobby(&req.lobby_id)
        .map_err(map_error)?
        .is_none()
    {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("lobby {}", req.lobby_id),
        ));
    }

    let content = format!(
        "{}:{}:{}",
        req.lobby_id,
        req.round_number,
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis()
    );
    let round = Round::new(
        Round::generate_id(content.as_bytes()),
        req.game_id,
        req.lobby_id,
        req.round_number,
        req.question,
        req.correct_answer,
        req.duration_secs,
        params,
    );
    state.store.create_round(&round).map_err(map_error)?;
    Ok((StatusCode::CREATED, Json(RoundInfo::from(&round))))
}

/// Round view without the correct answer.
#[derive(Debug, Serialize)]
struct RoundInfo {
    id: String,
    game_id: String,
    lobby_id: String,
    round_number: u32,
    question: String,
    duration_secs: u64,
    status: RoundStatus,
    start_time: Option<u64>,
    end_time: Option<u64>,
}

impl From<&Round> for RoundInfo {
    fn from(round: &Round) -> Self {
        Self {
            id: round.id.clone(),
            game_id: round.game_id.clone(),
            lobby_id: round.lobby_id.clone(),
            round_number: round.round_number,
            question: round.question.clone(),
            duration_secs: round.duration_secs,
            status: round.status,
            start_time: round.start_time,
            end_time: round.end_time,
        }
    }
}

async fn get_round(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoundInfo>, ApiError> {
    match state.store.get_round(&id).map_err(map_error)? {
        Some(round) => Ok(Json(RoundInfo::from(&round))),
        None => Err(api_error(StatusCode::NOT_FOUND, format!("round {id}"))),
    }
}

async fn start_round(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoundInfo>, ApiError> {
    let round = state.store.start_round(&id, unix_now()).map_err(map_error)?;
    let _ = state.events.send(RoundEvent::RoundStarted {
        round_id: round.id.clone(),
        lobby_id: round.lobby_id.clone(),
        round_number: round.round_number,
        start_time: round.start_time.unwrap_or_default(),
        duration_secs: round.duration_secs,
    });
    Ok(Json(RoundInfo::from(&round)))
}

#[derive(Debug, Serialize)]
struct EndRoundResponse {
    round: RoundInfo,
    submission_count: usize,
}

/// Admin "end now": same CAS path as the expiry poller, so a race has
/// exactly one winner.
async fn end_round(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<EndRoundResponse>, ApiError> {
    let completed = state
        .scheduler
        .complete_round(&id, EndReason::AdminEnded, unix_now())
        .map_err(map_error)?;
    if !completed {
        return Err(api_error(StatusCode::BAD_REQUEST, "round is not active"));
    }

    let round = state
        .store
        .get_round(&id)
        .map_err(map_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("round {id}")))?;
    let submission_count = state.store.submission_count(&id).map_err(map_error)?;
    Ok(Json(EndRoundResponse {
        round: RoundInfo::from(&round),
        submission_count,
    }))
}

/// Explicit repair: re-run scoring for a completed round whose scores
/// never landed (or need recomputing - the engine is pure either way).
async fn rescore_round(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RoundScore>>, ApiError> {
    let round = state
        .store
        .get_round(&id)
        .map_err(map_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("round {id}")))?;
    if round.status != RoundStatus::Completed {
        return Err(api_error(StatusCode::BAD_REQUEST, "round is not completed"));
    }

    state
        .scheduler
        .score_completed_round(&round)
        .map_err(map_error)?;
    let _ = state.events.send(RoundEvent::ScoresRepaired {
        round_id: round.id.clone(),
    });

    let scores = state.store.list_scores(&id).map_err(map_error)?;
    Ok(Json(scores))
}

// --- Submission endpoints ---

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    participant_id: String,
    action: Action,
    answer: Option<String>,
    delegate_to: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    submission: Submission,
    submission_count: usize,
}

async fn submit(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submission = Submission::new(
        id.clone(),
        req.participant_id,
        req.action,
        req.answer,
        req.delegate_to,
        unix_now(),
    );
    state.store.put_submission(&submission).map_err(map_error)?;

    let submission_count = state.store.submission_count(&id).map_err(map_error)?;
    let _ = state.events.send(RoundEvent::SubmissionReceived {
        round_id: id,
        submission_count,
    });

    Ok(Json(SubmitResponse {
        submission,
        submission_count,
    }))
}

async fn list_submissions(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let submissions = state.store.list_submissions(&id).map_err(map_error)?;
    Ok(Json(submissions))
}

// --- Results endpoints ---

#[derive(Debug, Serialize)]
struct GraphNodeInfo {
    participant_id: String,
    action: Action,
    score: Option<f64>,
    in_cycle: Option<bool>,
    distance: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GraphEdge {
    from: String,
    to: String,
}

#[derive(Debug, Serialize)]
struct ResultsResponse {
    round: RoundInfo,
    /// Completed but scores absent: a retry is pending
    scoring_pending: bool,
    correct_answer: Option<String>,
    scores: Vec<RoundScore>,
    nodes: Vec<GraphNodeInfo>,
    edges: Vec<GraphEdge>,
}

async fn get_results(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let round = state
        .store
        .get_round(&id)
        .map_err(map_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("round {id}")))?;

    let submissions = state.store.list_submissions(&id).map_err(map_error)?;
    let scores = state.store.list_scores(&id).map_err(map_error)?;
    let completed = round.status == RoundStatus::Completed;
    let scoring_pending = completed && scores.is_empty();

    let nodes = submissions
        .iter()
        .map(|sub| {
            let score = scores
                .iter()
                .find(|s| s.participant_id == sub.participant_id);
            GraphNodeInfo {
                participant_id: sub.participant_id.clone(),
                action: sub.action,
                score: score.map(|s| s.total_score),
                in_cycle: score.map(|s| s.in_cycle),
                distance: score.and_then(|s| s.distance),
            }
        })
        .collect();

    let edges = submissions
        .iter()
        .filter_map(|sub| {
            sub.delegate_to.as_ref().map(|to| GraphEdge {
                from: sub.participant_id.clone(),
                to: to.clone(),
            })
        })
        .collect();

    Ok(Json(ResultsResponse {
        scoring_pending,
        // The answer stays hidden until the round is over.
        correct_answer: completed.then(|| round.correct_answer.clone()),
        round: RoundInfo::from(&round),
        scores,
        nodes,
        edges,
    }))
}
