// HTTP bridge for the chat gateway: inbound messages, read-only game state,
// metrics, and the outbound announcement stream.

pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{FromRequestParts, Json, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bot::{Bot, MessageReport};
use crate::catch::CatchOutcome;
use crate::chat::{BroadcastSink, IncomingMessage};
use crate::metrics;
use crate::spawn::SpawnSlot;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<Bot>,
    pub sink: Arc<BroadcastSink>,
    pub bot_token: Arc<str>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": msg })))
}

// ── Gateway authentication ───────────────────────────────────────────

/// Requires `Authorization: Bearer <BOT_TOKEN>` on gateway-only routes.
pub struct GatewayAuth;

impl FromRequestParts<AppState> for GatewayAuth {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                json_error(StatusCode::UNAUTHORIZED, "Missing Authorization header")
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            json_error(
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header format",
            )
        })?;

        if token != &*state.bot_token {
            return Err(json_error(StatusCode::UNAUTHORIZED, "Invalid token"));
        }
        Ok(GatewayAuth)
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        // Gateway
        .route("/api/messages", post(post_message))
        .route("/ws/announcements", get(ws::ws_announcements))
        // Game state
        .route("/api/spawn", get(get_spawn))
        .route("/api/creatures", get(list_creatures))
        .route("/api/scores/{user_id}", get(get_user_scores))
        .route("/api/leaderboard", get(get_leaderboard))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "penguin-bot" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Gateway handlers ──────────────────────────────────────────────────

async fn post_message(
    _auth: GatewayAuth,
    State(state): State<AppState>,
    Json(msg): Json<IncomingMessage>,
) -> impl IntoResponse {
    if msg.channel_id.is_empty() || msg.author_id.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "author_id and channel_id are required",
        )
        .into_response();
    }
    metrics::INBOUND_MESSAGES_TOTAL.inc();
    state.sink.observe_channel(&msg.channel_id);

    let report = state.bot.handle_message(&msg, Instant::now());
    (StatusCode::OK, Json(report_json(&report))).into_response()
}

fn report_json(report: &MessageReport) -> Value {
    let command = report.command.map(|c| c.name());
    match &report.catch {
        CatchOutcome::Caught(c) => json!({
            "outcome": "caught",
            "command": command,
            "replies": report.replies,
            "catch": {
                "user_id": c.user_id,
                "creature": c.creature.name,
                "elapsed_seconds": c.elapsed.as_secs_f64(),
                "count": c.count,
                "saved": c.save_error.is_none(),
                "save_error": c.save_error,
            },
        }),
        CatchOutcome::Missed => json!({
            "outcome": "missed",
            "command": command,
            "replies": report.replies,
        }),
        CatchOutcome::NotAttempted => json!({
            "outcome": outcome_label(command),
            "command": command,
            "replies": report.replies,
        }),
    }
}

fn outcome_label(command: Option<&str>) -> &'static str {
    if command.is_some() {
        "command"
    } else {
        "ignored"
    }
}

// ── Game state handlers ───────────────────────────────────────────────

async fn get_spawn(State(state): State<AppState>) -> Json<Value> {
    let channel = state.bot.spawn_channel();
    let scheduler = state.bot.scheduler();
    let base = json!({
        "channel_id": channel,
        "scheduler_running": scheduler.is_running(),
        "interval_seconds": scheduler.interval().as_secs(),
    });
    let slot = match state.bot.spawn_state().peek() {
        SpawnSlot::Empty => json!({ "active": false }),
        SpawnSlot::Active {
            creature,
            activated_at,
        } => json!({
            "active": true,
            "creature": creature.name,
            "display_asset": creature.display_asset,
            "active_seconds": activated_at.elapsed().as_secs_f64(),
        }),
    };
    Json(json!({ "slot": slot, "spawner": base }))
}

async fn list_creatures(State(state): State<AppState>) -> Json<Value> {
    let creatures: Vec<_> = state.bot.registry().iter().map(|c| c.as_ref()).collect();
    Json(json!(creatures))
}

async fn get_user_scores(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let scores = state.bot.scores();
    let catches = scores.user_catches(&user_id);
    let total: u64 = catches.values().sum();
    Json(json!({
        "user_id": user_id,
        "total": total,
        "catches": catches,
    }))
}

#[derive(Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<usize>,
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Json<Value> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    Json(json!(state.bot.scores().leaderboard(limit)))
}
