use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use http::StatusCode;
use serde::Serialize;
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::*;
use crate::hub::prelude::{HubStats, serve_websocket};
use crate::leaderboard::LeaderboardEntry;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub hub: HubStats,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[instrument(skip(state))]
pub async fn checkhealth(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        hub: state.hub.stats().await,
    })
}

#[instrument(skip(state))]
pub async fn list_events(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Event>> {
    Ok(Json(state.events().list_active().await?))
}

#[instrument(skip(state))]
pub async fn event_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> JsonResult<Event> {
    match state.events().active_by_slug(&slug).await? {
        Some(event) => Ok(Json(event)),
        None => Err(RouteError::EventNotFound(slug)),
    }
}

#[instrument(skip(state))]
pub async fn event_groups(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> JsonResult<Vec<Group>> {
    match state.events().groups(&slug).await? {
        Some(groups) => Ok(Json(groups)),
        None => Err(RouteError::EventNotFound(slug)),
    }
}

#[instrument(skip(state))]
pub async fn event_games(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> JsonResult<Vec<Game>> {
    match state.events().games(&slug).await? {
        Some(games) => Ok(Json(games)),
        None => Err(RouteError::EventNotFound(slug)),
    }
}

#[instrument(skip(state))]
pub async fn event_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> JsonResult<Vec<LeaderboardEntry>> {
    match state.leaderboards().for_slug(&slug).await? {
        Some(leaderboard) => Ok(Json(leaderboard)),
        None => Err(RouteError::EventNotFound(slug)),
    }
}

#[instrument(skip(state))]
pub async fn event_scores(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> JsonResult<Vec<ScoreDetail>> {
    match state.scores().list_for_event(&slug).await? {
        Some((_, scores)) => Ok(Json(scores)),
        None => Err(RouteError::EventNotFound(slug)),
    }
}

/// Upgrades to a live notification stream for one event.
///
/// The slug is resolved before the upgrade so unknown events are refused with a plain 404.
#[instrument(skip(state, ws))]
pub async fn event_subscribe(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, RouteError> {
    let Some(event) = state.store.event_by_slug(&slug).await? else {
        return Err(RouteError::EventNotFound(slug));
    };

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| serve_websocket(hub, event.id, socket)))
}

#[instrument(skip(state, payload))]
pub async fn create_score(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<GameId>,
    payload: Result<Json<ScoreInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Score>), RouteError> {
    let Json(input) = payload?;
    let score = state
        .scores()
        .create(game_id, input, UserId::OPERATOR)
        .await?;

    Ok((StatusCode::CREATED, Json(score)))
}

#[instrument(skip(state, payload))]
pub async fn update_score(
    State(state): State<Arc<AppState>>,
    Path(score_id): Path<ScoreId>,
    payload: Result<Json<ScoreInput>, JsonRejection>,
) -> JsonResult<Score> {
    let Json(input) = payload?;
    let score = state.scores().update(score_id, input).await?;

    Ok(Json(score))
}

#[instrument(skip(state))]
pub async fn delete_score(
    State(state): State<Arc<AppState>>,
    Path(score_id): Path<ScoreId>,
) -> JsonResult<MessageResponse> {
    state.scores().delete(score_id).await?;

    Ok(Json(MessageResponse {
        message: "score deleted",
    }))
}
