use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    api::AppState,
    error::AppResult,
    models::{parse_id, parse_optional_id, Habit},
    routes::AppJson,
    services::player::{self, PlayerData, ProgressRequest},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuery {
    show_id: Option<String>,
}

pub async fn get_player_data(
    State(state): State<AppState>,
    Path((content_id, profile_id)): Path<(String, String)>,
    Query(query): Query<PlayerQuery>,
) -> AppResult<Json<PlayerData>> {
    let content_id = parse_id("contentId", &content_id)?;
    let profile_id = parse_id("profileId", &profile_id)?;
    let show_id = parse_optional_id("showId", query.show_id.as_deref())?;

    let data = player::player_data(state.repo(), content_id, profile_id, show_id).await?;
    Ok(Json(data))
}

pub async fn save_progress(
    State(state): State<AppState>,
    AppJson(request): AppJson<ProgressRequest>,
) -> AppResult<Json<Habit>> {
    let habit = player::save_progress(state.repo(), &state.settings.policy, &request).await?;
    Ok(Json(habit))
}

pub async fn get_next_episode(
    State(state): State<AppState>,
    Path((show_id, profile_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let show_id = parse_id("showId", &show_id)?;
    let profile_id = parse_id("profileId", &profile_id)?;

    let episode_id = player::next_episode(state.repo(), show_id, profile_id).await?;
    Ok(Json(json!({ "episodeId": episode_id })))
}
