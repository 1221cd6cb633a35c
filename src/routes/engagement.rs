use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    api::AppState,
    error::AppResult,
    models::parse_id,
    services::engagement::{self, LikeState, WatchlistState},
};

fn ids(profile_id: &str, content_id: &str) -> AppResult<(Uuid, Uuid)> {
    Ok((
        parse_id("profileId", profile_id)?,
        parse_id("contentId", content_id)?,
    ))
}

pub async fn like(
    State(state): State<AppState>,
    Path((profile_id, content_id)): Path<(String, String)>,
) -> AppResult<Json<LikeState>> {
    let (profile_id, content_id) = ids(&profile_id, &content_id)?;
    Ok(Json(engagement::like(state.repo(), profile_id, content_id).await?))
}

pub async fn unlike(
    State(state): State<AppState>,
    Path((profile_id, content_id)): Path<(String, String)>,
) -> AppResult<Json<LikeState>> {
    let (profile_id, content_id) = ids(&profile_id, &content_id)?;
    Ok(Json(engagement::unlike(state.repo(), profile_id, content_id).await?))
}

pub async fn add_to_watchlist(
    State(state): State<AppState>,
    Path((profile_id, content_id)): Path<(String, String)>,
) -> AppResult<Json<WatchlistState>> {
    let (profile_id, content_id) = ids(&profile_id, &content_id)?;
    let watchlist = engagement::add_to_watchlist(state.repo(), profile_id, content_id).await?;
    Ok(Json(watchlist))
}

pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Path((profile_id, content_id)): Path<(String, String)>,
) -> AppResult<Json<WatchlistState>> {
    let (profile_id, content_id) = ids(&profile_id, &content_id)?;
    let watchlist = engagement::remove_from_watchlist(state.repo(), profile_id, content_id).await?;
    Ok(Json(watchlist))
}
