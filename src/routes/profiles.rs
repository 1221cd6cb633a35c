use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::AppState,
    error::AppResult,
    models::{parse_id, Profile},
    routes::AppJson,
    services::profiles::{self, NewProfile, ProfileChanges},
};

pub async fn create_profile(
    State(state): State<AppState>,
    AppJson(request): AppJson<NewProfile>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let profile = profiles::create_profile(state.repo(), request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn list_user_profiles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Profile>>> {
    let user_id = parse_id("userId", &user_id)?;
    Ok(Json(profiles::profiles_for_user(state.repo(), user_id).await?))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> AppResult<Json<Profile>> {
    let profile_id = parse_id("profileId", &profile_id)?;
    Ok(Json(profiles::get_profile(state.repo(), profile_id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    AppJson(changes): AppJson<ProfileChanges>,
) -> AppResult<Json<Profile>> {
    let profile_id = parse_id("profileId", &profile_id)?;
    let profile = profiles::update_profile(state.repo(), profile_id, changes).await?;
    Ok(Json(profile))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> AppResult<StatusCode> {
    let profile_id = parse_id("profileId", &profile_id)?;
    profiles::delete_profile(state.repo(), profile_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
