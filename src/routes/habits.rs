use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    api::AppState,
    error::AppResult,
    models::parse_id,
    services::habits::{self, HabitWithContent, UserSummary},
};

pub async fn profile_habits(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> AppResult<Json<Vec<HabitWithContent>>> {
    let profile_id = parse_id("profileId", &profile_id)?;
    Ok(Json(habits::habits_with_content(state.repo(), profile_id).await?))
}

pub async fn user_habits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<HabitWithContent>>> {
    let user_id = parse_id("userId", &user_id)?;
    Ok(Json(habits::habits_for_user(state.repo(), user_id).await?))
}

pub async fn user_summary(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserSummary>> {
    let user_id = parse_id("userId", &user_id)?;
    Ok(Json(habits::user_summary(state.repo(), user_id).await?))
}
