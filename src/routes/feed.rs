use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    api::AppState,
    error::AppResult,
    models::parse_id,
    services::feed::{self, Feed},
};

pub async fn get_feed(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> AppResult<Json<Feed>> {
    let profile_id = parse_id("profileId", &profile_id)?;
    let feed = feed::build_feed(state.repo(), profile_id, &state.settings.policy).await?;
    Ok(Json(feed))
}
