use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    api::AppState,
    error::AppResult,
    services::genres::{self, BrowseOptions, BrowseParams, GenrePage},
};

pub async fn list_genres(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let genres = genres::list_genres(state.repo(), state.cache.as_ref()).await?;
    Ok(Json(genres))
}

pub async fn browse_genre(
    State(state): State<AppState>,
    Path(genre): Path<String>,
    Query(params): Query<BrowseParams>,
) -> AppResult<Json<GenrePage>> {
    let options = BrowseOptions::parse(&params)?;
    let page = genres::browse(
        state.repo(),
        &genre,
        &options,
        state.settings.genre_page_limit,
    )
    .await?;
    Ok(Json(page))
}
