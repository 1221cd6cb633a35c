use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{
    api::AppState,
    error::{AppError, AppResult},
    models::{parse_id, parse_optional_id, Content},
    routes::AppJson,
    services::{
        catalog::{self, ContentDetail, NewContent},
        providers::{MetadataQuery, TitleMetadata},
        require_content,
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailQuery {
    profile_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    title: Option<String>,
    season: Option<String>,
    episode: Option<String>,
}

fn parse_number(field: &str, raw: Option<&str>) -> AppResult<Option<u32>> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(AppError::InvalidInput(format!(
                "{} must be a positive integer (got '{}')",
                field, value
            ))),
        },
    }
}

pub async fn get_content_detail(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    Query(query): Query<DetailQuery>,
) -> AppResult<Json<ContentDetail>> {
    let content_id = parse_id("contentId", &content_id)?;
    let profile_id = parse_optional_id("profileId", query.profile_id.as_deref())?;

    let detail = catalog::content_detail(state.repo(), content_id, profile_id).await?;
    Ok(Json(detail))
}

pub async fn create_content(
    State(state): State<AppState>,
    AppJson(request): AppJson<NewContent>,
) -> AppResult<(StatusCode, Json<Content>)> {
    let content =
        catalog::create_content(state.repo(), state.metadata.as_deref(), request).await?;
    Ok((StatusCode::CREATED, Json(content)))
}

pub async fn list_content(State(state): State<AppState>) -> AppResult<Json<Vec<Content>>> {
    Ok(Json(catalog::list_catalog(state.repo()).await?))
}

pub async fn get_content(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> AppResult<Json<Content>> {
    let content_id = parse_id("contentId", &content_id)?;
    Ok(Json(require_content(state.repo(), content_id).await?))
}

pub async fn lookup_metadata(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<TitleMetadata>> {
    let Some(provider) = state.metadata.as_deref() else {
        return Err(AppError::Unavailable(
            "No metadata provider is configured".to_string(),
        ));
    };

    let title = query
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::InvalidInput("title is required".to_string()))?;
    let season = parse_number("season", query.season.as_deref())?;
    let episode = parse_number("episode", query.episode.as_deref())?;

    let lookup = MetadataQuery {
        title: title.to_string(),
        kind: None,
        season,
        episode,
    };

    provider
        .lookup(&lookup)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No metadata found for '{}'", title)))
}
