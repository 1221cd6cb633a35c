use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    cached,
    db::{Cache, CacheKey, ContentQuery, Repository, SortField, SortKey, SortOrder},
    error::{AppError, AppResult},
    models::{parse_optional_id, Content, Pagination},
    services::require_profile,
};

const GENRES_CACHE_TTL: u64 = 300; // 5 minutes

/// Restricts a genre page by the profile's completed content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchFilter {
    #[default]
    All,
    Watched,
    Unwatched,
}

impl FromStr for WatchFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(WatchFilter::All),
            "watched" => Ok(WatchFilter::Watched),
            "unwatched" => Ok(WatchFilter::Unwatched),
            other => Err(AppError::InvalidInput(format!(
                "filterWatched must be all, watched or unwatched (got '{}')",
                other
            ))),
        }
    }
}

/// Raw query string of the genre page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseParams {
    pub page: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub filter_watched: Option<String>,
    pub profile_id: Option<String>,
}

/// Validated genre page request
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseOptions {
    pub page: u32,
    pub sort: SortKey,
    pub filter: WatchFilter,
    pub profile_id: Option<Uuid>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl BrowseOptions {
    pub fn parse(params: &BrowseParams) -> AppResult<Self> {
        let page = match present(&params.page) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(page) if page >= 1 => page,
                _ => {
                    return Err(AppError::InvalidInput(format!(
                        "page must be a positive integer (got '{}')",
                        raw
                    )))
                }
            },
        };

        let field = present(&params.sort_by)
            .map(SortField::from_str)
            .transpose()?
            .unwrap_or(SortField::Popularity);
        let order = present(&params.sort_order)
            .map(SortOrder::from_str)
            .transpose()?
            .unwrap_or(SortOrder::Desc);
        let filter = present(&params.filter_watched)
            .map(WatchFilter::from_str)
            .transpose()?
            .unwrap_or_default();
        let profile_id = parse_optional_id("profileId", params.profile_id.as_deref())?;

        if filter != WatchFilter::All && profile_id.is_none() {
            return Err(AppError::InvalidInput(
                "profileId is required when filtering by watch state".to_string(),
            ));
        }

        Ok(Self {
            page,
            sort: SortKey { field, order },
            filter,
            profile_id,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenrePage {
    pub content: Vec<Content>,
    pub pagination: Pagination,
}

/// Distinct genres of the catalog, read through the cache when one is configured
pub async fn list_genres(repo: &dyn Repository, cache: Option<&Cache>) -> AppResult<Vec<String>> {
    match cache {
        Some(cache) => cached!(cache, CacheKey::Genres, GENRES_CACHE_TTL, repo.distinct_genres()),
        None => repo.distinct_genres().await,
    }
}

/// One page of non-episode content whose genres contain `genre`
pub async fn browse(
    repo: &dyn Repository,
    genre: &str,
    options: &BrowseOptions,
    limit: u32,
) -> AppResult<GenrePage> {
    let genre = genre.trim();
    if genre.is_empty() {
        return Err(AppError::InvalidInput("genre must not be empty".to_string()));
    }

    let mut query = ContentQuery {
        genre_contains: Some(genre.to_string()),
        ..ContentQuery::catalog()
    }
    .sorted_by(options.sort);

    if let (WatchFilter::Watched | WatchFilter::Unwatched, Some(profile_id)) =
        (options.filter, options.profile_id)
    {
        require_profile(repo, profile_id).await?;
        let completed = repo.completed_content_ids(profile_id).await?;
        match options.filter {
            WatchFilter::Watched => query.ids = Some(completed),
            _ => query = query.excluding(completed),
        }
    }

    let total_count = repo.count_content(&query).await?;
    let content = repo
        .find_content(&query.window(Pagination::offset(options.page, limit), u64::from(limit)))
        .await?;

    tracing::debug!(
        genre,
        page = options.page,
        total_count,
        returned = content.len(),
        "Genre page loaded"
    );

    Ok(GenrePage {
        content,
        pagination: Pagination::new(options.page, limit, total_count),
    })
}
