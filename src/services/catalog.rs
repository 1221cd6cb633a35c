use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{ContentQuery, Repository, SortField, SortKey},
    error::{AppError, AppResult},
    models::{Content, ContentDetails, ContentInfo, ContentKind, SeasonMap},
    services::{
        navigator::{self, load_seasons},
        providers::{MetadataProvider, MetadataQuery, TitleMetadata},
        require_content,
    },
};

/// Items in the "more like this" row
pub const SIMILAR_LIMIT: u64 = 6;

/// Fields shared by new movies and shows
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TitleFields {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url(message = "posterUrl must be a URL"))]
    pub poster_url: Option<String>,
    #[validate(range(min = 1888, max = 2100, message = "releaseYear is out of range"))]
    pub release_year: Option<i32>,
    pub director: Option<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[validate(range(min = 0.0, max = 10.0, message = "imdbRating must be between 0 and 10"))]
    pub imdb_rating: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: TitleFields,
    #[validate(length(min = 1, message = "videoUrl is required"))]
    pub video_url: String,
    /// Filled from the metadata provider when absent
    #[validate(range(min = 1, max = 1000, message = "lengthMinutes is out of range"))]
    pub length_minutes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewShow {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: TitleFields,
}

/// A new episode; catalog fields are copied from the show
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEpisode {
    pub show_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "episodeTitle must be 1-200 characters"))]
    pub episode_title: String,
    #[validate(range(min = 1, message = "seasonNumber must be positive"))]
    pub season_number: u32,
    #[validate(range(min = 1, message = "episodeNumber must be positive"))]
    pub episode_number: u32,
    pub release_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 1000, message = "lengthMinutes is out of range"))]
    pub length_minutes: Option<u32>,
    #[validate(length(min = 1, message = "videoUrl is required"))]
    pub video_url: String,
    pub description: Option<String>,
    #[validate(url(message = "posterUrl must be a URL"))]
    pub poster_url: Option<String>,
}

/// Admin request body, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NewContent {
    Movie(NewMovie),
    Show(NewShow),
    Episode(NewEpisode),
}

impl NewContent {
    /// Trims the required text fields so whitespace-only values fail validation
    pub fn trimmed(self) -> Self {
        match self {
            NewContent::Movie(mut movie) => {
                movie.fields = movie.fields.trimmed();
                movie.video_url = movie.video_url.trim().to_string();
                NewContent::Movie(movie)
            }
            NewContent::Show(mut show) => {
                show.fields = show.fields.trimmed();
                NewContent::Show(show)
            }
            NewContent::Episode(mut episode) => {
                episode.episode_title = episode.episode_title.trim().to_string();
                episode.video_url = episode.video_url.trim().to_string();
                NewContent::Episode(episode)
            }
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            NewContent::Movie(movie) => movie.validate()?,
            NewContent::Show(show) => show.validate()?,
            NewContent::Episode(episode) => episode.validate()?,
        }
        Ok(())
    }
}

/// Trims entries and drops blanks and case-insensitive duplicates,
/// keeping the first spelling
pub fn normalize_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.to_lowercase()))
        .collect()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TitleFields {
    fn trimmed(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }

    fn into_info(self) -> ContentInfo {
        ContentInfo {
            title: self.title.trim().to_string(),
            description: blank_to_none(self.description),
            poster_url: blank_to_none(self.poster_url),
            release_year: self.release_year,
            director: blank_to_none(self.director),
            actors: normalize_list(self.actors),
            genres: normalize_list(self.genres),
            imdb_rating: self.imdb_rating,
        }
    }
}

/// Asks the provider for metadata; failures are logged and swallowed
async fn enrichment(
    metadata: Option<&dyn MetadataProvider>,
    query: MetadataQuery,
) -> Option<TitleMetadata> {
    let provider = metadata?;
    match provider.lookup(&query).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                title = %query.title,
                error = %e,
                "Metadata enrichment failed, continuing without it"
            );
            None
        }
    }
}

async fn ensure_unique_title(repo: &dyn Repository, kind: ContentKind, info: &ContentInfo) -> AppResult<()> {
    let query = ContentQuery {
        kind: Some(kind),
        title_equals: Some(info.title.clone()),
        release_year: info.release_year,
        ..ContentQuery::default()
    };
    if repo.count_content(&query).await? > 0 {
        return Err(AppError::InvalidInput(format!(
            "{} '{}' already exists",
            kind, info.title
        )));
    }
    Ok(())
}

/// Creates catalog content.
///
/// Missing runtime and rating are looked up when a provider is available.
/// Episodes are attached to their show in the same write.
pub async fn create_content(
    repo: &dyn Repository,
    metadata: Option<&dyn MetadataProvider>,
    request: NewContent,
) -> AppResult<Content> {
    let request = request.trimmed();
    request.validate()?;

    let content = match request {
        NewContent::Movie(movie) => create_movie(repo, metadata, movie).await?,
        NewContent::Show(show) => create_show(repo, metadata, show).await?,
        NewContent::Episode(episode) => create_episode(repo, metadata, episode).await?,
    };

    tracing::info!(
        content_id = %content.id,
        kind = %content.kind(),
        title = %content.title,
        "Content created"
    );
    Ok(content)
}

async fn create_movie(
    repo: &dyn Repository,
    metadata: Option<&dyn MetadataProvider>,
    movie: NewMovie,
) -> AppResult<Content> {
    let mut info = movie.fields.into_info();
    ensure_unique_title(repo, ContentKind::Movie, &info).await?;

    let mut length_minutes = movie.length_minutes;
    if length_minutes.is_none() || info.imdb_rating.is_none() {
        if let Some(found) =
            enrichment(metadata, MetadataQuery::title(&info.title, ContentKind::Movie)).await
        {
            length_minutes = length_minutes.or(found.runtime_minutes);
            info.imdb_rating = info.imdb_rating.or(found.imdb_rating);
        }
    }
    let length_minutes = length_minutes
        .ok_or_else(|| AppError::InvalidInput("lengthMinutes is required for a movie".to_string()))?;

    let movie = Content::new(
        info,
        ContentDetails::Movie {
            video_url: movie.video_url.trim().to_string(),
            length_minutes,
        },
    );
    repo.insert_content(&movie).await?;
    Ok(movie)
}

async fn create_show(
    repo: &dyn Repository,
    metadata: Option<&dyn MetadataProvider>,
    show: NewShow,
) -> AppResult<Content> {
    let mut info = show.fields.into_info();
    ensure_unique_title(repo, ContentKind::Show, &info).await?;

    if info.imdb_rating.is_none() {
        if let Some(found) =
            enrichment(metadata, MetadataQuery::title(&info.title, ContentKind::Show)).await
        {
            info.imdb_rating = found.imdb_rating;
        }
    }

    let show = Content::new(
        info,
        ContentDetails::Show {
            seasons: SeasonMap::new(),
        },
    );
    repo.insert_content(&show).await?;
    Ok(show)
}

async fn create_episode(
    repo: &dyn Repository,
    metadata: Option<&dyn MetadataProvider>,
    episode: NewEpisode,
) -> AppResult<Content> {
    let show = require_content(repo, episode.show_id).await?;
    let Some(seasons) = show.seasons() else {
        return Err(AppError::not_found("Show", episode.show_id));
    };

    let siblings = seasons
        .get(&episode.season_number)
        .cloned()
        .unwrap_or_default();
    let taken = repo
        .get_contents(&siblings)
        .await?
        .iter()
        .any(|sibling| {
            sibling
                .episode_slot()
                .is_some_and(|(_, number)| number == episode.episode_number)
        });
    if taken {
        return Err(AppError::InvalidInput(format!(
            "Season {} of '{}' already has an episode {}",
            episode.season_number, show.title, episode.episode_number
        )));
    }

    let mut length_minutes = episode.length_minutes;
    if length_minutes.is_none() {
        let query = MetadataQuery::episode(&show.title, episode.season_number, episode.episode_number);
        if let Some(found) = enrichment(metadata, query).await {
            length_minutes = found.runtime_minutes;
        }
    }

    let info = ContentInfo {
        title: show.title.clone(),
        description: blank_to_none(episode.description).or_else(|| show.description.clone()),
        poster_url: blank_to_none(episode.poster_url).or_else(|| show.poster_url.clone()),
        release_year: episode
            .release_date
            .map(|d| chrono::Datelike::year(&d))
            .or(show.release_year),
        director: show.director.clone(),
        actors: show.actors.clone(),
        genres: show.genres.clone(),
        imdb_rating: show.imdb_rating,
    };
    let new_episode = Content::new(
        info,
        ContentDetails::Episode {
            episode_title: episode.episode_title.trim().to_string(),
            season_number: episode.season_number,
            episode_number: episode.episode_number,
            release_date: episode.release_date,
            length_minutes,
            video_url: episode.video_url.trim().to_string(),
        },
    );

    repo.add_episode(show.id, &new_episode).await?;
    Ok(new_episode)
}

/// All movies and shows, most popular first
pub async fn list_catalog(repo: &dyn Repository) -> AppResult<Vec<Content>> {
    let query = ContentQuery::catalog().sorted_by(SortKey::desc(SortField::Popularity));
    repo.find_content(&query).await
}

/// Content detail page: the content, similar titles and the viewer's state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetail {
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasons: Option<BTreeMap<u32, Vec<Content>>>,
    pub similar_content: Vec<Content>,
    pub is_liked: bool,
    pub is_in_watchlist: bool,
    pub is_completed: bool,
    /// Content id → watched seconds
    pub watch_habits: BTreeMap<Uuid, u32>,
}

pub async fn content_detail(
    repo: &dyn Repository,
    content_id: Uuid,
    profile_id: Option<Uuid>,
) -> AppResult<ContentDetail> {
    let content = require_content(repo, content_id).await?;

    let seasons = match content.seasons() {
        Some(_) => Some(load_seasons(repo, &content).await?),
        None => None,
    };

    let similar_content = if content.genres.is_empty() {
        Vec::new()
    } else {
        let query = ContentQuery {
            genres_any: Some(content.genres.clone()),
            ..ContentQuery::catalog()
        }
        .excluding([content.id])
        .sorted_by(SortKey::desc(SortField::Popularity))
        .limit(SIMILAR_LIMIT);
        repo.find_content(&query).await?
    };

    let mut detail = ContentDetail {
        content,
        seasons,
        similar_content,
        is_liked: false,
        is_in_watchlist: false,
        is_completed: false,
        watch_habits: BTreeMap::new(),
    };

    let profile = match profile_id {
        Some(id) => repo.get_profile(id).await?,
        None => None,
    };
    let Some(profile) = profile else {
        return Ok(detail);
    };

    detail.is_liked = profile.has_liked(&detail.content.id);
    detail.is_in_watchlist = profile.has_in_watchlist(&detail.content.id);

    let (tracked, completion_id) = match detail.content.seasons() {
        Some(seasons) => (navigator::episode_ids(seasons), navigator::finale(seasons)),
        None => (vec![detail.content.id], Some(detail.content.id)),
    };
    let habits = repo.habits_for_contents(profile.id, &tracked).await?;

    detail.is_completed = completion_id.is_some_and(|id| {
        habits
            .iter()
            .any(|h| h.content_id == id && h.completed)
    });
    detail.watch_habits = habits
        .into_iter()
        .map(|h| (h.content_id, h.watched_time_in_seconds))
        .collect();

    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        repository::{ContentRepository, HabitRepository, ProfileRepository},
        MemoryStore,
    };
    use crate::models::{content::fixtures, Profile, ProgressUpdate};
    use crate::services::providers::MockMetadataProvider;
    use chrono::Utc;
    use serde_json::json;

    fn request(value: serde_json::Value) -> NewContent {
        serde_json::from_value(value).unwrap()
    }

    fn movie_request(title: &str) -> NewContent {
        request(json!({
            "type": "movie",
            "title": title,
            "releaseYear": 1995,
            "genres": [" Crime ", "crime", "", "Drama"],
            "actors": ["Al Pacino", "Al Pacino"],
            "videoUrl": "https://cdn.example.com/heat.mp4",
            "lengthMinutes": 170,
            "imdbRating": 8.3
        }))
    }

    async fn new_show(store: &MemoryStore) -> Content {
        let show = request(json!({"type": "show", "title": "Dark", "genres": ["Drama"], "imdbRating": 8.7}));
        create_content(store, None, show).await.unwrap()
    }

    fn episode_request(show: &Content, season: u32, number: u32) -> NewContent {
        request(json!({
            "type": "episode",
            "showId": show.id,
            "episodeTitle": format!("Episode {}", number),
            "seasonNumber": season,
            "episodeNumber": number,
            "lengthMinutes": 50,
            "videoUrl": "https://cdn.example.com/ep.mp4"
        }))
    }

    #[test]
    fn test_normalize_list() {
        let items = vec![" Drama".to_string(), "drama".to_string(), " ".to_string(), "Crime".to_string()];
        assert_eq!(normalize_list(items), vec!["Drama", "Crime"]);
    }

    #[tokio::test]
    async fn test_create_movie_normalizes_lists() {
        let store = MemoryStore::new();
        let movie = create_content(&store, None, movie_request("Heat")).await.unwrap();
        assert_eq!(movie.genres, vec!["Crime", "Drama"]);
        assert_eq!(movie.actors, vec!["Al Pacino"]);
        assert_eq!(movie.popularity, 0);
        assert!(store.get_content(movie.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_movie_rejected() {
        let store = MemoryStore::new();
        create_content(&store, None, movie_request("Heat")).await.unwrap();
        let err = create_content(&store, None, movie_request("HEAT")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_invalid_rating_rejected() {
        let store = MemoryStore::new();
        let bad = request(json!({
            "type": "show",
            "title": "Dark",
            "imdbRating": 11.0
        }));
        let err = create_content(&store, None, bad).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_movie_runtime_enriched_from_provider() {
        let store = MemoryStore::new();
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_lookup()
            .withf(|q| q.title == "Heat" && q.kind == Some(ContentKind::Movie))
            .times(1)
            .returning(|_| {
                Ok(Some(TitleMetadata {
                    title: "Heat".to_string(),
                    runtime_minutes: Some(170),
                    imdb_rating: Some(8.3),
                    ..TitleMetadata::default()
                }))
            });

        let body = request(json!({
            "type": "movie",
            "title": "Heat",
            "videoUrl": "https://cdn.example.com/heat.mp4"
        }));
        let movie = create_content(&store, Some(&provider), body).await.unwrap();
        assert_eq!(movie.length_seconds(), Some(170 * 60));
        assert_eq!(movie.imdb_rating, Some(8.3));
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_fatal() {
        let store = MemoryStore::new();
        let mut provider = MockMetadataProvider::new();
        provider
            .expect_lookup()
            .returning(|_| Err(AppError::ExternalApi("down".to_string())));
        provider.expect_name().return_const("mock");

        let show = request(json!({"type": "show", "title": "Dark"}));
        let show = create_content(&store, Some(&provider), show).await.unwrap();
        assert_eq!(show.imdb_rating, None);
    }

    #[tokio::test]
    async fn test_episode_copies_show_and_orders_season() {
        let store = MemoryStore::new();
        let show = new_show(&store).await;

        let second = create_content(&store, None, episode_request(&show, 1, 2)).await.unwrap();
        let first = create_content(&store, None, episode_request(&show, 1, 1)).await.unwrap();

        assert_eq!(first.genres, vec!["Drama"]);
        assert_eq!(first.imdb_rating, Some(8.7));
        assert_eq!(first.title, "Dark");

        let show = store.get_content(show.id).await.unwrap().unwrap();
        assert_eq!(show.seasons().unwrap()[&1], vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_blank_titles_rejected() {
        let store = MemoryStore::new();
        let blank_show = request(json!({"type": "show", "title": "   "}));
        let err = create_content(&store, None, blank_show).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let show = new_show(&store).await;
        let blank_episode = request(json!({
            "type": "episode",
            "showId": show.id,
            "episodeTitle": " \t ",
            "seasonNumber": 1,
            "episodeNumber": 1,
            "videoUrl": "https://cdn.example.com/ep.mp4"
        }));
        let err = create_content(&store, None, blank_episode).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let padded = create_content(&store, None, movie_request("  Heat  ")).await.unwrap();
        assert_eq!(padded.title, "Heat");
    }

    #[tokio::test]
    async fn test_duplicate_episode_number_rejected() {
        let store = MemoryStore::new();
        let show = new_show(&store).await;
        create_content(&store, None, episode_request(&show, 1, 1)).await.unwrap();
        let err = create_content(&store, None, episode_request(&show, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // same number in another season is fine
        create_content(&store, None, episode_request(&show, 2, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_episode_for_unknown_show() {
        let store = MemoryStore::new();
        let ghost = fixtures::show("Ghost", &[]);
        let err = create_content(&store, None, episode_request(&ghost, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_detail_for_show_tracks_finale() {
        let store = MemoryStore::new();
        let show = new_show(&store).await;
        let e1 = create_content(&store, None, episode_request(&show, 1, 1)).await.unwrap();
        let e2 = create_content(&store, None, episode_request(&show, 2, 1)).await.unwrap();
        let similar = create_content(
            &store,
            None,
            request(json!({"type": "show", "title": "Dark Matter", "genres": ["Drama"]})),
        )
        .await
        .unwrap();

        let profile = Profile::new(Uuid::new_v4(), "Main".to_string(), None);
        store.insert_profile(&profile).await.unwrap();
        store.add_to_watchlist(profile.id, show.id).await.unwrap();
        for (ep, seconds, done) in [(&e1, 3000, true), (&e2, 120, false)] {
            store
                .upsert_progress(
                    profile.id,
                    ep.id,
                    ProgressUpdate {
                        watched_time_in_seconds: seconds,
                        completed: done,
                        watched_at: Utc::now(),
                    },
                )
                .await
                .unwrap();
        }

        let detail = content_detail(&store, show.id, Some(profile.id)).await.unwrap();
        assert!(detail.is_in_watchlist);
        assert!(!detail.is_liked);
        assert!(!detail.is_completed);
        assert_eq!(detail.watch_habits.get(&e1.id), Some(&3000));
        assert_eq!(detail.watch_habits.get(&e2.id), Some(&120));
        let similar_ids: Vec<Uuid> = detail.similar_content.iter().map(|c| c.id).collect();
        assert_eq!(similar_ids, vec![similar.id]);
        assert_eq!(detail.seasons.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detail_without_profile() {
        let store = MemoryStore::new();
        let movie = create_content(&store, None, movie_request("Heat")).await.unwrap();
        let detail = content_detail(&store, movie.id, Some(Uuid::new_v4())).await.unwrap();
        assert!(!detail.is_liked);
        assert!(detail.watch_habits.is_empty());
        assert!(detail.seasons.is_none());
    }
}
