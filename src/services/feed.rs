use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{ContentQuery, Repository, SortField, SortKey},
    error::AppResult,
    models::{Content, Profile, WatchPolicy},
    services::require_profile,
};

/// Items per feed row
pub const FEED_ROW_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueWatchingEntry {
    pub content: Content,
    pub watched_time_in_seconds: u32,
    pub last_watched_at: DateTime<Utc>,
}

/// Home screen rows for one profile
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub continue_watching: Vec<ContinueWatchingEntry>,
    pub recommendations: Vec<Content>,
    pub most_popular: Vec<Content>,
    pub newest_by_genre: BTreeMap<String, Vec<Content>>,
}

/// Assembles the feed; the four rows are loaded concurrently and any
/// failing row fails the whole feed
pub async fn build_feed(
    repo: &dyn Repository,
    profile_id: Uuid,
    policy: &WatchPolicy,
) -> AppResult<Feed> {
    let profile = require_profile(repo, profile_id).await?;

    let (continue_watching, recommendations, most_popular, newest_by_genre) = tokio::try_join!(
        continue_watching(repo, profile_id, policy),
        recommendations(repo, &profile),
        most_popular(repo),
        repo.newest_by_genre(FEED_ROW_LIMIT),
    )?;

    tracing::info!(
        %profile_id,
        continue_watching = continue_watching.len(),
        recommendations = recommendations.len(),
        genres = newest_by_genre.len(),
        "Feed assembled"
    );

    Ok(Feed {
        continue_watching,
        recommendations,
        most_popular,
        newest_by_genre,
    })
}

/// Unfinished content with real progress, most recent first.
///
/// Progress past the policy's limit for the item counts as finished even
/// when the completed flag was never set.
pub async fn continue_watching(
    repo: &dyn Repository,
    profile_id: Uuid,
    policy: &WatchPolicy,
) -> AppResult<Vec<ContinueWatchingEntry>> {
    let habits = repo.in_progress_habits(profile_id).await?;
    let ids: Vec<Uuid> = habits.iter().map(|h| h.content_id).collect();
    let mut contents: HashMap<Uuid, Content> = repo
        .get_contents(&ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let entries = habits
        .into_iter()
        .filter_map(|habit| {
            let Some(content) = contents.remove(&habit.content_id) else {
                tracing::debug!(content_id = %habit.content_id, "Skipping habit for missing content");
                return None;
            };
            let limit = policy.continue_watching_limit(content.length_seconds());
            (habit.watched_time_in_seconds < limit).then(|| ContinueWatchingEntry {
                content,
                watched_time_in_seconds: habit.watched_time_in_seconds,
                last_watched_at: habit.last_watched_at,
            })
        })
        .collect();

    Ok(entries)
}

/// Content sharing a genre with what the profile liked and has not touched
/// yet, best rated first. Empty when nothing is liked.
pub async fn recommendations(repo: &dyn Repository, profile: &Profile) -> AppResult<Vec<Content>> {
    if profile.liked_contents.is_empty() {
        return Ok(Vec::new());
    }

    let liked = repo.get_contents(&profile.liked_contents).await?;
    let mut genres: Vec<String> = liked.iter().flat_map(|c| c.genres.iter().cloned()).collect();
    genres.sort();
    genres.dedup();
    if genres.is_empty() {
        return Ok(Vec::new());
    }

    let seen = repo.habits_for_profile(profile.id).await?;

    let query = ContentQuery {
        genres_any: Some(genres),
        ..ContentQuery::catalog()
    }
    .excluding(profile.liked_contents.iter().copied())
    .excluding(seen.iter().map(|h| h.content_id))
    .sorted_by(SortKey::desc(SortField::ImdbRating))
    .sorted_by(SortKey::desc(SortField::Popularity))
    .limit(u64::from(FEED_ROW_LIMIT));

    repo.find_content(&query).await
}

pub async fn most_popular(repo: &dyn Repository) -> AppResult<Vec<Content>> {
    let query = ContentQuery::catalog()
        .sorted_by(SortKey::desc(SortField::Popularity))
        .limit(u64::from(FEED_ROW_LIMIT));
    repo.find_content(&query).await
}
