//! Likes and the watchlist.
//!
//! Membership changes are single atomic store operations, and the popularity
//! counter only moves when membership actually changed.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Repository,
    error::AppResult,
    services::{require_content, require_profile},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub success: bool,
    pub liked: bool,
    pub content_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistState {
    pub success: bool,
    pub in_watchlist: bool,
    pub content_id: Uuid,
}

pub async fn like(repo: &dyn Repository, profile_id: Uuid, content_id: Uuid) -> AppResult<LikeState> {
    let profile = require_profile(repo, profile_id).await?;
    let content = require_content(repo, content_id).await?;

    if repo.add_liked(profile.id, content.id).await? {
        repo.adjust_popularity(content.id, 1).await?;
        tracing::debug!(%profile_id, %content_id, "Content liked");
    }
    repo.set_liked(profile.id, content.id, true, true).await?;

    Ok(LikeState {
        success: true,
        liked: true,
        content_id,
    })
}

pub async fn unlike(repo: &dyn Repository, profile_id: Uuid, content_id: Uuid) -> AppResult<LikeState> {
    let profile = require_profile(repo, profile_id).await?;

    if repo.remove_liked(profile.id, content_id).await? {
        repo.adjust_popularity(content_id, -1).await?;
        tracing::debug!(%profile_id, %content_id, "Content unliked");
    }
    repo.set_liked(profile.id, content_id, false, false).await?;

    Ok(LikeState {
        success: true,
        liked: false,
        content_id,
    })
}

pub async fn add_to_watchlist(
    repo: &dyn Repository,
    profile_id: Uuid,
    content_id: Uuid,
) -> AppResult<WatchlistState> {
    let profile = require_profile(repo, profile_id).await?;
    let content = require_content(repo, content_id).await?;
    repo.add_to_watchlist(profile.id, content.id).await?;

    Ok(WatchlistState {
        success: true,
        in_watchlist: true,
        content_id,
    })
}

pub async fn remove_from_watchlist(
    repo: &dyn Repository,
    profile_id: Uuid,
    content_id: Uuid,
) -> AppResult<WatchlistState> {
    let profile = require_profile(repo, profile_id).await?;
    repo.remove_from_watchlist(profile.id, content_id).await?;

    Ok(WatchlistState {
        success: true,
        in_watchlist: false,
        content_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        repository::{ContentRepository, HabitRepository, ProfileRepository},
        MemoryStore,
    };
    use crate::error::AppError;
    use crate::models::{content::fixtures::movie, Profile};

    async fn setup() -> (MemoryStore, Profile, Uuid) {
        let store = MemoryStore::new();
        let profile = Profile::new(Uuid::new_v4(), "Main".to_string(), None);
        store.insert_profile(&profile).await.unwrap();
        let movie = movie("Heat", &["Crime"]);
        store.insert_content(&movie).await.unwrap();
        (store, profile, movie.id)
    }

    async fn popularity(store: &MemoryStore, id: Uuid) -> i64 {
        store.get_content(id).await.unwrap().unwrap().popularity
    }

    #[tokio::test]
    async fn test_like_twice_counts_once() {
        let (store, profile, content_id) = setup().await;
        like(&store, profile.id, content_id).await.unwrap();
        like(&store, profile.id, content_id).await.unwrap();

        assert_eq!(popularity(&store, content_id).await, 1);
        let profile = store.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!(profile.liked_contents, vec![content_id]);
        let habit = store.get_habit(profile.id, content_id).await.unwrap().unwrap();
        assert!(habit.liked);
    }

    #[tokio::test]
    async fn test_unlike_only_decrements_when_liked() {
        let (store, profile, content_id) = setup().await;
        unlike(&store, profile.id, content_id).await.unwrap();
        assert_eq!(popularity(&store, content_id).await, 0);
        // no habit row is created by unlike
        assert!(store.get_habit(profile.id, content_id).await.unwrap().is_none());

        like(&store, profile.id, content_id).await.unwrap();
        unlike(&store, profile.id, content_id).await.unwrap();
        unlike(&store, profile.id, content_id).await.unwrap();
        assert_eq!(popularity(&store, content_id).await, 0);
        let habit = store.get_habit(profile.id, content_id).await.unwrap().unwrap();
        assert!(!habit.liked);
    }

    #[tokio::test]
    async fn test_like_unknown_content() {
        let (store, profile, _) = setup().await;
        let err = like(&store, profile.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_watchlist_is_idempotent() {
        let (store, profile, content_id) = setup().await;
        add_to_watchlist(&store, profile.id, content_id).await.unwrap();
        add_to_watchlist(&store, profile.id, content_id).await.unwrap();
        let stored = store.get_profile(profile.id).await.unwrap().unwrap();
        assert_eq!(stored.watchlist, vec![content_id]);

        remove_from_watchlist(&store, profile.id, content_id).await.unwrap();
        let stored = store.get_profile(profile.id).await.unwrap().unwrap();
        assert!(stored.watchlist.is_empty());
    }
}
