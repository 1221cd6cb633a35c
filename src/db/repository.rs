//! Storage abstraction
//!
//! Services talk to the catalog through these traits so the same logic runs
//! against PostgreSQL in production and the in-memory store in tests and
//! local development. Filtering, sorting and pagination are pushed down to
//! the store through [`ContentQuery`].

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Content, ContentKind, Habit, Profile, ProgressUpdate, User},
};

/// Sortable content columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Popularity,
    ReleaseYear,
    ImdbRating,
    Title,
    CreatedAt,
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popularity" => Ok(SortField::Popularity),
            "releaseYear" => Ok(SortField::ReleaseYear),
            "imdbRating" => Ok(SortField::ImdbRating),
            "title" => Ok(SortField::Title),
            "createdAt" => Ok(SortField::CreatedAt),
            other => Err(AppError::InvalidInput(format!(
                "sortBy must be one of popularity, releaseYear, imdbRating, title, createdAt (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::InvalidInput(format!(
                "sortOrder must be asc or desc (got '{}')",
                other
            ))),
        }
    }
}

/// One ordering term; missing values always sort last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortKey {
    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }

    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }
}

/// Filter, ordering and window over the content catalog.
///
/// Every set filter must hold. Ties in `sort` are broken by id so paging
/// is stable.
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
    /// Only these ids
    pub ids: Option<Vec<Uuid>>,
    /// Never these ids
    pub exclude_ids: Vec<Uuid>,
    /// Case-insensitive substring of at least one genre
    pub genre_contains: Option<String>,
    /// At least one genre equal to one of these
    pub genres_any: Option<Vec<String>>,
    pub kind: Option<ContentKind>,
    pub exclude_episodes: bool,
    /// Case-insensitive exact title
    pub title_equals: Option<String>,
    pub release_year: Option<i32>,
    pub sort: Vec<SortKey>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl ContentQuery {
    pub fn catalog() -> Self {
        Self {
            exclude_episodes: true,
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }

    /// Whether a single item passes the filters (ordering and window aside)
    pub fn matches(&self, content: &Content) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&content.id) {
                return false;
            }
        }
        if self.exclude_ids.contains(&content.id) {
            return false;
        }
        if self.exclude_episodes && content.is_episode() {
            return false;
        }
        if let Some(kind) = self.kind {
            if content.kind() != kind {
                return false;
            }
        }
        if let Some(needle) = &self.genre_contains {
            let needle = needle.to_lowercase();
            if !content
                .genres
                .iter()
                .any(|g| g.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if let Some(genres) = &self.genres_any {
            if !content.shares_genre_with(genres) {
                return false;
            }
        }
        if let Some(title) = &self.title_equals {
            if content.title.trim().to_lowercase() != title.trim().to_lowercase() {
                return false;
            }
        }
        if let Some(year) = self.release_year {
            if content.release_year != Some(year) {
                return false;
            }
        }
        true
    }
}

#[async_trait::async_trait]
pub trait ContentRepository: Send + Sync {
    async fn insert_content(&self, content: &Content) -> AppResult<()>;

    async fn get_content(&self, id: Uuid) -> AppResult<Option<Content>>;

    /// Loads the given ids; unknown ids are skipped, order is unspecified
    async fn get_contents(&self, ids: &[Uuid]) -> AppResult<Vec<Content>>;

    async fn find_content(&self, query: &ContentQuery) -> AppResult<Vec<Content>>;

    /// Number of matches ignoring `sort`, `offset` and `limit`
    async fn count_content(&self, query: &ContentQuery) -> AppResult<u64>;

    /// Sorted distinct non-blank genres of non-episode content
    async fn distinct_genres(&self) -> AppResult<Vec<String>>;

    /// The `per_genre` most recently created non-episode items of every genre
    async fn newest_by_genre(&self, per_genre: u32) -> AppResult<BTreeMap<String, Vec<Content>>>;

    /// Adds `delta` to the popularity counter, never going below zero
    async fn adjust_popularity(&self, id: Uuid, delta: i64) -> AppResult<()>;

    /// Stores `episode` and inserts it into the show's season map as a
    /// single atomic write. Fails with NotFound when the show is missing.
    async fn add_episode(&self, show_id: Uuid, episode: &Content) -> AppResult<()>;
}

#[async_trait::async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn insert_profile(&self, profile: &Profile) -> AppResult<()>;

    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>>;

    async fn profiles_for_user(&self, user_id: Uuid) -> AppResult<Vec<Profile>>;

    /// Applies the given changes and returns the updated profile
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<String>,
    ) -> AppResult<Option<Profile>>;

    /// Returns whether a profile was deleted
    async fn delete_profile(&self, id: Uuid) -> AppResult<bool>;

    /// Appends to likedContents unless present; true when added
    async fn add_liked(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool>;

    /// Removes from likedContents; true when it was present
    async fn remove_liked(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool>;

    async fn add_to_watchlist(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool>;

    async fn remove_from_watchlist(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool>;
}

#[async_trait::async_trait]
pub trait HabitRepository: Send + Sync {
    async fn get_habit(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<Option<Habit>>;

    /// Inserts or overwrites progress for the pair and returns the row
    async fn upsert_progress(
        &self,
        profile_id: Uuid,
        content_id: Uuid,
        update: ProgressUpdate,
    ) -> AppResult<Habit>;

    /// Sets the liked flag; creates the row only when `create` is set
    async fn set_liked(
        &self,
        profile_id: Uuid,
        content_id: Uuid,
        liked: bool,
        create: bool,
    ) -> AppResult<()>;

    /// All habits of a profile, most recently watched first
    async fn habits_for_profile(&self, profile_id: Uuid) -> AppResult<Vec<Habit>>;

    /// Habits of a profile restricted to the given content, most recent first
    async fn habits_for_contents(
        &self,
        profile_id: Uuid,
        content_ids: &[Uuid],
    ) -> AppResult<Vec<Habit>>;

    /// Incomplete habits with some progress, most recent first
    async fn in_progress_habits(&self, profile_id: Uuid) -> AppResult<Vec<Habit>>;

    async fn completed_content_ids(&self, profile_id: Uuid) -> AppResult<Vec<Uuid>>;

    /// Habits across several profiles watched at or after `since` (all when `None`)
    async fn habits_for_profiles(
        &self,
        profile_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Habit>>;
}

#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> AppResult<()>;

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn update_user(
        &self,
        id: Uuid,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> AppResult<Option<User>>;

    /// Deletes the user and its profiles
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;
}

/// Everything the services need from a store
pub trait Repository: ContentRepository + ProfileRepository + HabitRepository + UserRepository {}

impl<T> Repository for T where T: ContentRepository + ProfileRepository + HabitRepository + UserRepository {}
