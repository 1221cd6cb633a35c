use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::repository::{
        ContentQuery, ContentRepository, HabitRepository, ProfileRepository, SortField, SortKey,
        SortOrder, UserRepository,
    },
    error::{AppError, AppResult},
    models::{content::insert_into_season, Content, Habit, Profile, ProgressUpdate, User},
};

/// Process-local store used for tests and local development.
///
/// Every operation takes the lock once, so compound writes (episode + season
/// map, membership + check) are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    contents: HashMap<Uuid, Content>,
    profiles: HashMap<Uuid, Profile>,
    habits: HashMap<(Uuid, Uuid), Habit>,
    users: HashMap<Uuid, User>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn nulls_last<T: PartialOrd>(a: Option<T>, b: Option<T>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_by(keys: &[SortKey], a: &Content, b: &Content) -> Ordering {
    keys.iter()
        .map(|key| match key.field {
            SortField::Popularity => nulls_last(Some(a.popularity), Some(b.popularity), key.order),
            SortField::ReleaseYear => nulls_last(a.release_year, b.release_year, key.order),
            SortField::ImdbRating => nulls_last(a.imdb_rating, b.imdb_rating, key.order),
            SortField::Title => nulls_last(
                Some(a.title.to_lowercase()),
                Some(b.title.to_lowercase()),
                key.order,
            ),
            SortField::CreatedAt => nulls_last(Some(a.created_at), Some(b.created_at), key.order),
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| a.id.cmp(&b.id))
}

fn by_recency(habits: &mut [Habit]) {
    habits.sort_by(|a, b| b.last_watched_at.cmp(&a.last_watched_at));
}

#[async_trait::async_trait]
impl ContentRepository for MemoryStore {
    async fn insert_content(&self, content: &Content) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.contents.insert(content.id, content.clone());
        Ok(())
    }

    async fn get_content(&self, id: Uuid) -> AppResult<Option<Content>> {
        let inner = self.inner.read().await;
        Ok(inner.contents.get(&id).cloned())
    }

    async fn get_contents(&self, ids: &[Uuid]) -> AppResult<Vec<Content>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.contents.get(id))
            .cloned()
            .collect())
    }

    async fn find_content(&self, query: &ContentQuery) -> AppResult<Vec<Content>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<&Content> = inner
            .contents
            .values()
            .filter(|c| query.matches(c))
            .collect();
        matches.sort_by(|a, b| compare_by(&query.sort, a, b));

        let take = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matches
            .into_iter()
            .skip(query.offset as usize)
            .take(take)
            .cloned()
            .collect())
    }

    async fn count_content(&self, query: &ContentQuery) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.contents.values().filter(|c| query.matches(c)).count() as u64)
    }

    async fn distinct_genres(&self) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut genres: Vec<String> = inner
            .contents
            .values()
            .filter(|c| !c.is_episode())
            .flat_map(|c| c.genres.iter())
            .filter(|g| !g.trim().is_empty())
            .cloned()
            .collect();
        genres.sort();
        genres.dedup();
        Ok(genres)
    }

    async fn newest_by_genre(&self, per_genre: u32) -> AppResult<BTreeMap<String, Vec<Content>>> {
        let inner = self.inner.read().await;
        let mut newest: Vec<&Content> = inner.contents.values().filter(|c| !c.is_episode()).collect();
        newest.sort_by(|a, b| compare_by(&[SortKey::desc(SortField::CreatedAt)], a, b));

        let mut by_genre: BTreeMap<String, Vec<Content>> = BTreeMap::new();
        for content in newest {
            for genre in content.genres.iter().filter(|g| !g.trim().is_empty()) {
                let bucket = by_genre.entry(genre.clone()).or_default();
                if bucket.len() < per_genre as usize {
                    bucket.push(content.clone());
                }
            }
        }
        Ok(by_genre)
    }

    async fn adjust_popularity(&self, id: Uuid, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(content) = inner.contents.get_mut(&id) {
            content.popularity = (content.popularity + delta).max(0);
        }
        Ok(())
    }

    async fn add_episode(&self, show_id: Uuid, episode: &Content) -> AppResult<()> {
        let (season, number) = episode
            .episode_slot()
            .ok_or_else(|| AppError::InvalidInput("Only episodes can be added to a show".to_string()))?;

        let mut inner = self.inner.write().await;
        let numbers: HashMap<Uuid, u32> = inner
            .contents
            .values()
            .filter_map(|c| c.episode_slot().map(|(_, n)| (c.id, n)))
            .collect();

        let show = inner
            .contents
            .get_mut(&show_id)
            .filter(|c| c.seasons().is_some())
            .ok_or_else(|| AppError::not_found("Show", show_id))?;
        let taken = show
            .seasons()
            .and_then(|seasons| seasons.get(&season))
            .is_some_and(|ids| ids.iter().any(|id| numbers.get(id) == Some(&number)));
        if taken {
            return Err(AppError::InvalidInput(format!(
                "Season {} already has an episode {}",
                season, number
            )));
        }
        show.updated_at = Utc::now();
        if let Some(seasons) = show.seasons_mut() {
            insert_into_season(seasons, season, episode.id, number, |id| numbers.get(id).copied());
        }
        inner.contents.insert(episode.id, episode.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProfileRepository for MemoryStore {
    async fn insert_profile(&self, profile: &Profile) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let inner = self.inner.read().await;
        Ok(inner.profiles.get(&id).cloned())
    }

    async fn profiles_for_user(&self, user_id: Uuid) -> AppResult<Vec<Profile>> {
        let inner = self.inner.read().await;
        let mut profiles: Vec<Profile> = inner
            .profiles
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(profiles)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<String>,
    ) -> AppResult<Option<Profile>> {
        let mut inner = self.inner.write().await;
        let Some(profile) = inner.profiles.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            profile.name = name;
        }
        if let Some(avatar) = avatar {
            profile.avatar = Some(avatar);
        }
        profile.updated_at = Utc::now();
        Ok(Some(profile.clone()))
    }

    async fn delete_profile(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.profiles.remove(&id).is_some())
    }

    async fn add_liked(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(profile) = inner.profiles.get_mut(&profile_id) else {
            return Ok(false);
        };
        if profile.liked_contents.contains(&content_id) {
            return Ok(false);
        }
        profile.liked_contents.push(content_id);
        profile.updated_at = Utc::now();
        Ok(true)
    }

    async fn remove_liked(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(profile) = inner.profiles.get_mut(&profile_id) else {
            return Ok(false);
        };
        let before = profile.liked_contents.len();
        profile.liked_contents.retain(|id| *id != content_id);
        let removed = profile.liked_contents.len() != before;
        if removed {
            profile.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn add_to_watchlist(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(profile) = inner.profiles.get_mut(&profile_id) else {
            return Ok(false);
        };
        if profile.watchlist.contains(&content_id) {
            return Ok(false);
        }
        profile.watchlist.push(content_id);
        profile.updated_at = Utc::now();
        Ok(true)
    }

    async fn remove_from_watchlist(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(profile) = inner.profiles.get_mut(&profile_id) else {
            return Ok(false);
        };
        let before = profile.watchlist.len();
        profile.watchlist.retain(|id| *id != content_id);
        let removed = profile.watchlist.len() != before;
        if removed {
            profile.updated_at = Utc::now();
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl HabitRepository for MemoryStore {
    async fn get_habit(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<Option<Habit>> {
        let inner = self.inner.read().await;
        Ok(inner.habits.get(&(profile_id, content_id)).cloned())
    }

    async fn upsert_progress(
        &self,
        profile_id: Uuid,
        content_id: Uuid,
        update: ProgressUpdate,
    ) -> AppResult<Habit> {
        let mut inner = self.inner.write().await;
        let habit = inner
            .habits
            .entry((profile_id, content_id))
            .or_insert_with(|| Habit::new(profile_id, content_id));
        habit.watched_time_in_seconds = update.watched_time_in_seconds;
        habit.completed = update.completed;
        habit.last_watched_at = update.watched_at;
        habit.updated_at = Utc::now();
        Ok(habit.clone())
    }

    async fn set_liked(
        &self,
        profile_id: Uuid,
        content_id: Uuid,
        liked: bool,
        create: bool,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let key = (profile_id, content_id);
        if create {
            inner
                .habits
                .entry(key)
                .or_insert_with(|| Habit::new(profile_id, content_id));
        }
        if let Some(habit) = inner.habits.get_mut(&key) {
            habit.liked = liked;
            habit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn habits_for_profile(&self, profile_id: Uuid) -> AppResult<Vec<Habit>> {
        let inner = self.inner.read().await;
        let mut habits: Vec<Habit> = inner
            .habits
            .values()
            .filter(|h| h.profile_id == profile_id)
            .cloned()
            .collect();
        by_recency(&mut habits);
        Ok(habits)
    }

    async fn habits_for_contents(
        &self,
        profile_id: Uuid,
        content_ids: &[Uuid],
    ) -> AppResult<Vec<Habit>> {
        let inner = self.inner.read().await;
        let mut habits: Vec<Habit> = content_ids
            .iter()
            .filter_map(|id| inner.habits.get(&(profile_id, *id)))
            .cloned()
            .collect();
        by_recency(&mut habits);
        Ok(habits)
    }

    async fn in_progress_habits(&self, profile_id: Uuid) -> AppResult<Vec<Habit>> {
        let inner = self.inner.read().await;
        let mut habits: Vec<Habit> = inner
            .habits
            .values()
            .filter(|h| h.profile_id == profile_id && h.is_in_progress())
            .cloned()
            .collect();
        by_recency(&mut habits);
        Ok(habits)
    }

    async fn completed_content_ids(&self, profile_id: Uuid) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .habits
            .values()
            .filter(|h| h.profile_id == profile_id && h.completed)
            .map(|h| h.content_id)
            .collect())
    }

    async fn habits_for_profiles(
        &self,
        profile_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Habit>> {
        let inner = self.inner.read().await;
        let mut habits: Vec<Habit> = inner
            .habits
            .values()
            .filter(|h| profile_ids.contains(&h.profile_id))
            .filter(|h| since.map_or(true, |since| h.last_watched_at >= since))
            .cloned()
            .collect();
        by_recency(&mut habits);
        Ok(habits)
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> AppResult<Option<User>> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.users.remove(&id).is_some();
        if removed {
            inner.profiles.retain(|_, p| p.user_id != id);
        }
        Ok(removed)
    }
}
