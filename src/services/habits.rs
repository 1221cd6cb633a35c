use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Repository,
    error::AppResult,
    models::{Content, Habit, Profile},
    services::{require_profile, require_user},
};

const SUMMARY_WINDOW_DAYS: i64 = 7;

/// A habit row with its content; `content` is null once the content is gone
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitWithContent {
    #[serde(flatten)]
    pub habit: Habit,
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenreCount {
    pub genre: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyWatches {
    pub profile_id: Uuid,
    pub profile_name: String,
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub profiles: Vec<Profile>,
    pub genre_popularity: Vec<GenreCount>,
    pub daily_watches: Vec<DailyWatches>,
}

pub async fn habits_with_content(
    repo: &dyn Repository,
    profile_id: Uuid,
) -> AppResult<Vec<HabitWithContent>> {
    let profile = require_profile(repo, profile_id).await?;
    let habits = repo.habits_for_profile(profile.id).await?;
    attach_content(repo, habits).await
}

/// Habits of every profile of a user, most recently watched first
pub async fn habits_for_user(
    repo: &dyn Repository,
    user_id: Uuid,
) -> AppResult<Vec<HabitWithContent>> {
    let user = require_user(repo, user_id).await?;
    let profile_ids: Vec<Uuid> = repo
        .profiles_for_user(user.id)
        .await?
        .iter()
        .map(|p| p.id)
        .collect();
    if profile_ids.is_empty() {
        return Ok(Vec::new());
    }

    let habits = repo.habits_for_profiles(&profile_ids, None).await?;
    attach_content(repo, habits).await
}

async fn attach_content(
    repo: &dyn Repository,
    habits: Vec<Habit>,
) -> AppResult<Vec<HabitWithContent>> {
    let ids: Vec<Uuid> = habits.iter().map(|h| h.content_id).collect();
    let mut contents: HashMap<Uuid, Content> = repo
        .get_contents(&ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(habits
        .into_iter()
        .map(|habit| HabitWithContent {
            // several profiles may share one content
            content: contents.get(&habit.content_id).cloned(),
            habit,
        })
        .collect())
}

pub async fn user_summary(repo: &dyn Repository, user_id: Uuid) -> AppResult<UserSummary> {
    summary_at(repo, user_id, Utc::now()).await
}

async fn summary_at(
    repo: &dyn Repository,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<UserSummary> {
    let user = require_user(repo, user_id).await?;
    let profiles = repo.profiles_for_user(user.id).await?;
    let profile_ids: Vec<Uuid> = profiles.iter().map(|p| p.id).collect();

    let habits = repo.habits_for_profiles(&profile_ids, None).await?;
    let content_ids: Vec<Uuid> = habits.iter().map(|h| h.content_id).collect();
    let contents = repo.get_contents(&content_ids).await?;

    let genre_popularity = genre_popularity(&habits, &contents);
    let since = now - Duration::days(SUMMARY_WINDOW_DAYS);
    let daily_watches = daily_watches(&profiles, &habits, since);

    tracing::debug!(
        %user_id,
        profiles = profiles.len(),
        habits = habits.len(),
        "Built watch summary"
    );

    Ok(UserSummary {
        profiles,
        genre_popularity,
        daily_watches,
    })
}

/// Habit count per genre, most watched first
fn genre_popularity(habits: &[Habit], contents: &[Content]) -> Vec<GenreCount> {
    let genres_of: HashMap<Uuid, &[String]> = contents
        .iter()
        .map(|c| (c.id, c.genres.as_slice()))
        .collect();

    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for habit in habits {
        for genre in genres_of.get(&habit.content_id).copied().unwrap_or_default() {
            *counts.entry(genre.as_str()).or_default() += 1;
        }
    }

    let mut popularity: Vec<GenreCount> = counts
        .into_iter()
        .map(|(genre, count)| GenreCount {
            genre: genre.to_string(),
            count,
        })
        .collect();
    // stable sort keeps genres with equal counts alphabetical
    popularity.sort_by(|a, b| b.count.cmp(&a.count));
    popularity
}

/// Habit count per profile per UTC day since `since`, oldest day first
fn daily_watches(profiles: &[Profile], habits: &[Habit], since: DateTime<Utc>) -> Vec<DailyWatches> {
    let mut counts: BTreeMap<(NaiveDate, Uuid), u64> = BTreeMap::new();
    for habit in habits.iter().filter(|h| h.last_watched_at >= since) {
        *counts
            .entry((habit.last_watched_at.date_naive(), habit.profile_id))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .filter_map(|((date, profile_id), count)| {
            let profile = profiles.iter().find(|p| p.id == profile_id)?;
            Some(DailyWatches {
                profile_id,
                profile_name: profile.name.clone(),
                date,
                count,
            })
        })
        .collect()
}
