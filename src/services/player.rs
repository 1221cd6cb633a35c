use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{Content, Habit, ProgressUpdate, WatchPolicy},
    services::{
        navigator::{self, ShowData},
        require_content, require_profile,
    },
};

/// Everything the player needs to start playback
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub content: Content,
    pub habit: Option<Habit>,
    pub show_data: Option<ShowData>,
    pub next_episode_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub profile_id: Uuid,
    pub content_id: Uuid,
    pub current_time: f64,
    #[serde(default)]
    pub is_complete: bool,
}

pub async fn player_data(
    repo: &dyn Repository,
    content_id: Uuid,
    profile_id: Uuid,
    show_id: Option<Uuid>,
) -> AppResult<PlayerData> {
    let profile = require_profile(repo, profile_id).await?;
    let content = require_content(repo, content_id).await?;
    let habit = repo.get_habit(profile.id, content.id).await?;

    if content.video_url().is_none() {
        return Err(AppError::NotFound(format!(
            "No video URL found for content {}",
            content.id
        )));
    }

    let (show_data, next_episode_id) = if content.is_episode() {
        match navigator::show_context(repo, show_id, content.id).await? {
            Some(context) => (Some(context.show_data), context.next_episode_id),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    Ok(PlayerData {
        content,
        habit,
        show_data,
        next_episode_id,
    })
}

/// Largest progress either store can hold
const MAX_PROGRESS_SECONDS: u32 = i32::MAX as u32;

/// Persists watch progress.
///
/// When the content's runtime is known completion is decided here from the
/// policy; the client's flag only counts for content of unknown length.
pub async fn save_progress(
    repo: &dyn Repository,
    policy: &WatchPolicy,
    request: &ProgressRequest,
) -> AppResult<Habit> {
    if !request.current_time.is_finite() || request.current_time < 0.0 {
        return Err(AppError::InvalidInput(
            "currentTime must be a non-negative number of seconds".to_string(),
        ));
    }
    let seconds = request.current_time.floor();
    if seconds > f64::from(MAX_PROGRESS_SECONDS) {
        return Err(AppError::InvalidInput("currentTime is out of range".to_string()));
    }
    let seconds = seconds as u32;

    let profile = require_profile(repo, request.profile_id).await?;
    let content = require_content(repo, request.content_id).await?;

    let completed = policy
        .is_complete(seconds, content.length_seconds())
        .unwrap_or(request.is_complete);

    let habit = repo
        .upsert_progress(
            profile.id,
            content.id,
            ProgressUpdate {
                watched_time_in_seconds: seconds,
                completed,
                watched_at: Utc::now(),
            },
        )
        .await?;

    tracing::debug!(
        profile_id = %profile.id,
        content_id = %content.id,
        seconds,
        completed,
        "Progress saved"
    );
    Ok(habit)
}

/// Episode to open for a profile landing on a show
pub async fn next_episode(repo: &dyn Repository, show_id: Uuid, profile_id: Uuid) -> AppResult<Uuid> {
    let profile = require_profile(repo, profile_id).await?;
    let show = require_content(repo, show_id).await?;
    if show.seasons().is_none() {
        return Err(AppError::not_found("Show", show_id));
    }
    navigator::resolve_for_profile(repo, &show, profile.id).await
}
