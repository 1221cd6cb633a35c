//! Show navigation
//!
//! A show's season map is the only link between a show and its episodes.
//! Season keys are walked in ascending numeric order and each season list
//! is in playback order.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{Content, SeasonMap},
};

/// Where an episode sits inside a show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodePosition {
    pub season: u32,
    pub index: usize,
}

/// A show with its episodes loaded, keyed by season number
#[derive(Debug, Clone, Serialize)]
pub struct ShowData {
    pub show: Content,
    pub seasons: BTreeMap<u32, Vec<Content>>,
}

/// Where playback of an episode sits inside its show
#[derive(Debug, Clone)]
pub struct ShowContext {
    pub show_data: ShowData,
    pub next_episode_id: Option<Uuid>,
}

pub fn locate(seasons: &SeasonMap, episode_id: Uuid) -> Option<EpisodePosition> {
    seasons.iter().find_map(|(season, episodes)| {
        episodes
            .iter()
            .position(|id| *id == episode_id)
            .map(|index| EpisodePosition {
                season: *season,
                index,
            })
    })
}

/// The episode played after `episode_id`: the next one in its season, else
/// the first of the immediately following season. Gaps in season numbers
/// end the show.
pub fn next_episode(seasons: &SeasonMap, episode_id: Uuid) -> Option<Uuid> {
    let position = locate(seasons, episode_id)?;
    let current = seasons.get(&position.season)?;

    if let Some(next) = current.get(position.index + 1) {
        return Some(*next);
    }

    position
        .season
        .checked_add(1)
        .and_then(|season| seasons.get(&season))
        .and_then(|episodes| episodes.first())
        .copied()
}

/// First episode of the lowest non-empty season
pub fn first_episode(seasons: &SeasonMap) -> Option<Uuid> {
    seasons.values().find_map(|episodes| episodes.first()).copied()
}

/// Last episode of the highest season, if that season has any
pub fn finale(seasons: &SeasonMap) -> Option<Uuid> {
    seasons
        .values()
        .next_back()
        .and_then(|episodes| episodes.last())
        .copied()
}

pub fn episode_ids(seasons: &SeasonMap) -> Vec<Uuid> {
    seasons.values().flatten().copied().collect()
}

/// Loads every episode of a show, keeping season order and playback order.
///
/// Ids whose episode no longer exists are dropped from the listing.
pub async fn load_seasons(
    repo: &dyn Repository,
    show: &Content,
) -> AppResult<BTreeMap<u32, Vec<Content>>> {
    let Some(seasons) = show.seasons() else {
        return Ok(BTreeMap::new());
    };

    let mut loaded: BTreeMap<Uuid, Content> = repo
        .get_contents(&episode_ids(seasons))
        .await?
        .into_iter()
        .map(|episode| (episode.id, episode))
        .collect();

    Ok(seasons
        .iter()
        .map(|(season, ids)| {
            let episodes = ids.iter().filter_map(|id| loaded.remove(id)).collect();
            (*season, episodes)
        })
        .collect())
}

/// Show listing and next episode for an episode being played.
///
/// The caller supplies the show id; when it is absent or unknown there is
/// no show context and playback continues without one.
pub async fn show_context(
    repo: &dyn Repository,
    show_id: Option<Uuid>,
    episode_id: Uuid,
) -> AppResult<Option<ShowContext>> {
    let Some(show_id) = show_id else {
        tracing::warn!(%episode_id, "No show id given for episode, skipping show context");
        return Ok(None);
    };

    let show = match repo.get_content(show_id).await? {
        Some(show) if show.seasons().is_some() => show,
        _ => {
            tracing::warn!(%show_id, %episode_id, "Show not found for episode");
            return Ok(None);
        }
    };

    let seasons = load_seasons(repo, &show).await?;
    let next_episode_id = show
        .seasons()
        .and_then(|map| next_episode(map, episode_id));

    Ok(Some(ShowContext {
        show_data: ShowData { show, seasons },
        next_episode_id,
    }))
}

/// Episode a profile should play when opening a show.
///
/// The most recently watched episode wins while unfinished; once finished,
/// its successor. With no history, or after the finale, playback starts at
/// the first episode.
pub async fn resolve_for_profile(
    repo: &dyn Repository,
    show: &Content,
    profile_id: Uuid,
) -> AppResult<Uuid> {
    let seasons = show
        .seasons()
        .ok_or_else(|| AppError::InvalidInput(format!("Content {} is not a show", show.id)))?;
    let first = first_episode(seasons)
        .ok_or_else(|| AppError::NotFound(format!("Show {} has no episodes", show.id)))?;

    let habits = repo
        .habits_for_contents(profile_id, &episode_ids(seasons))
        .await?;

    let resolved = match habits.first() {
        Some(last) if !last.completed => last.content_id,
        Some(last) => next_episode(seasons, last.content_id).unwrap_or(first),
        None => first,
    };

    tracing::debug!(show_id = %show.id, %profile_id, episode_id = %resolved, "Resolved episode");
    Ok(resolved)
}
