//! Title metadata providers
//!
//! Catalog admins rarely type runtimes and ratings by hand; a provider fills
//! them in from an external database when content is created, and backs the
//! metadata lookup endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::AppResult, models::ContentKind};

pub mod omdb;

pub use omdb::OmdbProvider;

/// What to look up: a movie or show by title, or one episode of a show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataQuery {
    pub title: String,
    pub kind: Option<ContentKind>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MetadataQuery {
    pub fn title(title: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            title: title.into(),
            kind: Some(kind),
            season: None,
            episode: None,
        }
    }

    pub fn episode(show_title: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            title: show_title.into(),
            kind: Some(ContentKind::Episode),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Season and episode, when both are known
    pub fn episode_slot(&self) -> Option<(u32, u32)> {
        self.season.zip(self.episode)
    }
}

/// Normalized metadata for one title or episode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleMetadata {
    pub title: String,
    pub description: Option<String>,
    pub director: Option<String>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
    pub imdb_rating: Option<f64>,
    pub imdb_id: Option<String>,
    pub poster_url: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub release_year: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub episode_title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Source of title metadata.
///
/// `Ok(None)` means the provider answered but knows no such title.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn lookup(&self, query: &MetadataQuery) -> AppResult<Option<TitleMetadata>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
