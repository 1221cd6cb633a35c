//! OMDb API provider
//!
//! Movies and shows are fetched by exact title (`?t=<title>&type=movie|series`),
//! episodes by show title plus season and episode number. OMDb reports
//! misses in-band with `"Response": "False"` and marks absent fields "N/A".

use chrono::NaiveDate;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::ContentKind,
    services::providers::{MetadataProvider, MetadataQuery, TitleMetadata},
};

const LOOKUP_CACHE_TTL: u64 = 86400; // 1 day

#[derive(Clone)]
pub struct OmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Option<Cache>,
}

/// Raw OMDb title record; every field is optional and may read "N/A"
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbTitle {
    response: Option<String>,
    error: Option<String>,
    title: Option<String>,
    plot: Option<String>,
    director: Option<String>,
    actors: Option<String>,
    genre: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    poster: Option<String>,
    runtime: Option<String>,
    year: Option<String>,
    released: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    season: Option<String>,
    episode: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "N/A")
}

fn split_list(value: Option<String>) -> Vec<String> {
    present(value)
        .map(|v| {
            v.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// "142 min" → 142
fn parse_runtime(value: Option<String>) -> Option<u32> {
    present(value)?
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .filter(|n| *n > 0)
}

/// "2019–2022" and "2019-" → 2019
fn parse_year(value: Option<String>) -> Option<i32> {
    let value = present(value)?;
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// "07 Jul 2010" → 2010-07-07
fn parse_release_date(value: Option<String>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&present(value)?, "%d %b %Y").ok()
}

fn parse_rating(value: Option<String>) -> Option<f64> {
    present(value)?
        .parse::<f64>()
        .ok()
        .filter(|r| (0.0..=10.0).contains(r))
}

impl OmdbTitle {
    fn found(&self) -> bool {
        self.response
            .as_deref()
            .map_or(false, |r| r.eq_ignore_ascii_case("true"))
    }

    fn into_metadata(self) -> TitleMetadata {
        let is_episode = self
            .kind
            .as_deref()
            .map_or(false, |k| k.eq_ignore_ascii_case("episode"));
        let title = present(self.title).unwrap_or_default();

        TitleMetadata {
            episode_title: is_episode.then(|| title.clone()),
            season: if is_episode {
                present(self.season).and_then(|s| s.parse().ok())
            } else {
                None
            },
            episode: if is_episode {
                present(self.episode).and_then(|e| e.parse().ok())
            } else {
                None
            },
            title,
            description: present(self.plot),
            director: present(self.director),
            actors: split_list(self.actors),
            genres: split_list(self.genre),
            imdb_rating: parse_rating(self.imdb_rating),
            imdb_id: present(self.imdb_id),
            poster_url: present(self.poster),
            runtime_minutes: parse_runtime(self.runtime),
            release_year: parse_year(self.year),
            release_date: parse_release_date(self.released),
        }
    }
}

impl OmdbProvider {
    pub fn new(api_key: String, api_url: String, cache: Option<Cache>) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            cache,
        }
    }

    fn query_params(&self, query: &MetadataQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("t", query.title.trim().to_string()),
            ("plot", "full".to_string()),
            ("apikey", self.api_key.clone()),
        ];
        match query.episode_slot() {
            Some((season, episode)) => {
                params.push(("Season", season.to_string()));
                params.push(("Episode", episode.to_string()));
            }
            None => match query.kind {
                Some(ContentKind::Movie) => params.push(("type", "movie".to_string())),
                Some(ContentKind::Show) => params.push(("type", "series".to_string())),
                // untyped lookups take whatever OMDb matches first
                _ => {}
            },
        }
        params
    }

    /// Interprets an OMDb answer; title lookups must match the requested
    /// title exactly (ignoring case) to count as found
    fn interpret(query: &MetadataQuery, record: OmdbTitle) -> Option<TitleMetadata> {
        if !record.found() {
            tracing::debug!(title = %query.title, error = ?record.error, "OMDb has no match");
            return None;
        }
        let metadata = record.into_metadata();
        if query.episode_slot().is_none()
            && !metadata
                .title
                .trim()
                .eq_ignore_ascii_case(query.title.trim())
        {
            tracing::debug!(requested = %query.title, returned = %metadata.title, "OMDb title mismatch");
            return None;
        }
        Some(metadata)
    }

    async fn fetch(&self, query: &MetadataQuery) -> AppResult<Option<TitleMetadata>> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&self.query_params(query))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OMDb API returned status {}: {}",
                status, body
            )));
        }

        let record: OmdbTitle = response.json().await?;
        let metadata = Self::interpret(query, record);

        tracing::info!(
            title = %query.title,
            season = ?query.season,
            episode = ?query.episode,
            found = metadata.is_some(),
            "Fetched metadata from OMDb"
        );

        Ok(metadata)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for OmdbProvider {
    async fn lookup(&self, query: &MetadataQuery) -> AppResult<Option<TitleMetadata>> {
        if query.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title must not be empty".to_string()));
        }

        let key = CacheKey::MetadataLookup {
            kind: query.kind,
            title: query.title.clone(),
            season: query.season,
            episode: query.episode,
        };

        match &self.cache {
            Some(cache) => cached!(cache, key, LOOKUP_CACHE_TTL, self.fetch(query)),
            None => self.fetch(query).await,
        }
    }

    fn name(&self) -> &'static str {
        "omdb"
    }
}
