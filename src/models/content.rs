use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use uuid::Uuid;

/// Season number → episode ids in playback order.
///
/// Keys are serialized as strings (`{"1": [...], "2": [...]}`); the ordered
/// map keeps seasons sorted numerically.
pub type SeasonMap = BTreeMap<u32, Vec<Uuid>>;

/// Discriminator of the content variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Movie,
    Show,
    Episode,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "Movie",
            ContentKind::Show => "Show",
            ContentKind::Episode => "Episode",
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Movie" => Ok(ContentKind::Movie),
            "Show" => Ok(ContentKind::Show),
            "Episode" => Ok(ContentKind::Episode),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}

/// A catalog entry: movie, show or episode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub release_year: Option<i32>,
    pub director: Option<String>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
    pub imdb_rating: Option<f64>,
    pub popularity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: ContentDetails,
}

/// Variant-specific fields, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentDetails {
    #[serde(rename_all = "camelCase")]
    Movie {
        video_url: String,
        length_minutes: u32,
    },
    #[serde(rename_all = "camelCase")]
    Show {
        #[serde(with = "season_keys")]
        seasons: SeasonMap,
    },
    #[serde(rename_all = "camelCase")]
    Episode {
        episode_title: String,
        season_number: u32,
        episode_number: u32,
        release_date: Option<NaiveDate>,
        length_minutes: Option<u32>,
        video_url: String,
    },
}

/// Season keys travel as strings and must be positive integers.
mod season_keys {
    use super::SeasonMap;
    use serde::de::Error;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(seasons: &SeasonMap, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(seasons.len()))?;
        for (season, episodes) in seasons {
            map.serialize_entry(&season.to_string(), episodes)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SeasonMap, D::Error> {
        let raw = BTreeMap::<String, Vec<Uuid>>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, episodes)| match key.trim().parse::<u32>() {
                Ok(season) if season > 0 => Ok((season, episodes)),
                _ => Err(D::Error::custom(format!("invalid season key '{}'", key))),
            })
            .collect()
    }
}

/// Fields shared by every content variant, used when constructing new content
#[derive(Debug, Clone, Default)]
pub struct ContentInfo {
    pub title: String,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub release_year: Option<i32>,
    pub director: Option<String>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
    pub imdb_rating: Option<f64>,
}

impl Content {
    /// Creates new content with a fresh id and zero popularity
    pub fn new(info: ContentInfo, details: ContentDetails) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: info.title,
            description: info.description,
            poster_url: info.poster_url,
            release_year: info.release_year,
            director: info.director,
            actors: info.actors,
            genres: info.genres,
            imdb_rating: info.imdb_rating,
            popularity: 0,
            created_at: now,
            updated_at: now,
            details,
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self.details {
            ContentDetails::Movie { .. } => ContentKind::Movie,
            ContentDetails::Show { .. } => ContentKind::Show,
            ContentDetails::Episode { .. } => ContentKind::Episode,
        }
    }

    pub fn is_episode(&self) -> bool {
        self.kind() == ContentKind::Episode
    }

    /// Playable URL; shows have none
    pub fn video_url(&self) -> Option<&str> {
        match &self.details {
            ContentDetails::Movie { video_url, .. } | ContentDetails::Episode { video_url, .. } => {
                Some(video_url.as_str()).filter(|url| !url.trim().is_empty())
            }
            ContentDetails::Show { .. } => None,
        }
    }

    /// Runtime in seconds when known
    pub fn length_seconds(&self) -> Option<u32> {
        let minutes = match &self.details {
            ContentDetails::Movie { length_minutes, .. } => Some(*length_minutes),
            ContentDetails::Episode { length_minutes, .. } => *length_minutes,
            ContentDetails::Show { .. } => None,
        };
        minutes.filter(|m| *m > 0).map(|m| m * 60)
    }

    pub fn seasons(&self) -> Option<&SeasonMap> {
        match &self.details {
            ContentDetails::Show { seasons } => Some(seasons),
            _ => None,
        }
    }

    pub fn seasons_mut(&mut self) -> Option<&mut SeasonMap> {
        match &mut self.details {
            ContentDetails::Show { seasons } => Some(seasons),
            _ => None,
        }
    }

    /// Season and episode number of an episode
    pub fn episode_slot(&self) -> Option<(u32, u32)> {
        match &self.details {
            ContentDetails::Episode {
                season_number,
                episode_number,
                ..
            } => Some((*season_number, *episode_number)),
            _ => None,
        }
    }

    pub fn shares_genre_with(&self, genres: &[String]) -> bool {
        self.genres.iter().any(|g| genres.contains(g))
    }
}

/// Inserts an episode into its season so the season stays ordered by
/// ascending episode number. `number_of` resolves the episode number of
/// ids already in the season; unresolvable ids keep their position.
pub fn insert_into_season(
    seasons: &mut SeasonMap,
    season: u32,
    episode_id: Uuid,
    episode_number: u32,
    number_of: impl Fn(&Uuid) -> Option<u32>,
) {
    let episodes = seasons.entry(season).or_default();
    let position = episodes
        .iter()
        .position(|id| number_of(id).is_some_and(|n| n > episode_number))
        .unwrap_or(episodes.len());
    episodes.insert(position, episode_id);
}
