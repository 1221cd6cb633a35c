use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Watch state of one profile for one piece of content.
///
/// At most one row exists per `(profile_id, content_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub profile_id: Uuid,
    pub content_id: Uuid,
    pub liked: bool,
    pub completed: bool,
    pub watched_time_in_seconds: u32,
    pub last_watched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// A fresh row with no progress
    pub fn new(profile_id: Uuid, content_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            profile_id,
            content_id,
            liked: false,
            completed: false,
            watched_time_in_seconds: 0,
            last_watched_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        !self.completed && self.watched_time_in_seconds > 0
    }
}

/// Progress write applied by an upsert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub watched_time_in_seconds: u32,
    pub completed: bool,
    pub watched_at: DateTime<Utc>,
}

/// Thresholds deciding when progress counts as finished
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchPolicy {
    /// Fraction of a title's runtime after which it is completed
    pub completion_ratio: f64,
    /// Fixed window applied when runtime is unknown, and upper bound otherwise
    pub continue_watching_cap_seconds: u32,
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            completion_ratio: 0.9,
            continue_watching_cap_seconds: 3240,
        }
    }
}

impl WatchPolicy {
    /// Server-side completion; `None` when the runtime is unknown
    pub fn is_complete(&self, watched_seconds: u32, length_seconds: Option<u32>) -> Option<bool> {
        length_seconds.map(|length| f64::from(watched_seconds) >= self.completion_ratio * f64::from(length))
    }

    /// Exclusive upper bound of progress still shown under "continue watching"
    pub fn continue_watching_limit(&self, length_seconds: Option<u32>) -> u32 {
        let cap = self.continue_watching_cap_seconds;
        match length_seconds {
            Some(length) => {
                let by_length = (self.completion_ratio * f64::from(length)).floor() as u32;
                by_length.min(cap)
            }
            None => cap,
        }
    }
}
