use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of viewer profiles a single account may own
pub const MAX_PROFILES_PER_USER: usize = 5;

/// A named viewer identity under a user account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub liked_contents: Vec<Uuid>,
    pub watchlist: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Creates a new empty profile for a user
    pub fn new(user_id: Uuid, name: String, avatar: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name,
            avatar,
            liked_contents: Vec::new(),
            watchlist: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_liked(&self, content_id: &Uuid) -> bool {
        self.liked_contents.contains(content_id)
    }

    pub fn has_in_watchlist(&self, content_id: &Uuid) -> bool {
        self.watchlist.contains(content_id)
    }
}

/// An account; owns up to [`MAX_PROFILES_PER_USER`] profiles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a regular (non-admin) user from an already hashed password
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }
}
