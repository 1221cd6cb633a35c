use uuid::Uuid;

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{Content, Profile, User},
};

pub mod catalog;
pub mod engagement;
pub mod feed;
pub mod genres;
pub mod habits;
pub mod navigator;
pub mod player;
pub mod profiles;
pub mod providers;
pub mod users;

pub async fn require_profile(repo: &dyn Repository, id: Uuid) -> AppResult<Profile> {
    repo.get_profile(id)
        .await?
        .ok_or_else(|| AppError::not_found("Profile", id))
}

pub async fn require_content(repo: &dyn Repository, id: Uuid) -> AppResult<Content> {
    repo.get_content(id)
        .await?
        .ok_or_else(|| AppError::not_found("Content", id))
}

pub async fn require_user(repo: &dyn Repository, id: Uuid) -> AppResult<User> {
    repo.get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))
}
