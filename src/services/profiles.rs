use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{Profile, MAX_PROFILES_PER_USER},
    services::{require_profile, require_user},
};

static PROFILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _-]+$").expect("valid profile name pattern"));

fn validate_profile_name(name: &str) -> Result<(), ValidationError> {
    if PROFILE_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("profile_name")
            .with_message("name may only contain letters, digits, spaces, '_' and '-'".into()))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 30), custom(function = "validate_profile_name"))]
    pub name: String,
    #[validate(url)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    #[validate(length(min = 1, max = 30), custom(function = "validate_profile_name"))]
    pub name: Option<String>,
    #[validate(url)]
    pub avatar: Option<String>,
}

pub async fn create_profile(repo: &dyn Repository, request: NewProfile) -> AppResult<Profile> {
    let request = NewProfile {
        name: request.name.trim().to_string(),
        ..request
    };
    request.validate()?;
    let user = require_user(repo, request.user_id).await?;

    let existing = repo.profiles_for_user(user.id).await?;
    if existing.len() >= MAX_PROFILES_PER_USER {
        return Err(AppError::InvalidInput(format!(
            "A user can have at most {} profiles",
            MAX_PROFILES_PER_USER
        )));
    }

    let profile = Profile::new(user.id, request.name, request.avatar);
    repo.insert_profile(&profile).await?;

    tracing::info!(profile_id = %profile.id, user_id = %user.id, "Profile created");
    Ok(profile)
}

pub async fn profiles_for_user(repo: &dyn Repository, user_id: Uuid) -> AppResult<Vec<Profile>> {
    let user = require_user(repo, user_id).await?;
    repo.profiles_for_user(user.id).await
}

pub async fn get_profile(repo: &dyn Repository, profile_id: Uuid) -> AppResult<Profile> {
    require_profile(repo, profile_id).await
}

pub async fn update_profile(
    repo: &dyn Repository,
    profile_id: Uuid,
    changes: ProfileChanges,
) -> AppResult<Profile> {
    let changes = ProfileChanges {
        name: changes.name.map(|n| n.trim().to_string()),
        ..changes
    };
    changes.validate()?;
    repo.update_profile(profile_id, changes.name, changes.avatar)
    .await?
    .ok_or_else(|| AppError::not_found("Profile", profile_id))
}

/// Deletes only the profile; liked content, watchlisted content and habit
/// rows are left as they are
pub async fn delete_profile(repo: &dyn Repository, profile_id: Uuid) -> AppResult<()> {
    if !repo.delete_profile(profile_id).await? {
        return Err(AppError::not_found("Profile", profile_id));
    }
    tracing::info!(%profile_id, "Profile deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        repository::{ContentRepository, ProfileRepository, UserRepository},
        MemoryStore,
    };
    use crate::models::{content::fixtures::movie, User};

    async fn user(store: &MemoryStore) -> User {
        let user = User::new("neo".into(), "neo@example.com".into(), "hash".into());
        store.insert_user(&user).await.unwrap();
        user
    }

    fn new_profile(user_id: Uuid, name: &str) -> NewProfile {
        NewProfile {
            user_id,
            name: name.to_string(),
            avatar: None,
        }
    }

    #[test]
    fn test_profile_name_pattern() {
        assert!(validate_profile_name("Kids_2 - Room").is_ok());
        assert!(validate_profile_name("Bobby<script>").is_err());
        assert!(validate_profile_name("Zoë").is_err());
    }

    #[tokio::test]
    async fn test_profile_cap() {
        let store = MemoryStore::new();
        let user = user(&store).await;
        for i in 0..MAX_PROFILES_PER_USER {
            create_profile(&store, new_profile(user.id, &format!("P{}", i)))
                .await
                .unwrap();
        }
        let err = create_profile(&store, new_profile(user.id, "One too many"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_blank_names_rejected() {
        let store = MemoryStore::new();
        let user = user(&store).await;
        let err = create_profile(&store, new_profile(user.id, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let profile = create_profile(&store, new_profile(user.id, "  Main  ")).await.unwrap();
        assert_eq!(profile.name, "Main");

        let err = update_profile(
            &store,
            profile.id,
            ProfileChanges {
                name: Some("  ".to_string()),
                avatar: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(store.get_profile(profile.id).await.unwrap().unwrap().name, "Main");
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = MemoryStore::new();
        let err = create_profile(&store, new_profile(Uuid::new_v4(), "Main"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let store = MemoryStore::new();
        let user = user(&store).await;
        let mut request = new_profile(user.id, "Main");
        request.avatar = Some("https://cdn.example.com/a.png".to_string());
        let profile = create_profile(&store, request).await.unwrap();

        let updated = update_profile(
            &store,
            profile.id,
            ProfileChanges {
                name: Some("Renamed".to_string()),
                avatar: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.avatar.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[tokio::test]
    async fn test_delete_leaves_content_alone() {
        let store = MemoryStore::new();
        let user = user(&store).await;
        let profile = create_profile(&store, new_profile(user.id, "Main")).await.unwrap();
        let movie = movie("Heat", &[]);
        store.insert_content(&movie).await.unwrap();
        store.add_liked(profile.id, movie.id).await.unwrap();

        delete_profile(&store, profile.id).await.unwrap();
        assert!(store.get_content(movie.id).await.unwrap().is_some());
        assert!(matches!(
            delete_profile(&store, profile.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
