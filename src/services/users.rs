//! Account management
//!
//! Passwords are stored as argon2 PHC strings and never leave the service;
//! [`User`] skips the hash when serialized.

use std::sync::LazyLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::User,
    services::require_user,
};

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]{3,30}$").expect("valid username pattern"));

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(ValidationError::new("username").with_message(
            "username must be 3-30 letters, digits, '_' or '.'".into(),
        ))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

async fn ensure_email_free(repo: &dyn Repository, email: &str, owner: Option<Uuid>) -> AppResult<()> {
    match repo.find_user_by_email(email).await? {
        Some(existing) if Some(existing.id) != owner => Err(AppError::InvalidInput(
            "Email is already registered".to_string(),
        )),
        _ => Ok(()),
    }
}

pub async fn register(repo: &dyn Repository, request: NewUser) -> AppResult<User> {
    let request = NewUser {
        username: request.username.trim().to_string(),
        email: normalize_email(&request.email),
        password: request.password,
    };
    request.validate()?;

    ensure_email_free(repo, &request.email, None).await?;
    if repo.find_user_by_username(&request.username).await?.is_some() {
        return Err(AppError::InvalidInput("Username is already taken".to_string()));
    }

    let user = User::new(
        request.username,
        request.email,
        hash_password(&request.password)?,
    );
    repo.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}

/// Unknown email and wrong password fail the same way
pub async fn login(repo: &dyn Repository, credentials: Credentials) -> AppResult<User> {
    let email = normalize_email(&credentials.email);
    let user = repo.find_user_by_email(&email).await?;

    match user {
        Some(user) if verify_password(&credentials.password, &user.password_hash) => {
            tracing::info!(user_id = %user.id, "User logged in");
            Ok(user)
        }
        _ => {
            tracing::debug!(%email, "Login rejected");
            Err(AppError::Unauthorized("Invalid email or password".to_string()))
        }
    }
}

pub async fn get_user(repo: &dyn Repository, user_id: Uuid) -> AppResult<User> {
    require_user(repo, user_id).await
}

pub async fn update_user(
    repo: &dyn Repository,
    user_id: Uuid,
    changes: UserChanges,
) -> AppResult<User> {
    let changes = UserChanges {
        email: changes.email.as_deref().map(normalize_email),
        password: changes.password,
    };
    changes.validate()?;
    require_user(repo, user_id).await?;

    if let Some(email) = &changes.email {
        ensure_email_free(repo, email, Some(user_id)).await?;
    }
    let password_hash = changes.password.as_deref().map(hash_password).transpose()?;

    repo.update_user(user_id, changes.email, password_hash)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))
}

/// Deletes the account together with its profiles
pub async fn delete_user(repo: &dyn Repository, user_id: Uuid) -> AppResult<()> {
    if !repo.delete_user(user_id).await? {
        return Err(AppError::not_found("User", user_id));
    }
    tracing::info!(%user_id, "User deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{repository::ProfileRepository, MemoryStore};
    use crate::models::Profile;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[test]
    fn test_username_pattern() {
        assert!(validate_username("neo.anderson_1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("with space").is_err());
    }

    #[test]
    fn test_hash_round_trip() {
        let hash = hash_password("s3cret!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret!", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret!", "plaintext"));
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let store = MemoryStore::new();
        let user = register(&store, new_user("neo", " Neo@Example.com "))
            .await
            .unwrap();
        assert_eq!(user.email, "neo@example.com");
        assert_ne!(user.password_hash, "hunter22");

        let logged_in = login(
            &store,
            Credentials {
                email: "NEO@example.com".to_string(),
                password: "hunter22".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.id, user.id);

        let err = login(
            &store,
            Credentials {
                email: "neo@example.com".to_string(),
                password: "nope".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let store = MemoryStore::new();
        register(&store, new_user("neo", "neo@example.com")).await.unwrap();

        let err = register(&store, new_user("trinity", "NEO@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = register(&store, new_user("neo", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let store = MemoryStore::new();
        let mut request = new_user("neo", "not-an-email");
        assert!(matches!(
            register(&store, request.clone()).await,
            Err(AppError::InvalidInput(_))
        ));

        request.email = "neo@example.com".to_string();
        request.password = "short".to_string();
        assert!(matches!(
            register(&store, request).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_update_password() {
        let store = MemoryStore::new();
        let user = register(&store, new_user("neo", "neo@example.com")).await.unwrap();

        update_user(
            &store,
            user.id,
            UserChanges {
                email: None,
                password: Some("red-pill".to_string()),
            },
        )
        .await
        .unwrap();

        let credentials = |password: &str| Credentials {
            email: "neo@example.com".to_string(),
            password: password.to_string(),
        };
        assert!(login(&store, credentials("red-pill")).await.is_ok());
        assert!(login(&store, credentials("hunter22")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_email_conflict() {
        let store = MemoryStore::new();
        let neo = register(&store, new_user("neo", "neo@example.com")).await.unwrap();
        register(&store, new_user("trinity", "trinity@example.com"))
            .await
            .unwrap();

        let err = update_user(
            &store,
            neo.id,
            UserChanges {
                email: Some("trinity@example.com".to_string()),
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        // re-submitting your own email is fine
        let same = update_user(
            &store,
            neo.id,
            UserChanges {
                email: Some("neo@example.com".to_string()),
                password: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(same.email, "neo@example.com");
    }

    #[tokio::test]
    async fn test_delete_removes_profiles() {
        let store = MemoryStore::new();
        let user = register(&store, new_user("neo", "neo@example.com")).await.unwrap();
        let profile = Profile::new(user.id, "Main".to_string(), None);
        store.insert_profile(&profile).await.unwrap();

        delete_user(&store, user.id).await.unwrap();
        assert!(store.get_profile(profile.id).await.unwrap().is_none());
        assert!(matches!(
            delete_user(&store, user.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
