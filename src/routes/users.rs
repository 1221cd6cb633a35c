use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::AppState,
    error::AppResult,
    models::{parse_id, User},
    routes::AppJson,
    services::users::{self, Credentials, NewUser, UserChanges},
};

pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = users::register(state.repo(), request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(credentials): AppJson<Credentials>,
) -> AppResult<Json<User>> {
    Ok(Json(users::login(state.repo(), credentials).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<User>> {
    let user_id = parse_id("userId", &user_id)?;
    Ok(Json(users::get_user(state.repo(), user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(changes): AppJson<UserChanges>,
) -> AppResult<Json<User>> {
    let user_id = parse_id("userId", &user_id)?;
    Ok(Json(users::update_user(state.repo(), user_id, changes).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<StatusCode> {
    let user_id = parse_id("userId", &user_id)?;
    users::delete_user(state.repo(), user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
