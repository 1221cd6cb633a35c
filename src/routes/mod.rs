//! HTTP handlers, one module per area of the API
//!
//! Handlers stay thin: parse path and query input, call into `services`,
//! wrap the result in JSON.

use axum::{extract::FromRequest, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::error::AppError;

pub mod catalog;
pub mod engagement;
pub mod feed;
pub mod genres;
pub mod habits;
pub mod player;
pub mod profiles;
pub mod users;

/// `Json` extractor whose rejections surface as 400 `{ "error": ... }`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
