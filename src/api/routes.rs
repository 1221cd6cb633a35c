use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::AppState;
use crate::middleware::{log_response, make_span_with_request_id, request_id_middleware};
use crate::routes::{
    catalog, engagement, feed, genres, habits, health_check, player, profiles, users,
};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/feed/:profile_id", get(feed::get_feed))
        .nest("/genres/api", genre_routes())
        .route("/select-content/data/:id", get(catalog::get_content_detail))
        .nest("/player/api", player_routes())
        .nest("/api", api_routes())
        // Request ids are assigned before the trace span is opened
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(request_id_middleware))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(make_span_with_request_id)
                        .on_response(log_response),
                ),
        )
        .with_state(state)
}

fn genre_routes() -> Router<AppState> {
    Router::new()
        .route("/genres", get(genres::list_genres))
        .route("/genres/:genre", get(genres::browse_genre))
}

fn player_routes() -> Router<AppState> {
    Router::new()
        .route("/data/:content_id/:profile_id", get(player::get_player_data))
        .route("/progress", post(player::save_progress))
        .route(
            "/next-episode/:show_id/:profile_id",
            get(player::get_next_episode),
        )
}

/// Engagement, accounts, catalog admin and reporting under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/likes/:profile_id/:content_id",
            post(engagement::like).delete(engagement::unlike),
        )
        .route(
            "/watchlist/:profile_id/:content_id",
            post(engagement::add_to_watchlist).delete(engagement::remove_from_watchlist),
        )
        // Profiles
        .route("/profiles", post(profiles::create_profile))
        .route("/profiles/user/:user_id", get(profiles::list_user_profiles))
        .route(
            "/profiles/:profile_id",
            get(profiles::get_profile)
                .put(profiles::update_profile)
                .delete(profiles::delete_profile),
        )
        // Users
        .route("/users", post(users::register))
        .route("/users/login", post(users::login))
        .route(
            "/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Catalog
        .route(
            "/content",
            get(catalog::list_content).post(catalog::create_content),
        )
        .route("/content/:id", get(catalog::get_content))
        .route("/metadata/lookup", get(catalog::lookup_metadata))
        // Reporting
        .route("/habits/profile/:profile_id", get(habits::profile_habits))
        .route("/habits/user/:user_id", get(habits::user_habits))
        .route("/habits/user/:user_id/summary", get(habits::user_summary))
}
