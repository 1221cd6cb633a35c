use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use flixhub_api::api::{create_router, AppState};

fn create_test_server() -> TestServer {
    let app = create_router(AppState::in_memory());
    TestServer::new(app).unwrap()
}

async fn create_user(server: &TestServer, username: &str) -> Value {
    let response = server
        .post("/api/users")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter22"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn create_profile(server: &TestServer, user_id: &str, name: &str) -> Value {
    let response = server
        .post("/api/profiles")
        .json(&json!({ "userId": user_id, "name": name }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

/// A user with one profile; returns the profile id
async fn viewer(server: &TestServer) -> String {
    let user = create_user(server, "viewer").await;
    let profile = create_profile(server, user["id"].as_str().unwrap(), "Main").await;
    profile["id"].as_str().unwrap().to_string()
}

async fn create_content(server: &TestServer, body: Value) -> Value {
    let response = server.post("/api/content").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn create_movie(server: &TestServer, title: &str, genres: &[&str]) -> String {
    let movie = create_content(
        server,
        json!({
            "type": "movie",
            "title": title,
            "genres": genres,
            "videoUrl": format!("https://cdn.example.com/{}.mp4", title),
            "lengthMinutes": 120
        }),
    )
    .await;
    movie["id"].as_str().unwrap().to_string()
}

async fn create_episode(server: &TestServer, show_id: &str, season: u32, number: u32) -> String {
    let episode = create_content(
        server,
        json!({
            "type": "episode",
            "showId": show_id,
            "episodeTitle": format!("Episode {}", number),
            "seasonNumber": season,
            "episodeNumber": number,
            "lengthMinutes": 50,
            "videoUrl": format!("https://cdn.example.com/{}/{}/{}.mp4", show_id, season, number)
        }),
    )
    .await;
    episode["id"].as_str().unwrap().to_string()
}

async fn save_progress(server: &TestServer, profile_id: &str, content_id: &str, seconds: f64) -> Value {
    let response = server
        .post("/player/api/progress")
        .json(&json!({
            "profileId": profile_id,
            "contentId": content_id,
            "currentTime": seconds,
            "isComplete": false
        }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();

    let response = server.get("/health").await;
    let generated = response.header("x-request-id");
    assert!(uuid::Uuid::parse_str(generated.to_str().unwrap()).is_ok());

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-me-42"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-me-42");
}

#[tokio::test]
async fn test_malformed_and_unknown_ids() {
    let server = create_test_server();

    let response = server.get("/feed/not-an-id").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("profileId"));

    let response = server.get(&format!("/feed/{}", uuid::Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_cap_and_validation() {
    let server = create_test_server();
    let user = create_user(&server, "family").await;
    let user_id = user["id"].as_str().unwrap();
    assert!(user.get("passwordHash").is_none());

    for name in ["Mom", "Dad", "Kid 1", "Kid 2", "Guest"] {
        create_profile(&server, user_id, name).await;
    }

    let response = server
        .post("/api/profiles")
        .json(&json!({ "userId": user_id, "name": "Grandma" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get(&format!("/api/profiles/user/{}", user_id)).await;
    response.assert_status_ok();
    let profiles: Vec<Value> = response.json();
    assert_eq!(profiles.len(), 5);

    let other = create_user(&server, "other").await;
    let response = server
        .post("/api/profiles")
        .json(&json!({ "userId": other["id"], "name": "<script>" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login() {
    let server = create_test_server();
    create_user(&server, "neo").await;

    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": "NEO@example.com", "password": "hunter22" }))
        .await;
    response.assert_status_ok();

    let response = server
        .post("/api/users/login")
        .json(&json!({ "email": "neo@example.com", "password": "wrong-one" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/api/users")
        .json(&json!({ "username": "neo", "email": "again@example.com", "password": "hunter22" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_like_is_idempotent() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let movie_id = create_movie(&server, "Heat", &["Crime"]).await;
    let path = format!("/api/likes/{}/{}", profile_id, movie_id);

    server.post(&path).await.assert_status_ok();
    let response = server.post(&path).await;
    response.assert_status_ok();
    let state: Value = response.json();
    assert_eq!(state["liked"], true);
    assert_eq!(state["contentId"], movie_id.as_str());

    let movie: Value = server.get(&format!("/api/content/{}", movie_id)).await.json();
    assert_eq!(movie["popularity"], 1);

    server.delete(&path).await.assert_status_ok();
    server.delete(&path).await.assert_status_ok();
    let movie: Value = server.get(&format!("/api/content/{}", movie_id)).await.json();
    assert_eq!(movie["popularity"], 0);
}

#[tokio::test]
async fn test_progress_completion_is_server_side() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let movie_id = create_movie(&server, "Heat", &["Crime"]).await;

    // 6480 s is 90% of the 120 minute runtime
    let habit = save_progress(&server, &profile_id, &movie_id, 6500.7).await;
    assert_eq!(habit["watchedTimeInSeconds"], 6500);
    assert_eq!(habit["completed"], true);

    let habit = save_progress(&server, &profile_id, &movie_id, 120.0).await;
    assert_eq!(habit["completed"], false);
}

#[tokio::test]
async fn test_progress_rejects_bad_input() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let movie_id = create_movie(&server, "Heat", &["Crime"]).await;

    let response = server
        .post("/player/api/progress")
        .json(&json!({ "profileId": profile_id, "contentId": movie_id, "currentTime": -5 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/player/api/progress")
        .json(&json!({ "profileId": profile_id, "contentId": movie_id, "currentTime": "soon" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/player/api/progress")
        .json(&json!({
            "profileId": profile_id,
            "contentId": uuid::Uuid::new_v4(),
            "currentTime": 10
        }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_episodes_are_ordered_and_unique() {
    let server = create_test_server();
    let show = create_content(
        &server,
        json!({ "type": "show", "title": "Dark", "genres": ["Sci-Fi"] }),
    )
    .await;
    let show_id = show["id"].as_str().unwrap();

    let second = create_episode(&server, show_id, 1, 2).await;
    let first = create_episode(&server, show_id, 1, 1).await;

    let response = server
        .post("/api/content")
        .json(&json!({
            "type": "episode",
            "showId": show_id,
            "episodeTitle": "Again",
            "seasonNumber": 1,
            "episodeNumber": 2,
            "videoUrl": "https://cdn.example.com/dup.mp4"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let show: Value = server.get(&format!("/api/content/{}", show_id)).await.json();
    assert_eq!(show["seasons"]["1"], json!([first, second]));

    // episodes inherit the show's genres but never show up as catalog rows
    let catalog: Vec<Value> = server.get("/api/content").await.json();
    assert_eq!(catalog.len(), 1);
}

#[tokio::test]
async fn test_player_and_next_episode() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let show = create_content(&server, json!({ "type": "show", "title": "Dark" })).await;
    let show_id = show["id"].as_str().unwrap();
    let e1 = create_episode(&server, show_id, 1, 1).await;
    let e2 = create_episode(&server, show_id, 1, 2).await;
    let s2e1 = create_episode(&server, show_id, 2, 1).await;

    let response = server
        .get(&format!("/player/api/data/{}/{}", e1, profile_id))
        .add_query_param("showId", show_id)
        .await;
    response.assert_status_ok();
    let data: Value = response.json();
    assert_eq!(data["nextEpisodeId"], e2.as_str());
    assert_eq!(data["showData"]["seasons"]["2"][0]["id"], s2e1.as_str());

    // without a show id the player still works, just without navigation
    let data: Value = server
        .get(&format!("/player/api/data/{}/{}", e2, profile_id))
        .await
        .json();
    assert!(data["showData"].is_null());
    assert!(data["nextEpisodeId"].is_null());

    // a show has nothing to play
    let response = server
        .get(&format!("/player/api/data/{}/{}", show_id, profile_id))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let next_path = format!("/player/api/next-episode/{}/{}", show_id, profile_id);
    let next: Value = server.get(&next_path).await.json();
    assert_eq!(next["episodeId"], e1.as_str());

    save_progress(&server, &profile_id, &e2, 3000.0).await;
    let next: Value = server.get(&next_path).await.json();
    assert_eq!(next["episodeId"], s2e1.as_str());
}

#[tokio::test]
async fn test_genre_browsing() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let alien = create_movie(&server, "Alien", &["Science Fiction", "Horror"]).await;
    create_movie(&server, "Heat", &["Crime"]).await;
    let show = create_content(
        &server,
        json!({ "type": "show", "title": "Dark", "genres": ["Science Fiction"] }),
    )
    .await;
    create_episode(&server, show["id"].as_str().unwrap(), 1, 1).await;

    let genres: Vec<String> = server.get("/genres/api/genres").await.json();
    assert_eq!(genres, vec!["Crime", "Horror", "Science Fiction"]);

    let response = server
        .get("/genres/api/genres/fiction")
        .add_query_param("sortBy", "title")
        .add_query_param("sortOrder", "asc")
        .await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["pagination"]["totalCount"], 2);
    assert_eq!(page["content"][0]["title"], "Alien");
    assert_eq!(page["content"][1]["title"], "Dark");

    let response = server
        .get("/genres/api/genres/fiction")
        .add_query_param("page", "0")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/genres/api/genres/fiction")
        .add_query_param("filterWatched", "watched")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    save_progress(&server, &profile_id, &alien, 7000.0).await;
    let page: Value = server
        .get("/genres/api/genres/fiction")
        .add_query_param("filterWatched", "unwatched")
        .add_query_param("profileId", &profile_id)
        .await
        .json();
    assert_eq!(page["pagination"]["totalCount"], 1);
    assert_eq!(page["content"][0]["title"], "Dark");
}

#[tokio::test]
async fn test_feed() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let heat = create_movie(&server, "Heat", &["Crime"]).await;
    let collateral = create_movie(&server, "Collateral", &["Crime", "Thriller"]).await;
    let up = create_movie(&server, "Up", &["Animation"]).await;

    server
        .post(&format!("/api/likes/{}/{}", profile_id, heat))
        .await
        .assert_status_ok();
    save_progress(&server, &profile_id, &up, 600.0).await;

    let response = server.get(&format!("/feed/{}", profile_id)).await;
    response.assert_status_ok();
    let feed: Value = response.json();

    assert_eq!(feed["continueWatching"][0]["content"]["id"], up.as_str());
    assert_eq!(feed["continueWatching"][0]["watchedTimeInSeconds"], 600);
    assert_eq!(feed["recommendations"], json!([
        server.get(&format!("/api/content/{}", collateral)).await.json::<Value>()
    ]));
    assert_eq!(feed["mostPopular"][0]["id"], heat.as_str());
    assert_eq!(feed["newestByGenre"]["Crime"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_content_detail() {
    let server = create_test_server();
    let profile_id = viewer(&server).await;
    let heat = create_movie(&server, "Heat", &["Crime"]).await;
    create_movie(&server, "Ronin", &["Crime"]).await;

    server
        .post(&format!("/api/watchlist/{}/{}", profile_id, heat))
        .await
        .assert_status_ok();
    save_progress(&server, &profile_id, &heat, 900.0).await;

    let detail: Value = server
        .get(&format!("/select-content/data/{}", heat))
        .add_query_param("profileId", &profile_id)
        .await
        .json();
    assert_eq!(detail["isInWatchlist"], true);
    assert_eq!(detail["isLiked"], false);
    assert_eq!(detail["isCompleted"], false);
    assert_eq!(detail["watchHabits"][heat.as_str()], 900);
    assert_eq!(detail["similarContent"][0]["title"], "Ronin");

    let response = server
        .get(&format!("/select-content/data/{}", heat))
        .add_query_param("profileId", "garbage")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_habit_reports() {
    let server = create_test_server();
    let user = create_user(&server, "neo").await;
    let user_id = user["id"].as_str().unwrap();
    let profile = create_profile(&server, user_id, "Main").await;
    let profile_id = profile["id"].as_str().unwrap();
    let heat = create_movie(&server, "Heat", &["Crime"]).await;
    save_progress(&server, profile_id, &heat, 60.0).await;

    let habits: Vec<Value> = server
        .get(&format!("/api/habits/profile/{}", profile_id))
        .await
        .json();
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0]["content"]["title"], "Heat");

    let habits: Vec<Value> = server
        .get(&format!("/api/habits/user/{}", user_id))
        .await
        .json();
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0]["profileId"], profile_id);
    assert_eq!(habits[0]["content"]["id"], heat.as_str());

    let summary: Value = server
        .get(&format!("/api/habits/user/{}/summary", user_id))
        .await
        .json();
    assert_eq!(summary["genrePopularity"][0]["genre"], "Crime");
    assert_eq!(summary["dailyWatches"][0]["count"], 1);
}

#[tokio::test]
async fn test_metadata_lookup_without_provider() {
    let server = create_test_server();
    let response = server
        .get("/api/metadata/lookup")
        .add_query_param("title", "Heat")
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_delete_user_removes_profiles() {
    let server = create_test_server();
    let user = create_user(&server, "neo").await;
    let user_id = user["id"].as_str().unwrap();
    let profile = create_profile(&server, user_id, "Main").await;

    server
        .delete(&format!("/api/users/{}", user_id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/api/profiles/{}", profile["id"].as_str().unwrap()))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
