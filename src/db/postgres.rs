use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::repository::{
        ContentQuery, ContentRepository, HabitRepository, ProfileRepository, SortField, SortOrder,
        UserRepository,
    },
    error::{AppError, AppResult},
    models::{
        content::insert_into_season, Content, ContentDetails, ContentKind, Habit, Profile,
        ProgressUpdate, SeasonMap, User,
    },
};

/// Creates a PostgreSQL connection pool and applies pending migrations
pub async fn create_pool(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(max_connections, "Database migrations applied");

    Ok(pool)
}

/// Repository implementation over a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONTENT_COLUMNS: &str = "id, kind, title, description, poster_url, release_year, director, \
     actors, genres, imdb_rating, popularity, video_url, length_minutes, seasons, episode_title, \
     season_number, episode_number, release_date, created_at, updated_at";

/// Season maps are stored as jsonb with string keys
type StoredSeasons = BTreeMap<String, Vec<Uuid>>;

#[derive(FromRow)]
struct ContentRow {
    id: Uuid,
    kind: String,
    title: String,
    description: Option<String>,
    poster_url: Option<String>,
    release_year: Option<i32>,
    director: Option<String>,
    actors: Vec<String>,
    genres: Vec<String>,
    imdb_rating: Option<f64>,
    popularity: i64,
    video_url: Option<String>,
    length_minutes: Option<i32>,
    seasons: Option<Json<StoredSeasons>>,
    episode_title: Option<String>,
    season_number: Option<i32>,
    episode_number: Option<i32>,
    release_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct GenreContentRow {
    genre: String,
    #[sqlx(flatten)]
    content: ContentRow,
}

fn to_u32(field: &str, value: Option<i32>) -> AppResult<Option<u32>> {
    value
        .map(|v| {
            u32::try_from(v).map_err(|_| AppError::Internal(format!("negative {} in store", field)))
        })
        .transpose()
}

fn decode_seasons(stored: StoredSeasons) -> AppResult<SeasonMap> {
    stored
        .into_iter()
        .map(|(key, episodes)| {
            key.parse::<u32>()
                .map(|season| (season, episodes))
                .map_err(|_| AppError::Internal(format!("invalid season key '{}' in store", key)))
        })
        .collect()
}

fn encode_seasons(seasons: &SeasonMap) -> StoredSeasons {
    seasons
        .iter()
        .map(|(season, episodes)| (season.to_string(), episodes.clone()))
        .collect()
}

impl TryFrom<ContentRow> for Content {
    type Error = AppError;

    fn try_from(row: ContentRow) -> AppResult<Self> {
        let kind: ContentKind = row.kind.parse().map_err(AppError::Internal)?;
        let length_minutes = to_u32("length_minutes", row.length_minutes)?;
        let missing = |field: &str| AppError::Internal(format!("{} {} has no {}", kind, row.id, field));

        let details = match kind {
            ContentKind::Movie => ContentDetails::Movie {
                video_url: row.video_url.clone().unwrap_or_default(),
                length_minutes: length_minutes.ok_or_else(|| missing("length"))?,
            },
            ContentKind::Show => ContentDetails::Show {
                seasons: row
                    .seasons
                    .map(|Json(s)| decode_seasons(s))
                    .transpose()?
                    .unwrap_or_default(),
            },
            ContentKind::Episode => ContentDetails::Episode {
                episode_title: row.episode_title.clone().unwrap_or_default(),
                season_number: to_u32("season_number", row.season_number)?
                    .ok_or_else(|| missing("season number"))?,
                episode_number: to_u32("episode_number", row.episode_number)?
                    .ok_or_else(|| missing("episode number"))?,
                release_date: row.release_date,
                length_minutes,
                video_url: row.video_url.clone().unwrap_or_default(),
            },
        };

        Ok(Content {
            id: row.id,
            title: row.title,
            description: row.description,
            poster_url: row.poster_url,
            release_year: row.release_year,
            director: row.director,
            actors: row.actors,
            genres: row.genres,
            imdb_rating: row.imdb_rating,
            popularity: row.popularity,
            created_at: row.created_at,
            updated_at: row.updated_at,
            details,
        })
    }
}

fn into_contents(rows: Vec<ContentRow>) -> AppResult<Vec<Content>> {
    rows.into_iter().map(Content::try_from).collect()
}

/// Escapes LIKE wildcards so user input matches literally
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ContentQuery) {
    builder.push(" WHERE TRUE");
    if let Some(ids) = &query.ids {
        builder.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
    }
    if !query.exclude_ids.is_empty() {
        builder
            .push(" AND NOT (id = ANY(")
            .push_bind(query.exclude_ids.clone())
            .push("))");
    }
    if query.exclude_episodes {
        builder.push(" AND kind <> 'Episode'");
    }
    if let Some(kind) = query.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(needle) = &query.genre_contains {
        builder
            .push(" AND EXISTS (SELECT 1 FROM unnest(genres) AS g(name) WHERE g.name ILIKE ")
            .push_bind(format!("%{}%", escape_like(needle)))
            .push(")");
    }
    if let Some(genres) = &query.genres_any {
        builder.push(" AND genres && ").push_bind(genres.clone());
    }
    if let Some(title) = &query.title_equals {
        builder
            .push(" AND lower(btrim(title)) = ")
            .push_bind(title.trim().to_lowercase());
    }
    if let Some(year) = query.release_year {
        builder.push(" AND release_year = ").push_bind(year);
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Popularity => "popularity",
        SortField::ReleaseYear => "release_year",
        SortField::ImdbRating => "imdb_rating",
        SortField::Title => "lower(title)",
        SortField::CreatedAt => "created_at",
    }
}

fn push_ordering(builder: &mut QueryBuilder<'_, Postgres>, query: &ContentQuery) {
    builder.push(" ORDER BY ");
    for key in &query.sort {
        let direction = match key.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        builder.push(format!("{} {} NULLS LAST, ", sort_column(key.field), direction));
    }
    builder.push("id ASC");
}

/// Writes a content row; shared by plain inserts and the episode transaction
async fn insert_content_with<'e, E>(executor: E, content: &Content) -> AppResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let mut video_url = None;
    let mut length_minutes = None;
    let mut seasons = None;
    let mut episode_title = None;
    let mut season_number = None;
    let mut episode_number = None;
    let mut release_date = None;

    match &content.details {
        ContentDetails::Movie {
            video_url: url,
            length_minutes: minutes,
        } => {
            video_url = Some(url.clone());
            length_minutes = Some(*minutes as i32);
        }
        ContentDetails::Show { seasons: map } => {
            seasons = Some(Json(encode_seasons(map)));
        }
        ContentDetails::Episode {
            episode_title: name,
            season_number: season,
            episode_number: number,
            release_date: date,
            length_minutes: minutes,
            video_url: url,
        } => {
            video_url = Some(url.clone());
            length_minutes = minutes.map(|m| m as i32);
            episode_title = Some(name.clone());
            season_number = Some(*season as i32);
            episode_number = Some(*number as i32);
            release_date = *date;
        }
    }

    sqlx::query(&format!(
        "INSERT INTO contents ({}) VALUES \
         ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        CONTENT_COLUMNS
    ))
    .bind(content.id)
    .bind(content.kind().as_str())
    .bind(&content.title)
    .bind(&content.description)
    .bind(&content.poster_url)
    .bind(content.release_year)
    .bind(&content.director)
    .bind(&content.actors)
    .bind(&content.genres)
    .bind(content.imdb_rating)
    .bind(content.popularity)
    .bind(video_url)
    .bind(length_minutes)
    .bind(seasons)
    .bind(episode_title)
    .bind(season_number)
    .bind(episode_number)
    .bind(release_date)
    .bind(content.created_at)
    .bind(content.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl ContentRepository for PgStore {
    async fn insert_content(&self, content: &Content) -> AppResult<()> {
        insert_content_with(&self.pool, content).await
    }

    async fn get_content(&self, id: Uuid) -> AppResult<Option<Content>> {
        let row: Option<ContentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM contents WHERE id = $1",
            CONTENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Content::try_from).transpose()
    }

    async fn get_contents(&self, ids: &[Uuid]) -> AppResult<Vec<Content>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ContentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM contents WHERE id = ANY($1)",
            CONTENT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        into_contents(rows)
    }

    async fn find_content(&self, query: &ContentQuery) -> AppResult<Vec<Content>> {
        let mut builder = QueryBuilder::new(format!("SELECT {} FROM contents", CONTENT_COLUMNS));
        push_filters(&mut builder, query);
        push_ordering(&mut builder, query);
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        if query.offset > 0 {
            builder.push(" OFFSET ").push_bind(query.offset as i64);
        }

        let rows: Vec<ContentRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        into_contents(rows)
    }

    async fn count_content(&self, query: &ContentQuery) -> AppResult<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM contents");
        push_filters(&mut builder, query);

        let (count,): (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn distinct_genres(&self) -> AppResult<Vec<String>> {
        let genres: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT g.name FROM contents, unnest(genres) AS g(name) \
             WHERE kind <> 'Episode' AND btrim(g.name) <> '' ORDER BY g.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(genres.into_iter().map(|(g,)| g).collect())
    }

    async fn newest_by_genre(&self, per_genre: u32) -> AppResult<BTreeMap<String, Vec<Content>>> {
        let rows: Vec<GenreContentRow> = sqlx::query_as(&format!(
            "SELECT genre, {cols} FROM ( \
                SELECT g.name AS genre, c.*, \
                       ROW_NUMBER() OVER (PARTITION BY g.name ORDER BY c.created_at DESC, c.id ASC) AS rn \
                FROM contents c CROSS JOIN LATERAL unnest(c.genres) AS g(name) \
                WHERE c.kind <> 'Episode' AND btrim(g.name) <> '' \
             ) ranked WHERE rn <= $1 ORDER BY genre, rn",
            cols = CONTENT_COLUMNS
        ))
        .bind(per_genre as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut by_genre: BTreeMap<String, Vec<Content>> = BTreeMap::new();
        for row in rows {
            by_genre
                .entry(row.genre)
                .or_default()
                .push(Content::try_from(row.content)?);
        }
        Ok(by_genre)
    }

    async fn adjust_popularity(&self, id: Uuid, delta: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE contents SET popularity = GREATEST(popularity + $2, 0), updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_episode(&self, show_id: Uuid, episode: &Content) -> AppResult<()> {
        let (season, number) = episode
            .episode_slot()
            .ok_or_else(|| AppError::InvalidInput("Only episodes can be added to a show".to_string()))?;

        let mut tx = self.pool.begin().await?;

        let stored: Option<(Option<Json<StoredSeasons>>,)> =
            sqlx::query_as("SELECT seasons FROM contents WHERE id = $1 AND kind = 'Show' FOR UPDATE")
                .bind(show_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((stored,)) = stored else {
            return Err(AppError::not_found("Show", show_id));
        };
        let mut seasons = stored
            .map(|Json(s)| decode_seasons(s))
            .transpose()?
            .unwrap_or_default();

        let siblings = seasons.get(&season).cloned().unwrap_or_default();
        let numbers: HashMap<Uuid, u32> = if siblings.is_empty() {
            HashMap::new()
        } else {
            let rows: Vec<(Uuid, Option<i32>)> =
                sqlx::query_as("SELECT id, episode_number FROM contents WHERE id = ANY($1)")
                    .bind(&siblings)
                    .fetch_all(&mut *tx)
                    .await?;
            rows.into_iter()
                .filter_map(|(id, n)| n.and_then(|n| u32::try_from(n).ok()).map(|n| (id, n)))
                .collect()
        };
        if numbers.values().any(|&n| n == number) {
            return Err(AppError::InvalidInput(format!(
                "Season {} already has an episode {}",
                season, number
            )));
        }
        insert_into_season(&mut seasons, season, episode.id, number, |id| {
            numbers.get(id).copied()
        });

        insert_content_with(&mut *tx, episode).await?;

        sqlx::query("UPDATE contents SET seasons = $2, updated_at = now() WHERE id = $1")
            .bind(show_id)
            .bind(Json(encode_seasons(&seasons)))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

const PROFILE_COLUMNS: &str =
    "id, user_id, name, avatar, liked_contents, watchlist, created_at, updated_at";

#[async_trait::async_trait]
impl ProfileRepository for PgStore {
    async fn insert_profile(&self, profile: &Profile) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, user_id, name, avatar, liked_contents, watchlist, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(profile.id)
        .bind(profile.user_id)
        .bind(&profile.name)
        .bind(&profile.avatar)
        .bind(&profile.liked_contents)
        .bind(&profile.watchlist)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn profiles_for_user(&self, user_id: Uuid) -> AppResult<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM profiles WHERE user_id = $1 ORDER BY created_at",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<String>,
    ) -> AppResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET name = COALESCE($2, name), avatar = COALESCE($3, avatar), \
             updated_at = now() WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(avatar)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn delete_profile(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_liked(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET liked_contents = array_append(liked_contents, $2), updated_at = now() \
             WHERE id = $1 AND NOT ($2 = ANY(liked_contents))",
        )
        .bind(profile_id)
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_liked(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET liked_contents = array_remove(liked_contents, $2), updated_at = now() \
             WHERE id = $1 AND $2 = ANY(liked_contents)",
        )
        .bind(profile_id)
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_to_watchlist(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET watchlist = array_append(watchlist, $2), updated_at = now() \
             WHERE id = $1 AND NOT ($2 = ANY(watchlist))",
        )
        .bind(profile_id)
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_watchlist(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET watchlist = array_remove(watchlist, $2), updated_at = now() \
             WHERE id = $1 AND $2 = ANY(watchlist)",
        )
        .bind(profile_id)
        .bind(content_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

const HABIT_COLUMNS: &str = "profile_id, content_id, liked, completed, watched_time_in_seconds, \
     last_watched_at, created_at, updated_at";

#[derive(FromRow)]
struct HabitRow {
    profile_id: Uuid,
    content_id: Uuid,
    liked: bool,
    completed: bool,
    watched_time_in_seconds: i32,
    last_watched_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<HabitRow> for Habit {
    fn from(row: HabitRow) -> Self {
        Habit {
            profile_id: row.profile_id,
            content_id: row.content_id,
            liked: row.liked,
            completed: row.completed,
            watched_time_in_seconds: row.watched_time_in_seconds.max(0) as u32,
            last_watched_at: row.last_watched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn into_habits(rows: Vec<HabitRow>) -> Vec<Habit> {
    rows.into_iter().map(Habit::from).collect()
}

#[async_trait::async_trait]
impl HabitRepository for PgStore {
    async fn get_habit(&self, profile_id: Uuid, content_id: Uuid) -> AppResult<Option<Habit>> {
        let row: Option<HabitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM habits WHERE profile_id = $1 AND content_id = $2",
            HABIT_COLUMNS
        ))
        .bind(profile_id)
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Habit::from))
    }

    async fn upsert_progress(
        &self,
        profile_id: Uuid,
        content_id: Uuid,
        update: ProgressUpdate,
    ) -> AppResult<Habit> {
        let seconds = i32::try_from(update.watched_time_in_seconds)
            .map_err(|_| AppError::InvalidInput("currentTime is out of range".to_string()))?;

        let row: HabitRow = sqlx::query_as(&format!(
            "INSERT INTO habits (profile_id, content_id, completed, watched_time_in_seconds, last_watched_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (profile_id, content_id) DO UPDATE SET \
                completed = EXCLUDED.completed, \
                watched_time_in_seconds = EXCLUDED.watched_time_in_seconds, \
                last_watched_at = EXCLUDED.last_watched_at, \
                updated_at = now() \
             RETURNING {}",
            HABIT_COLUMNS
        ))
        .bind(profile_id)
        .bind(content_id)
        .bind(update.completed)
        .bind(seconds)
        .bind(update.watched_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn set_liked(
        &self,
        profile_id: Uuid,
        content_id: Uuid,
        liked: bool,
        create: bool,
    ) -> AppResult<()> {
        let sql = if create {
            "INSERT INTO habits (profile_id, content_id, liked) VALUES ($1, $2, $3) \
             ON CONFLICT (profile_id, content_id) DO UPDATE SET liked = EXCLUDED.liked, updated_at = now()"
        } else {
            "UPDATE habits SET liked = $3, updated_at = now() WHERE profile_id = $1 AND content_id = $2"
        };

        sqlx::query(sql)
            .bind(profile_id)
            .bind(content_id)
            .bind(liked)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn habits_for_profile(&self, profile_id: Uuid) -> AppResult<Vec<Habit>> {
        let rows: Vec<HabitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM habits WHERE profile_id = $1 ORDER BY last_watched_at DESC",
            HABIT_COLUMNS
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_habits(rows))
    }

    async fn habits_for_contents(
        &self,
        profile_id: Uuid,
        content_ids: &[Uuid],
    ) -> AppResult<Vec<Habit>> {
        if content_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<HabitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM habits WHERE profile_id = $1 AND content_id = ANY($2) \
             ORDER BY last_watched_at DESC",
            HABIT_COLUMNS
        ))
        .bind(profile_id)
        .bind(content_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_habits(rows))
    }

    async fn in_progress_habits(&self, profile_id: Uuid) -> AppResult<Vec<Habit>> {
        let rows: Vec<HabitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM habits \
             WHERE profile_id = $1 AND completed = FALSE AND watched_time_in_seconds > 0 \
             ORDER BY last_watched_at DESC",
            HABIT_COLUMNS
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_habits(rows))
    }

    async fn completed_content_ids(&self, profile_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> =
            sqlx::query_as("SELECT content_id FROM habits WHERE profile_id = $1 AND completed = TRUE")
                .bind(profile_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn habits_for_profiles(
        &self,
        profile_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Habit>> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<HabitRow> = sqlx::query_as(&format!(
            "SELECT {} FROM habits \
             WHERE profile_id = ANY($1) AND ($2::timestamptz IS NULL OR last_watched_at >= $2) \
             ORDER BY last_watched_at DESC",
            HABIT_COLUMNS
        ))
        .bind(profile_ids)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_habits(rows))
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_admin, created_at, updated_at";

#[async_trait::async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, is_admin, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = COALESCE($2, email), password_hash = COALESCE($3, password_hash), \
             updated_at = now() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        // profiles go with the user through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
