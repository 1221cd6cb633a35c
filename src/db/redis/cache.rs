use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;
use crate::models::ContentKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Distinct genre list of the catalog
    Genres,
    /// Metadata provider answer for a title, optionally narrowed to an episode.
    /// Movie, show and untyped lookups of one title are cached apart.
    MetadataLookup {
        kind: Option<ContentKind>,
        title: String,
        season: Option<u32>,
        episode: Option<u32>,
    },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Genres => write!(f, "genres:all"),
            CacheKey::MetadataLookup {
                kind,
                title,
                season,
                episode,
            } => {
                let kind = match kind {
                    Some(ContentKind::Movie) => "movie",
                    Some(ContentKind::Show) => "show",
                    Some(ContentKind::Episode) => "episode",
                    None => "any",
                };
                write!(f, "meta:{}:{}", kind, title.trim().to_lowercase())?;
                if let (Some(season), Some(episode)) = (season, episode) {
                    write!(f, ":s{}e{}", season, episode)?;
                }
                Ok(())
            }
        }
    }
}

/// Opens a Redis client; no connection is made until first use
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Cache handler for storing and retrieving data from Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task and waits for it to flush
    /// all pending writes to Redis.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// This spawns a background task that processes cache writes asynchronously,
    /// preventing cache operations from blocking API responses.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        // Spawn background task to process cache writes
        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    /// Background task draining the write channel into Redis.
    ///
    /// On shutdown, writes already queued are flushed before the task exits.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");
        let mut failed_writes: u64 = 0;

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        failed_writes += 1;
                        tracing::warn!(error = %e, failed_writes, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!(queued = write_rx.len(), "Cache writer shutting down, flushing queued writes");

                    // Senders live on in cloned caches, so drain without waiting
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::warn!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!(failed_writes, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    /// Writes a single message to Redis
    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Reads and deserializes a cached value; `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Like [`Cache::get_from_cache`], but an unreachable or corrupt cache
    /// reads as a miss
    pub async fn lookup<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.get_from_cache(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Queues a write for the background task and returns immediately.
    ///
    /// Failures are logged by the writer; callers never see them.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(title: &str, season: Option<u32>, episode: Option<u32>) -> CacheKey {
        CacheKey::MetadataLookup {
            kind: season.map(|_| ContentKind::Episode),
            title: title.to_string(),
            season,
            episode,
        }
    }

    #[test]
    fn test_cache_key_display_genres() {
        assert_eq!(format!("{}", CacheKey::Genres), "genres:all");
    }

    #[test]
    fn test_cache_key_display_lookup_lowercase() {
        let key = lookup("  The Matrix ", None, None);
        assert_eq!(format!("{}", key), "meta:any:the matrix");
    }

    #[test]
    fn test_cache_key_display_episode_lookup() {
        let key = lookup("Dark", Some(1), Some(3));
        assert_eq!(format!("{}", key), "meta:episode:dark:s1e3");
    }

    #[test]
    fn test_cache_key_ignores_partial_episode() {
        let key = lookup("Dark", Some(1), None);
        assert_eq!(format!("{}", key), "meta:episode:dark");
    }

    #[test]
    fn test_cache_key_separates_movies_and_shows() {
        let typed = |kind| CacheKey::MetadataLookup {
            kind,
            title: "Dune".to_string(),
            season: None,
            episode: None,
        };
        let movie = typed(Some(ContentKind::Movie)).to_string();
        let show = typed(Some(ContentKind::Show)).to_string();
        let any = typed(None).to_string();
        assert_eq!(movie, "meta:movie:dune");
        assert_eq!(show, "meta:show:dune");
        assert_eq!(any, "meta:any:dune");
    }

    #[tokio::test]
    #[ignore = "requires a Redis instance at REDIS_URL"]
    async fn test_cache_miss() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, _handle) = Cache::new(client).await;

        let key = lookup("nonexistent_key_12345", None, None);
        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();

        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    #[ignore = "requires a Redis instance at REDIS_URL"]
    async fn test_set_in_background_flushed_on_shutdown() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::new(client.clone()).await;

        let key = lookup("test_shutdown", None, None);
        let value = vec!["Drama".to_string(), "Horror".to_string()];

        cache.set_in_background(&key, &value, 60);
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(format!("{}", key)).await.unwrap();
    }
}
