/// Read-through caching over a [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present. Otherwise awaits `$block` (a
/// future yielding `AppResult<T>`), queues the value for a background write
/// with `$ttl` seconds to live, and returns it. Cache read failures count as
/// a miss; errors from `$block` propagate with `?`.
///
/// # Example
/// ```rust,ignore
/// async fn genres(cache: &Cache, repo: &dyn Repository) -> AppResult<Vec<String>> {
///     cached!(cache, CacheKey::Genres, 300, async { repo.distinct_genres().await })
/// }
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.lookup(&key).await {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&key, &value, $ttl);
            Ok(value)
        }
    }};
}
