/// A macro to simplify response caching.
///
/// This macro checks if a value is present in the cache.
/// If found, it returns the cached value.
/// If not found, it awaits the provided future to compute the value,
/// stores it in the cache, and then returns the computed value.
///
/// Errors from the future propagate with `?` and leave the cache untouched.
///
/// # Arguments
/// * `$cache`: The cache to use. It must have async `get` and `insert` methods keyed by `$key`.
/// * `$key`: The key to use for caching the value. Must be a place expression
///   (it is borrowed for the lookup and moved into the cache on a miss).
/// * `$block`: The future to await if the value is not found in cache.
///
/// # Example
/// ```rust,ignore
/// let page = cached!(cache, fingerprint, async move {
///     compute_page().await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $block:expr) => {{
        if let Some(cached) = $cache.get(&$key).await {
            tracing::debug!(key = %$key, "Response cache hit");
            Ok(cached)
        } else {
            tracing::debug!(key = %$key, "Response cache miss");
            let value = std::sync::Arc::new($block.await?);
            $cache.insert($key, value.clone()).await;
            Ok(value)
        }
    }};
}
