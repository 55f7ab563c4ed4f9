//! Periodic rebuild of the post index.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::PostCache;

use super::PeriodicJob;

/// Rebuild the post index once, logging the outcome.
pub async fn refresh_posts(cache: &PostCache) {
    match cache.refresh().await {
        Ok(index) => {
            tracing::debug!(
                generation = index.generation(),
                posts = index.len(),
                "Refreshed post index"
            );
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                cause = ?std::error::Error::source(&err).map(ToString::to_string),
                "Post index refresh failed; keeping previous snapshot"
            );
        }
    }
}

pub fn spawn_post_refresh(cache: Arc<PostCache>, period: Duration) -> PeriodicJob {
    PeriodicJob::spawn("refresh-posts", period, move || {
        let cache = cache.clone();
        async move { refresh_posts(&cache).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::ComrakRenderer;
    use crate::infra::posts::FsPostStore;

    #[tokio::test]
    async fn refresh_failure_keeps_serving_the_old_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FsPostStore::new(dir.path().to_path_buf(), Arc::new(ComrakRenderer::new()))
            .expect("store");
        std::fs::write(dir.path().join("good.md"), "### Good\n---\nbody").expect("write");
        let cache = PostCache::new(Arc::new(store));

        refresh_posts(&cache).await;
        assert!(cache.contains("good"));

        std::fs::write(dir.path().join("bad.md"), "no separator").expect("write");
        refresh_posts(&cache).await;
        assert!(cache.contains("good"));
        assert!(!cache.contains("bad"));
        assert_eq!(cache.get().generation(), 1);
    }
}
