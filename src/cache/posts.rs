//! Read-copy-update cell holding the live post index.
//!
//! Readers clone the current `Arc<PostIndex>` under a read lock and then work
//! on that snapshot without holding any lock. A refresh builds a complete new
//! snapshot off to the side and swaps it in under the write lock as its final
//! step, so a reader sees either the previous snapshot or the next one, never
//! a mix. Refreshes are not serialised against each other; the last swap wins.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicU64, Ordering},
};
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use tracing::debug;

use crate::application::repos::{PostsRepo, RepoError};

use super::index::PostIndex;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::posts";

pub struct PostCache {
    repo: Arc<dyn PostsRepo>,
    current: RwLock<Arc<PostIndex>>,
    generation: AtomicU64,
}

impl PostCache {
    pub fn new(repo: Arc<dyn PostsRepo>) -> Self {
        Self {
            repo,
            current: RwLock::new(Arc::new(PostIndex::empty())),
            generation: AtomicU64::new(0),
        }
    }

    /// Most recently published snapshot. Never performs I/O.
    pub fn get(&self) -> Arc<PostIndex> {
        rw_read(&self.current, SOURCE, "get").clone()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.get().contains(slug)
    }

    pub fn repo(&self) -> &Arc<dyn PostsRepo> {
        &self.repo
    }

    /// Re-read every post header and publish a new snapshot.
    ///
    /// Any listing or parse failure aborts the pass and leaves the current
    /// snapshot in place.
    pub async fn refresh(&self) -> Result<Arc<PostIndex>, RepoError> {
        let started = Instant::now();

        let result = self.build().await;
        histogram!("microblog_post_refresh_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(index) => {
                let index = Arc::new(index);
                *rw_write(&self.current, SOURCE, "refresh") = index.clone();

                counter!("microblog_post_refresh_total").increment(1);
                gauge!("microblog_post_index_size").set(index.len() as f64);
                debug!(
                    target = SOURCE,
                    generation = index.generation(),
                    posts = index.len(),
                    "post index published"
                );
                Ok(index)
            }
            Err(err) => {
                counter!("microblog_post_refresh_failed_total").increment(1);
                Err(err)
            }
        }
    }

    async fn build(&self) -> Result<PostIndex, RepoError> {
        let names = self.repo.list_filenames().await?;

        let mut headers = Vec::with_capacity(names.len());
        for name in &names {
            headers.push(self.repo.read_header(name).await?);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PostIndex::build(generation, headers))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use time::{Duration, macros::datetime};

    use super::*;
    use crate::application::repos::PublishPostParams;
    use crate::domain::posts::{Post, PostHeader, format_timestamp};
    use crate::domain::slug::slug_from_file_name;

    /// Serves `size` posts named `a-N.md` or `b-N.md` depending on `flip`.
    struct GenerationsRepo {
        size: usize,
        flip: AtomicBool,
        fail: AtomicBool,
    }

    impl GenerationsRepo {
        fn new(size: usize) -> Self {
            Self {
                size,
                flip: AtomicBool::new(false),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl PostsRepo for GenerationsRepo {
        async fn list_filenames(&self) -> Result<Vec<String>, RepoError> {
            let prefix = if self.flip.fetch_xor(true, Ordering::SeqCst) {
                "b"
            } else {
                "a"
            };
            Ok((0..self.size)
                .map(|i| format!("{prefix}-{i:03}.md"))
                .collect())
        }

        async fn read_header(&self, name: &str) -> Result<PostHeader, RepoError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepoError::io(name, "read", std::io::Error::other("boom")));
            }
            tokio::task::yield_now().await;

            let slug = slug_from_file_name(name).expect("post name");
            let minutes: i64 = slug[2..].parse().expect("index");
            Ok(PostHeader {
                title: slug.to_string(),
                timestamp: format_timestamp(
                    datetime!(2025-01-01 00:00 UTC) + Duration::minutes(minutes),
                ),
                slug: slug.to_string(),
                body_start: 3,
            })
        }

        async fn read_post(&self, name: &str) -> Result<Post, RepoError> {
            Err(RepoError::not_found(name))
        }

        async fn write(&self, _params: PublishPostParams) -> Result<String, RepoError> {
            Err(RepoError::EmptyPost)
        }

        async fn delete(&self, name: &str) -> Result<(), RepoError> {
            Err(RepoError::not_found(name))
        }
    }

    #[tokio::test]
    async fn get_returns_empty_snapshot_before_refresh() {
        let cache = PostCache::new(Arc::new(GenerationsRepo::new(3)));
        let index = cache.get();
        assert!(index.is_empty());
        assert_eq!(index.generation(), 0);
    }

    #[tokio::test]
    async fn reads_between_refreshes_are_identical() {
        let cache = PostCache::new(Arc::new(GenerationsRepo::new(3)));
        cache.refresh().await.expect("refresh");

        let first = cache.get();
        let second = cache.get();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.headers(), second.headers());

        let order: Vec<&str> = first.headers().iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(order, vec!["a-002", "a-001", "a-000"]);
        assert!(cache.contains("a-001"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let repo = Arc::new(GenerationsRepo::new(2));
        let cache = PostCache::new(repo.clone());
        let published = cache.refresh().await.expect("refresh");

        repo.fail.store(true, Ordering::SeqCst);
        assert!(cache.refresh().await.is_err());

        assert!(Arc::ptr_eq(&published, &cache.get()));
    }

    #[tokio::test]
    async fn each_refresh_advances_the_generation() {
        let cache = PostCache::new(Arc::new(GenerationsRepo::new(1)));
        let first = cache.refresh().await.expect("refresh");
        let second = cache.refresh().await.expect("refresh");
        assert!(second.generation() > first.generation());
        assert!(second.contains("b-000"));
        assert!(!second.contains("a-000"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_never_see_mixed_snapshots() {
        const SIZE: usize = 64;
        let cache = Arc::new(PostCache::new(Arc::new(GenerationsRepo::new(SIZE))));
        let stop = Arc::new(AtomicBool::new(false));

        let mut readers = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let stop = stop.clone();
            readers.push(tokio::spawn(async move {
                let mut observed = 0usize;
                while !stop.load(Ordering::SeqCst) {
                    let index = cache.get();
                    if !index.is_empty() {
                        assert_eq!(index.len(), SIZE);
                        let prefix = &index.headers()[0].slug[..2];
                        assert!(index.headers().iter().all(|h| h.slug.starts_with(prefix)));
                        observed += 1;
                    }
                    tokio::task::yield_now().await;
                }
                observed
            }));
        }

        let mut writers = Vec::new();
        for _ in 0..2 {
            let cache = cache.clone();
            writers.push(tokio::spawn(async move {
                for _ in 0..25 {
                    cache.refresh().await.expect("refresh");
                }
            }));
        }
        for writer in writers {
            writer.await.expect("writer");
        }
        stop.store(true, Ordering::SeqCst);

        for reader in readers {
            reader.await.expect("reader");
        }
        assert_eq!(cache.get().len(), SIZE);
    }
}
