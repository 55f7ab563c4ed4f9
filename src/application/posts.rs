//! Post reads and the authoring flow.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::repos::{PostsRepo, PublishPostParams, RepoError};
use crate::cache::{PostCache, PostIndex};
use crate::domain::posts::Post;
use crate::domain::slug::{file_name_for, slug_from_file_name};

pub struct PostService {
    cache: Arc<PostCache>,
}

impl PostService {
    pub fn new(cache: Arc<PostCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<PostCache> {
        &self.cache
    }

    /// Current listing snapshot.
    pub fn index(&self) -> Arc<PostIndex> {
        self.cache.get()
    }

    /// Load one post. Slugs missing from the live snapshot are not read from disk.
    pub async fn post(&self, slug: &str) -> Result<Post, RepoError> {
        if !self.cache.contains(slug) {
            return Err(RepoError::not_found(slug));
        }
        self.repo().read_post(&file_name_for(slug)).await
    }

    /// Publish a post and refresh the index so readers see it immediately.
    /// Returns the slug of the published post.
    pub async fn publish(&self, params: PublishPostParams) -> Result<String, RepoError> {
        let name = self.repo().write(params).await?;
        self.refresh_after("publish", &name).await;

        let slug = slug_from_file_name(&name).unwrap_or(&name).to_string();
        Ok(slug)
    }

    /// Retire a post and refresh the index.
    pub async fn delete(&self, slug: &str) -> Result<(), RepoError> {
        let name = file_name_for(slug);
        self.repo().delete(&name).await?;
        self.refresh_after("delete", &name).await;
        Ok(())
    }

    fn repo(&self) -> &Arc<dyn PostsRepo> {
        self.cache.repo()
    }

    async fn refresh_after(&self, op: &'static str, name: &str) {
        match self.cache.refresh().await {
            Ok(index) => info!(
                op,
                file = name,
                generation = index.generation(),
                "post index refreshed after write"
            ),
            Err(err) => warn!(
                op,
                file = name,
                error = %err,
                "post index refresh after write failed; next scheduled refresh will retry"
            ),
        }
    }
}
