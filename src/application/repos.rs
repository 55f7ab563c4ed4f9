//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::posts::{Post, PostHeader};
use crate::domain::slug::SlugError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("post `{name}` not found")]
    NotFound { name: String },
    #[error("post `{name}` is malformed")]
    Malformed {
        name: String,
        #[source]
        source: DomainError,
    },
    #[error("post title and content must not be empty")]
    EmptyPost,
    #[error("post title is too long")]
    TitleTooLong {
        #[source]
        source: SlugError,
    },
    #[error("i/o failure during `{op}` on `{name}`")]
    Io {
        name: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl RepoError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn io(name: impl Into<String>, op: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            name: name.into(),
            op,
            source,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublishPostParams {
    pub title: String,
    pub body: String,
}

/// Storage of post documents addressed by file name (`<slug>.md`).
#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Names of every post file, sorted. Empty when the directory holds no posts.
    async fn list_filenames(&self) -> Result<Vec<String>, RepoError>;

    async fn read_header(&self, name: &str) -> Result<PostHeader, RepoError>;

    async fn read_post(&self, name: &str) -> Result<Post, RepoError>;

    /// Publish a post, keeping the previous version as a single `.old` backup.
    /// Returns the file name written.
    async fn write(&self, params: PublishPostParams) -> Result<String, RepoError>;

    /// Retire a post by renaming it to its `.old` backup.
    async fn delete(&self, name: &str) -> Result<(), RepoError>;
}
