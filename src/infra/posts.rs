//! Filesystem-backed post storage.
//!
//! Every post is a flat `<slug>.md` file inside one directory. Publishing a
//! post whose file already exists first renames the live file to
//! `<slug>.md.old`, so exactly one previous generation is kept. The rename and
//! the following write are not atomic together: a crash in between leaves the
//! backup as the only copy. There is no file locking; two writers racing on the
//! same slug leave the last write live and the other as the backup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, info};

use crate::application::repos::{PostsRepo, PublishPostParams, RepoError};
use crate::domain::posts::{
    MarkdownRenderer, Post, PostHeader, compose_document, format_timestamp, parse_header,
    parse_post,
};
use crate::domain::slug::{
    SlugError, backup_name_for, derive_slug, file_name_for, is_plain_file_name, slug_from_file_name,
};

const SOURCE: &str = "microblog::infra::posts";

pub struct FsPostStore {
    root: PathBuf,
    renderer: Arc<dyn MarkdownRenderer>,
}

impl FsPostStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, renderer: Arc<dyn MarkdownRenderer>) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, renderer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a requested post file name, returning its slug and absolute path.
    fn resolve<'a>(&self, name: &'a str) -> Result<(&'a str, PathBuf), RepoError> {
        if !is_plain_file_name(name) {
            return Err(RepoError::not_found(name));
        }
        let slug = slug_from_file_name(name).ok_or_else(|| RepoError::not_found(name))?;
        Ok((slug, self.root.join(name)))
    }

    async fn read_bytes(&self, name: &str, path: &Path) -> Result<Vec<u8>, RepoError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(RepoError::not_found(name)),
            Err(err) => Err(RepoError::io(name, "read", err)),
        }
    }

    /// Move `name` to its backup, dropping any older backup first.
    ///
    /// Failures are not distinguishable from "nothing to back up", so they are
    /// only logged.
    async fn back_up(&self, name: &str) {
        let live = self.root.join(name);
        let backup = self.root.join(backup_name_for(name));

        if let Err(err) = fs::remove_file(&backup).await
            && err.kind() != ErrorKind::NotFound
        {
            debug!(target = SOURCE, file = name, error = %err, "could not remove previous backup");
        }
        if let Err(err) = fs::rename(&live, &backup).await {
            debug!(target = SOURCE, file = name, error = %err, "could not rename post to backup");
        }
    }

    async fn exists(&self, name: &str, path: &Path) -> Result<bool, RepoError> {
        fs::try_exists(path)
            .await
            .map_err(|err| RepoError::io(name, "stat", err))
    }
}

#[async_trait]
impl PostsRepo for FsPostStore {
    async fn list_filenames(&self) -> Result<Vec<String>, RepoError> {
        let root_name = self.root.display().to_string();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|err| RepoError::io(root_name.clone(), "list", err))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| RepoError::io(root_name.clone(), "list", err))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| RepoError::io(root_name.clone(), "list", err))?;
            if file_type.is_dir() {
                continue;
            }

            let Ok(name) = entry.file_name().into_string() else {
                debug!(target = SOURCE, "skipping post file with a non UTF-8 name");
                continue;
            };
            if slug_from_file_name(&name).is_some() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read_header(&self, name: &str) -> Result<PostHeader, RepoError> {
        let (slug, path) = self.resolve(name)?;
        let bytes = self.read_bytes(name, &path).await?;
        parse_header(&bytes, slug).map_err(|source| RepoError::Malformed {
            name: name.to_string(),
            source,
        })
    }

    async fn read_post(&self, name: &str) -> Result<Post, RepoError> {
        let (slug, path) = self.resolve(name)?;
        let bytes = self.read_bytes(name, &path).await?;
        parse_post(&bytes, slug, self.renderer.as_ref()).map_err(|source| RepoError::Malformed {
            name: name.to_string(),
            source,
        })
    }

    async fn write(&self, params: PublishPostParams) -> Result<String, RepoError> {
        if params.title.trim().is_empty() || params.body.trim().is_empty() {
            return Err(RepoError::EmptyPost);
        }

        let slug = derive_slug(&params.title).map_err(|source| match source {
            SlugError::EmptyInput => RepoError::EmptyPost,
            SlugError::TooLong { .. } => RepoError::TitleTooLong { source },
        })?;
        let name = file_name_for(&slug);
        let path = self.root.join(&name);

        let timestamp = format_timestamp(OffsetDateTime::now_utc());
        let document = compose_document(&params.title, &params.body, &timestamp);

        if self.exists(&name, &path).await? {
            self.back_up(&name).await;
        }

        fs::write(&path, document)
            .await
            .map_err(|err| RepoError::io(name.clone(), "write", err))?;

        info!(target = SOURCE, file = %name, "post published");
        Ok(name)
    }

    async fn delete(&self, name: &str) -> Result<(), RepoError> {
        let (_, path) = self.resolve(name)?;
        if !self.exists(name, &path).await? {
            return Err(RepoError::not_found(name));
        }

        let backup = self.root.join(backup_name_for(name));
        if let Err(err) = fs::remove_file(&backup).await
            && err.kind() != ErrorKind::NotFound
        {
            debug!(target = SOURCE, file = name, error = %err, "could not remove previous backup");
        }

        match fs::rename(&path, &backup).await {
            Ok(()) => {
                info!(target = SOURCE, file = name, "post retired to backup");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(RepoError::not_found(name)),
            Err(err) => Err(RepoError::io(name, "delete", err)),
        }
    }
}
