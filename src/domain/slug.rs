//! Slug and file-name derivation for posts.
//!
//! A post's slug is its lower-cased title, query-escaped so that it is safe to
//! use both as a file stem inside the post directory and as a URL path
//! segment. The slug doubles as the post's public identity, so the mapping
//! must stay deterministic: the same title always lands on the same file.

use std::path::{Component, Path};

use thiserror::Error;
use url::form_urlencoded::byte_serialize;

/// Extension of every post file in the post directory.
pub const POST_EXTENSION: &str = "md";

/// Suffix appended to a post file when it is superseded or deleted.
pub const BACKUP_SUFFIX: &str = "old";

/// Longest file name common filesystems accept.
pub const MAX_FILE_NAME_BYTES: usize = 255;

/// Longest slug whose backup file name (`<slug>.md.old`) still fits.
pub const MAX_SLUG_BYTES: usize =
    MAX_FILE_NAME_BYTES - POST_EXTENSION.len() - BACKUP_SUFFIX.len() - 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("slug is {bytes} bytes long, at most {MAX_SLUG_BYTES} fit in a file name")]
    TooLong { bytes: usize },
}

/// Derive the slug for a post title.
pub fn derive_slug(title: &str) -> Result<String, SlugError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let slug: String = byte_serialize(trimmed.to_lowercase().as_bytes()).collect();
    if slug.len() > MAX_SLUG_BYTES {
        return Err(SlugError::TooLong { bytes: slug.len() });
    }
    Ok(slug)
}

/// Post file name for a slug (`hello` → `hello.md`).
pub fn file_name_for(slug: &str) -> String {
    format!("{slug}.{POST_EXTENSION}")
}

/// Backup file name for a post file (`hello.md` → `hello.md.old`).
pub fn backup_name_for(file_name: &str) -> String {
    format!("{file_name}.{BACKUP_SUFFIX}")
}

/// Slug of a post file, or `None` when the name is not a post file.
pub fn slug_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(POST_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .filter(|stem| !stem.is_empty())
}

/// Escaped path segment for linking to a slug.
///
/// Slugs may themselves contain `%` and `+`, so they are escaped once more;
/// the router decodes one level and hands back the original slug.
pub fn url_segment(slug: &str) -> String {
    byte_serialize(slug.as_bytes()).collect()
}

/// Whether a requested name resolves to a single file inside the post directory.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
