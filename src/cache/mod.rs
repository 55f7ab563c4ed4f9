//! In-memory post index.
//!
//! The post directory changes rarely and is read on every request, so every
//! read is served from an immutable [`PostIndex`] snapshot held by
//! [`PostCache`]. Snapshots are rebuilt wholesale by refresh passes:
//!
//! - once at startup, before the listener accepts traffic;
//! - on a fixed interval by a background job;
//! - immediately after a post is published or deleted.

mod index;
pub(crate) mod lock;
mod posts;

pub use index::{PostIndex, newest_first};
pub use posts::PostCache;
