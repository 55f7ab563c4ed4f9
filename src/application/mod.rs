//! Application services layer.

pub mod auth;
pub mod error;
pub mod jobs;
pub mod posts;
pub mod render;
pub mod repos;
pub mod sessions;
