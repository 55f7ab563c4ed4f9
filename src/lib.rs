//! Flat-file markdown blog with a snapshot post cache and an expiring session store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
