//! Coding-platform profile cache: scrapers, refresh scheduling and a read-only JSON API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
