//! Application services: scraping, refresh orchestration and the read side.

pub mod error;
pub mod jobs;
pub mod profiles;
pub mod refresh;
pub mod scrape;
pub mod scrapers;
