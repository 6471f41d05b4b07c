use std::time::Duration;

use reqwest::{Client, header};

use crate::config::HttpClientSettings;

use super::error::InfraError;

/// Build the outbound client shared by every scraper.
///
/// One client keeps a single connection pool; per-request timeouts come from settings.
pub fn build_client(settings: &HttpClientSettings) -> Result<Client, InfraError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en-US,en;q=0.9"),
    );

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(settings.timeout.get()))
        .connect_timeout(Duration::from_secs(settings.timeout.get().min(10)))
        .build()
        .map_err(|err| InfraError::http_client(err.to_string()))
}
