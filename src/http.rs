//! Shared HTTP plumbing for the source API clients.

use crate::error::{HarvestError, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// User agent sent to every source API
const USER_AGENT: &str = concat!("rustroster/", env!("CARGO_PKG_VERSION"));

/// Request timeout for a single page
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the HTTP client used for paged requests.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| HarvestError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// GET `url` and decode the JSON body.
///
/// Non-success statuses become `Api` errors and undecodable bodies become
/// `Parse` errors. There is no retry here.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    debug!(url = %url, "GET");
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let preview: String = body.chars().take(180).collect();
        return Err(HarvestError::Api {
            code: status.as_u16(),
            message: format!("GET {} returned {}: {}", url, status, preview),
        });
    }

    parse_body(url, &body)
}

/// Decode a response body, naming the URL in the error.
pub fn parse_body<T: DeserializeOwned>(url: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| HarvestError::Parse(format!("Invalid JSON from {}: {}", url, e)))
}
