//! bioRxiv / medRxiv COVID-19 preprint API client.
//!
//! The endpoint pages with a cursor in the path and reports a
//! `{cursor, count, total}` triple in `messages[0]`:
//!
//! ```text
//! GET https://api.biorxiv.org/covid19/{cursor}
//! { "messages": [{"status": "ok", "cursor": 0, "count": 30, "total": 24410}],
//!   "collection": [ ...preprints... ] }
//! ```

use crate::error::{OptionExt, Result};
use crate::http;
use crate::pagination::{self, Page, PageSource, PageWindow};
use crate::record::Preprint;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::info;

/// Default COVID-19 endpoint; `{}` is replaced by the cursor.
pub const DEFAULT_ENDPOINT: &str = "https://api.biorxiv.org/covid19/{}";

/// Pause between page requests to stay within the provider's rate limit
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

/// Fetch options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Endpoint template with a `{}` cursor placeholder
    pub endpoint: String,
    /// Cursor of the first page
    pub start_cursor: u64,
    /// Delay between page requests
    pub page_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            start_cursor: 0,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BiorxivResponse {
    #[serde(default)]
    messages: Vec<BiorxivMessage>,
    #[serde(default)]
    collection: Vec<Preprint>,
}

#[derive(Debug, Deserialize)]
struct BiorxivMessage {
    #[serde(deserialize_with = "number_or_string")]
    cursor: u64,
    #[serde(deserialize_with = "number_or_string")]
    count: u64,
    #[serde(deserialize_with = "number_or_string")]
    total: u64,
}

/// The API reports counters as numbers or as numeric strings.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Page source backed by the HTTP API.
pub struct BiorxivSource {
    client: Client,
    endpoint: String,
}

impl BiorxivSource {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: http::build_client()?,
            endpoint: endpoint.into(),
        })
    }

    fn page_url(&self, cursor: u64) -> String {
        self.endpoint.replacen("{}", &cursor.to_string(), 1)
    }
}

impl PageSource for BiorxivSource {
    type Item = Preprint;

    async fn fetch_page(&self, cursor: u64) -> Result<Page<Preprint>> {
        let url = self.page_url(cursor);
        info!(url = %url, "Retrieving preprints");
        let response: BiorxivResponse = http::get_json(&self.client, &url).await?;
        into_page(response)
    }
}

fn into_page(response: BiorxivResponse) -> Result<Page<Preprint>> {
    let message = response
        .messages
        .into_iter()
        .next()
        .ok_or_parse("bioRxiv response has no pagination message")?;

    Ok(Page {
        window: PageWindow {
            cursor: message.cursor,
            count: message.count,
            total: message.total,
        },
        items: response.collection,
    })
}

/// Drain the whole collection.
pub async fn fetch_all(options: &FetchOptions) -> Result<Vec<Preprint>> {
    info!(endpoint = %options.endpoint, "Starting bioRxiv harvest");
    let source = BiorxivSource::new(options.endpoint.clone())?;
    pagination::drain(&source, options.start_cursor, options.page_delay).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parse_body;

    #[test]
    fn test_page_url() {
        let source = BiorxivSource::new(DEFAULT_ENDPOINT).unwrap();
        assert_eq!(source.page_url(60), "https://api.biorxiv.org/covid19/60");
    }

    #[test]
    fn test_parse_page_with_string_counters() {
        let body = r#"{
            "messages": [{"status": "ok", "cursor": "30", "count": "2", "total": "32"}],
            "collection": [
                {"rel_doi": "10.1101/a", "rel_date": "2020-03-15", "category": "epidemiology",
                 "rel_authors": [{"author_name": "Jane Doe", "author_inst": "Acme University"}]},
                {"rel_doi": "10.1101/b", "rel_date": "2020-03-20", "category": "infectious diseases",
                 "rel_authors": []}
            ]
        }"#;

        let page = into_page(parse_body(DEFAULT_ENDPOINT, body).unwrap()).unwrap();
        assert_eq!(page.window, PageWindow { cursor: 30, count: 2, total: 32 });
        assert!(page.window.is_last());
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].category, "epidemiology");
    }

    #[test]
    fn test_missing_messages_is_parse_error() {
        let body = r#"{"collection": []}"#;
        let err = into_page(parse_body(DEFAULT_ENDPOINT, body).unwrap()).unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[test]
    fn test_non_numeric_counter_is_rejected() {
        let body = r#"{"messages": [{"cursor": "x", "count": 1, "total": 1}], "collection": []}"#;
        assert!(parse_body::<BiorxivResponse>(DEFAULT_ENDPOINT, body).is_err());
    }
}
