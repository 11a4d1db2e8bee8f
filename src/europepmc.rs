//! Europe PMC REST search client.
//!
//! Europe PMC pages with an opaque `cursorMark` token and reports the total
//! hit count on every page. Harvesting stops once `hitCount` records have
//! been collected, a page comes back empty, or the cursor stops advancing.

use crate::error::Result;
use crate::http;
use crate::record::Paper;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Europe PMC search endpoint
const EPMC_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// Largest page size the API accepts
const PAGE_SIZE: usize = 1000;

/// Cursor token for the first page
const FIRST_CURSOR: &str = "*";

/// Organization name variants searched for by default
pub const DEFAULT_SEARCH_TERMS: &[&str] = &["HDRUK", "HDR UK", "HDR-UK", "Health Data Research UK"];

/// Europe PMC search fields used to build queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// Funding acknowledgement text
    AckFund,
    /// Author affiliation
    Aff,
}

impl SearchField {
    fn as_str(&self) -> &'static str {
        match self {
            SearchField::AckFund => "ACK_FUND",
            SearchField::Aff => "AFF",
        }
    }
}

/// Build an OR query over `terms` in one search field, e.g.
/// `AFF:"HDR UK" OR AFF:"HDRUK"`.
pub fn build_query<S: AsRef<str>>(field: SearchField, terms: &[S]) -> String {
    terms
        .iter()
        .map(|t| format!("{}:\"{}\"", field.as_str(), t.as_ref()))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Query options for Europe PMC search
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Results per page
    pub page_size: usize,
    /// Delay between page requests
    pub page_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            page_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpmcResponse {
    #[serde(default)]
    hit_count: u64,
    #[serde(default)]
    next_cursor_mark: Option<String>,
    #[serde(default)]
    result_list: EpmcResultList,
}

#[derive(Debug, Default, Deserialize)]
struct EpmcResultList {
    #[serde(default)]
    result: Vec<Paper>,
}

/// Build the search URL for one page.
fn build_search_url(query: &str, cursor: &str, page_size: usize) -> String {
    format!(
        "{}?resultType=core&format=json&pageSize={}&query={}&cursorMark={}",
        EPMC_SEARCH_URL,
        page_size,
        urlencoding::encode(query),
        urlencoding::encode(cursor)
    )
}

/// Decide where to go after a page. `None` ends the harvest.
fn next_cursor(current: &str, response: &EpmcResponse, collected: usize, page_len: usize) -> Option<String> {
    if page_len == 0 || collected as u64 >= response.hit_count {
        return None;
    }
    match &response.next_cursor_mark {
        Some(next) if next != current => Some(next.clone()),
        _ => {
            warn!(
                collected = collected,
                hit_count = response.hit_count,
                "Cursor did not advance before hitCount was reached"
            );
            None
        }
    }
}

/// Run a search and collect every page of results.
pub async fn search(query: &str, options: &QueryOptions) -> Result<Vec<Paper>> {
    let client: Client = http::build_client()?;
    info!(query = query, "Starting Europe PMC query");

    let mut papers: Vec<Paper> = Vec::new();
    let mut cursor = FIRST_CURSOR.to_string();

    loop {
        let url = build_search_url(query, &cursor, options.page_size);
        info!(url = %url, "Retrieving papers");
        let response: EpmcResponse = http::get_json(&client, &url).await?;

        let page_len = response.result_list.result.len();
        debug!(hit_count = response.hit_count, page = page_len, "Parsed Europe PMC page");

        let next = {
            let collected = papers.len() + page_len;
            next_cursor(&cursor, &response, collected, page_len)
        };
        papers.extend(response.result_list.result);

        match next {
            Some(next) => {
                cursor = next;
                if !options.page_delay.is_zero() {
                    tokio::time::sleep(options.page_delay).await;
                }
            }
            None => break,
        }
    }

    info!(total = papers.len(), "Europe PMC query complete");
    Ok(papers)
}
