//! CSV and JSON export of harvested and classified records.
//!
//! Every export overwrites its file. CSV column order is fixed by the row
//! structs below.

use crate::error::Result;
use crate::record::{Authored, ClassifiedRecord, Paper, Preprint};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Separator used when flattening lists into one CSV cell
const LIST_SEPARATOR: &str = "; ";

/// Column order of the preprint export
pub const PREPRINT_COLUMNS: &[&str] = &[
    "site",
    "doi",
    "date",
    "link",
    "title",
    "authors",
    "affiliations",
    "abstract",
    "category",
    "author_similarity",
    "affiliation_similarity",
    "match_type",
];

/// Column order of the paper export
pub const PAPER_COLUMNS: &[&str] = &[
    "id",
    "doi",
    "title",
    "authorString",
    "authorAffiliations",
    "journalTitle",
    "pubYear",
    "abstract",
];

/// One line of the preprint CSV.
#[derive(Debug, Clone, Serialize)]
pub struct PreprintRow {
    pub site: String,
    pub doi: String,
    pub date: String,
    pub link: String,
    pub title: String,
    pub authors: String,
    pub affiliations: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub category: String,
    pub author_similarity: u8,
    pub affiliation_similarity: u8,
    pub match_type: String,
}

impl From<&ClassifiedRecord<Preprint>> for PreprintRow {
    fn from(c: &ClassifiedRecord<Preprint>) -> Self {
        let p = &c.record;
        // Authors were decoded successfully during classification.
        let authorship = p.authorship().ok().flatten().unwrap_or_default();
        Self {
            site: p.rel_site.clone(),
            doi: p.rel_doi.clone(),
            date: p.rel_date.clone(),
            link: p.rel_link.clone(),
            title: p.rel_title.clone(),
            authors: authorship.names.join(LIST_SEPARATOR),
            affiliations: authorship.affiliations.join(LIST_SEPARATOR),
            abstract_text: p.rel_abs.clone(),
            category: p.category.clone(),
            author_similarity: c.verdict.author_score(),
            affiliation_similarity: c.verdict.affiliation_score(),
            match_type: c.verdict.match_type.to_string(),
        }
    }
}

/// One line of the paper CSV.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRow {
    pub id: String,
    pub doi: String,
    pub title: String,
    pub author_string: String,
    pub author_affiliations: String,
    pub journal_title: String,
    pub pub_year: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl From<&Paper> for PaperRow {
    fn from(p: &Paper) -> Self {
        let affiliations = match p.authorship() {
            Ok(authorship) => authorship.unwrap_or_default().affiliations,
            Err(e) => {
                warn!(id = %p.id, error = %e, "Exporting paper without affiliations");
                Vec::new()
            }
        };
        Self {
            id: p.id.clone(),
            doi: doi_url(&p.doi),
            title: p.title.clone(),
            author_string: p.author_string.clone(),
            author_affiliations: affiliations.join(LIST_SEPARATOR),
            journal_title: p.journal_title().to_string(),
            pub_year: p.pub_year.clone(),
            abstract_text: strip_html_tags(&p.abstract_text),
        }
    }
}

/// A paper line plus the roster verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPaperRow {
    pub id: String,
    pub doi: String,
    pub title: String,
    pub author_string: String,
    pub author_affiliations: String,
    pub journal_title: String,
    pub pub_year: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(rename = "author_similarity")]
    pub author_similarity: u8,
    #[serde(rename = "affiliation_similarity")]
    pub affiliation_similarity: u8,
    #[serde(rename = "match_type")]
    pub match_type: String,
}

impl From<&ClassifiedRecord<Paper>> for MatchedPaperRow {
    fn from(c: &ClassifiedRecord<Paper>) -> Self {
        let row = PaperRow::from(&c.record);
        Self {
            id: row.id,
            doi: row.doi,
            title: row.title,
            author_string: row.author_string,
            author_affiliations: row.author_affiliations,
            journal_title: row.journal_title,
            pub_year: row.pub_year,
            abstract_text: row.abstract_text,
            author_similarity: c.verdict.author_score(),
            affiliation_similarity: c.verdict.affiliation_score(),
            match_type: c.verdict.match_type.to_string(),
        }
    }
}

/// Column order of the matched paper export
pub const MATCHED_PAPER_COLUMNS: &[&str] = &[
    "id",
    "doi",
    "title",
    "authorString",
    "authorAffiliations",
    "journalTitle",
    "pubYear",
    "abstract",
    "author_similarity",
    "affiliation_similarity",
    "match_type",
];

/// Resolve a bare DOI to its doi.org URL; empty stays empty.
pub fn doi_url(doi: &str) -> String {
    let doi = doi.trim();
    if doi.is_empty() {
        String::new()
    } else {
        format!("https://doi.org/{}", doi)
    }
}

/// Strip HTML tags from text
pub fn strip_html_tags(text: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let re = TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));
    re.replace_all(text, "").to_string()
}

/// Save rows to a CSV file under a fixed header.
///
/// `columns` must list the row's fields in declaration order. The header is
/// written even when there are no rows.
pub fn save_csv<T: Serialize>(path: &Path, rows: &[T], columns: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = ?path, rows = rows.len(), "Saved CSV");
    Ok(())
}

/// Save a value as pretty-printed JSON.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    info!(path = ?path, "Saved JSON");
    Ok(())
}
