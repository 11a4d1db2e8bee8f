//! Record types returned by the source APIs.
//!
//! Records keep the fields the source sent: the fields the pipeline reads are
//! typed, everything else lands in a flattened `extra` map and is written
//! back unchanged. Typed text fields read `null` as `""`, and a `null` author
//! list is dropped on output. Author lists stay as raw JSON until [`Authored::authorship`]
//! decodes them, which keeps one malformed record from failing a whole page.

use crate::classifier::MatchVerdict;
use crate::error::{HarvestError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Author names and affiliation strings declared by a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorship {
    pub names: Vec<String>,
    pub affiliations: Vec<String>,
}

impl Authorship {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A record whose authors can be matched against the roster.
pub trait Authored {
    /// Identifier used in logs and error reports.
    fn record_id(&self) -> &str;

    /// Decode the author sub-structure.
    ///
    /// `Ok(None)` means the record declares no authors at all.
    fn authorship(&self) -> Result<Option<Authorship>>;
}

/// Treat JSON `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn malformed(id: &str, reason: impl Into<String>) -> HarvestError {
    HarvestError::RecordMatch {
        id: id.to_string(),
        reason: reason.into(),
    }
}

// === bioRxiv / medRxiv preprints ===

/// A COVID-19 preprint from the bioRxiv API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preprint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rel_doi: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rel_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rel_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rel_site: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rel_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rel_abs: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_authors: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PreprintAuthor {
    author_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    author_inst: String,
}

impl Authored for Preprint {
    fn record_id(&self) -> &str {
        &self.rel_doi
    }

    fn authorship(&self) -> Result<Option<Authorship>> {
        let Some(raw) = &self.rel_authors else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }

        let authors: Vec<PreprintAuthor> = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(&self.rel_doi, format!("bad rel_authors: {}", e)))?;

        Ok(Some(Authorship {
            names: authors.iter().map(|a| a.author_name.clone()).collect(),
            affiliations: authors.into_iter().map(|a| a.author_inst).collect(),
        }))
    }
}

// === Europe PMC papers ===

/// A journal paper from the Europe PMC search API (`resultType=core`).
///
/// Empty fields are not serialized, so a paper missing a field never blanks
/// it out when merged over another copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub doi: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub author_string: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub pub_year: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_list: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperAuthorList {
    #[serde(default)]
    author: Vec<PaperAuthor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperAuthor {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    collective_name: Option<String>,
    #[serde(default)]
    affiliation: Option<String>,
    #[serde(default)]
    author_affiliation_details_list: Option<AffiliationDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AffiliationDetails {
    #[serde(default)]
    author_affiliation: Vec<AffiliationDetail>,
}

#[derive(Debug, Deserialize)]
struct AffiliationDetail {
    #[serde(default)]
    affiliation: Option<String>,
}

impl Paper {
    /// Journal title from `journalInfo.journal.title`.
    pub fn journal_title(&self) -> &str {
        self.journal_info
            .as_ref()
            .and_then(|j| j.pointer("/journal/title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

impl Authored for Paper {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn authorship(&self) -> Result<Option<Authorship>> {
        let Some(raw) = &self.author_list else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }

        let list: PaperAuthorList = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(&self.id, format!("bad authorList: {}", e)))?;

        let mut authorship = Authorship::default();
        for author in list.author {
            if let Some(name) = author.full_name.or(author.collective_name) {
                authorship.names.push(name);
            }
            if let Some(affiliation) = author.affiliation {
                authorship.affiliations.push(affiliation);
            } else if let Some(details) = author.author_affiliation_details_list {
                authorship.affiliations.extend(
                    details
                        .author_affiliation
                        .into_iter()
                        .filter_map(|d| d.affiliation),
                );
            }
        }
        Ok(Some(authorship))
    }
}

/// A record together with the verdict it was classified under.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRecord<R> {
    #[serde(flatten)]
    pub record: R,
    pub verdict: MatchVerdict,
}
