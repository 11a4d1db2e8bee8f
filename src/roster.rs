//! Organization roster loading.
//!
//! The roster is a CSV of known members with at least `Full Name` and
//! `Affiliation` columns. It is loaded once per run and shared read-only
//! between matching workers.

use crate::error::Result;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Organization name variants that always count as an affiliation hit.
pub const DEFAULT_ORG_ALIASES: &[&str] = &[
    "HDRUK",
    "HDR UK",
    "HDR-UK",
    "HEALTH DATA RESEARCH UK",
    "HEALTH DATA RESEARCH UK LTD",
];

/// One row of the roster file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "Full Name", default)]
    pub full_name: String,
    #[serde(rename = "Affiliation", default)]
    pub affiliation: String,
}

/// Reference strings the classifier scores against.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Member names in file order
    pub names: Vec<String>,
    /// Distinct affiliations in first-seen order, followed by the aliases
    pub affiliations: Vec<String>,
}

impl Roster {
    /// Build a roster from entries and organization aliases.
    ///
    /// Blank names and blank affiliations are dropped; affiliations are
    /// deduplicated.
    pub fn from_entries<S: AsRef<str>>(entries: &[RosterEntry], aliases: &[S]) -> Self {
        let names = entries
            .iter()
            .map(|e| e.full_name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        let mut affiliations: Vec<String> = entries
            .iter()
            .map(|e| e.affiliation.trim())
            .filter(|a| !a.is_empty() && seen.insert(a.to_string()))
            .map(str::to_string)
            .collect();
        affiliations.extend(aliases.iter().map(|a| a.as_ref().to_string()));

        Self {
            names,
            affiliations,
        }
    }

    /// Load the roster CSV.
    pub fn load<S: AsRef<str>>(path: &Path, aliases: &[S]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;

        let entries = reader
            .deserialize()
            .collect::<std::result::Result<Vec<RosterEntry>, csv::Error>>()?;
        debug!(rows = entries.len(), path = ?path, "Read roster rows");

        let roster = Self::from_entries(&entries, aliases);
        info!(
            names = roster.names.len(),
            affiliations = roster.affiliations.len(),
            "Roster loaded"
        );
        Ok(roster)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.affiliations.is_empty()
    }
}
