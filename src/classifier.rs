//! Roster membership classification for a single record.
//!
//! Each record gets two score pairs, one from the fuzzy policy and one from
//! the exact policy. Author names are only scored against roster names and
//! affiliations only against roster affiliations.

use crate::error::Result;
use crate::record::{Authored, Authorship};
use crate::roster::Roster;
use crate::similarity::{ExactPolicy, SimilarityPolicy, TokenSetPolicy};
use serde::{Deserialize, Serialize};

/// Default minimum fuzzy score for author and affiliation.
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 95;

/// Default minimum exact score for author and affiliation.
pub const DEFAULT_EXACT_THRESHOLD: u8 = 90;

/// How the author and affiliation thresholds combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdRule {
    /// Author AND affiliation must pass
    #[default]
    Both,
    /// Author OR affiliation is enough
    Either,
}

/// Thresholds used to turn scores into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    pub fuzzy_threshold: u8,
    pub exact_threshold: u8,
    pub rule: ThresholdRule,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            exact_threshold: DEFAULT_EXACT_THRESHOLD,
            rule: ThresholdRule::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Fuzzy,
    Exact,
    None,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MatchType::Fuzzy => "fuzzy",
            MatchType::Exact => "exact",
            MatchType::None => "none",
        };
        f.write_str(label)
    }
}

/// Best author and affiliation scores under one policy (0-100).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePair {
    pub author: u8,
    pub affiliation: u8,
}

impl ScorePair {
    fn passes(&self, threshold: u8, rule: ThresholdRule) -> bool {
        match rule {
            ThresholdRule::Both => self.author >= threshold && self.affiliation >= threshold,
            ThresholdRule::Either => self.author >= threshold || self.affiliation >= threshold,
        }
    }
}

/// Outcome of classifying one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub match_type: MatchType,
    pub fuzzy: ScorePair,
    pub exact: ScorePair,
    fuzzy_pass: bool,
    exact_pass: bool,
}

impl MatchVerdict {
    /// Verdict for a record without authors.
    pub fn unmatched() -> Self {
        Self {
            match_type: MatchType::None,
            fuzzy: ScorePair::default(),
            exact: ScorePair::default(),
            fuzzy_pass: false,
            exact_pass: false,
        }
    }

    fn from_scores(fuzzy: ScorePair, exact: ScorePair, config: &MatchConfig) -> Self {
        let fuzzy_pass = fuzzy.passes(config.fuzzy_threshold, config.rule);
        let exact_pass = exact.passes(config.exact_threshold, config.rule);
        let match_type = if fuzzy_pass {
            MatchType::Fuzzy
        } else if exact_pass {
            MatchType::Exact
        } else {
            MatchType::None
        };
        Self {
            match_type,
            fuzzy,
            exact,
            fuzzy_pass,
            exact_pass,
        }
    }

    pub fn is_match(&self) -> bool {
        self.match_type != MatchType::None
    }

    /// The fuzzy policy passed, regardless of `match_type`.
    pub fn is_fuzzy(&self) -> bool {
        self.fuzzy_pass
    }

    /// The exact policy passed, regardless of `match_type`.
    pub fn is_exact(&self) -> bool {
        self.exact_pass
    }

    /// Scores that justified `match_type`.
    fn justifying(&self) -> &ScorePair {
        match self.match_type {
            MatchType::Exact => &self.exact,
            MatchType::Fuzzy | MatchType::None => &self.fuzzy,
        }
    }

    pub fn author_score(&self) -> u8 {
        self.justifying().author
    }

    pub fn affiliation_score(&self) -> u8 {
        self.justifying().affiliation
    }
}

/// Max over candidates of the policy's best score against the references.
fn best_over<P: SimilarityPolicy>(policy: &P, candidates: &[String], references: &[String]) -> u8 {
    candidates
        .iter()
        .map(|c| policy.best(c, references))
        .max()
        .unwrap_or(0)
}

fn score_pair<P: SimilarityPolicy>(policy: &P, authorship: &Authorship, roster: &Roster) -> ScorePair {
    ScorePair {
        author: best_over(policy, &authorship.names, &roster.names),
        affiliation: best_over(policy, &authorship.affiliations, &roster.affiliations),
    }
}

/// Classify an already decoded authorship against the roster.
pub fn classify(authorship: Option<&Authorship>, roster: &Roster, config: &MatchConfig) -> MatchVerdict {
    let Some(authorship) = authorship.filter(|a| !a.is_empty()) else {
        return MatchVerdict::unmatched();
    };

    let fuzzy = score_pair(&TokenSetPolicy, authorship, roster);
    let exact = score_pair(&ExactPolicy, authorship, roster);
    MatchVerdict::from_scores(fuzzy, exact, config)
}

/// Decode a record's authors and classify it.
///
/// Fails with `RecordMatch` when the author sub-structure is malformed.
pub fn classify_record<R: Authored>(record: &R, roster: &Roster, config: &MatchConfig) -> Result<MatchVerdict> {
    let authorship = record.authorship()?;
    Ok(classify(authorship.as_ref(), roster, config))
}
