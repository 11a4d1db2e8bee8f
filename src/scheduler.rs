//! Parallel roster matching over a fixed-size worker pool.
//!
//! Every record becomes one task on tokio's blocking pool (classification is
//! CPU-bound). At most `workers` tasks run at once. The roster sits behind a
//! single `Arc` created by the caller, so tasks share it without copying or
//! locking. Results come back in completion order.

use crate::classifier::{classify_record, MatchConfig};
use crate::error::HarvestError;
use crate::record::{Authored, ClassifiedRecord};
use crate::roster::Roster;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A record that could not be classified.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub index: usize,
    pub id: String,
    pub reason: String,
}

/// Result of one scheduling run.
#[derive(Debug)]
pub struct BatchOutcome<R> {
    /// Records with a `Fuzzy` or `Exact` verdict, in no particular order
    pub matched: Vec<ClassifiedRecord<R>>,
    /// Records whose classification failed
    pub skipped: Vec<SkippedRecord>,
    /// Records classified as `None`
    pub unmatched: usize,
}

impl<R> BatchOutcome<R> {
    pub fn processed(&self) -> usize {
        self.matched.len() + self.skipped.len() + self.unmatched
    }
}

/// Worker count matching the host's available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

enum TaskResult<R> {
    Matched(ClassifiedRecord<R>),
    Unmatched,
    Skipped(SkippedRecord),
}

/// Classify every record against the roster and keep the matches.
///
/// A failing record (malformed authors, or a panicking task) is logged and
/// reported in `skipped`; the rest of the batch still runs.
pub async fn classify_all<R>(
    records: Vec<R>,
    roster: Arc<Roster>,
    config: &MatchConfig,
    workers: usize,
) -> BatchOutcome<R>
where
    R: Authored + Send + 'static,
{
    let workers = workers.max(1);
    let total = records.len();
    let config = *config;
    info!(records = total, workers = workers, "Starting roster matching");

    let results: Vec<TaskResult<R>> = stream::iter(records.into_iter().enumerate())
        .map(|(index, record)| {
            let roster = Arc::clone(&roster);
            async move {
                let id = record.record_id().to_string();
                let task = tokio::task::spawn_blocking(move || {
                    let verdict = classify_record(&record, &roster, &config);
                    (record, verdict)
                });

                match task.await {
                    Ok((record, Ok(verdict))) => {
                        debug!(
                            index = index,
                            id = %id,
                            author = verdict.fuzzy.author,
                            affiliation = verdict.fuzzy.affiliation,
                            match_type = %verdict.match_type,
                            "Classified record"
                        );
                        if verdict.is_match() {
                            TaskResult::Matched(ClassifiedRecord { record, verdict })
                        } else {
                            TaskResult::Unmatched
                        }
                    }
                    Ok((_, Err(e))) => skipped(index, id, &e),
                    Err(join_error) => {
                        let e = HarvestError::RecordMatch {
                            id: id.clone(),
                            reason: format!("matching task failed: {}", join_error),
                        };
                        skipped(index, id, &e)
                    }
                }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut outcome = BatchOutcome {
        matched: Vec::new(),
        skipped: Vec::new(),
        unmatched: 0,
    };
    for result in results {
        match result {
            TaskResult::Matched(record) => outcome.matched.push(record),
            TaskResult::Unmatched => outcome.unmatched += 1,
            TaskResult::Skipped(skip) => outcome.skipped.push(skip),
        }
    }

    info!(
        total = total,
        matched = outcome.matched.len(),
        unmatched = outcome.unmatched,
        skipped = outcome.skipped.len(),
        "Roster matching complete"
    );
    outcome
}

fn skipped<R>(index: usize, id: String, error: &HarvestError) -> TaskResult<R> {
    warn!(index = index, id = %id, error = %error, "Skipping record");
    TaskResult::Skipped(SkippedRecord {
        index,
        id,
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MatchType;
    use crate::error::Result;
    use crate::record::{Authorship, Preprint};
    use crate::roster::RosterEntry;
    use serde_json::json;

    fn roster() -> Arc<Roster> {
        let entries = vec![
            RosterEntry {
                full_name: "Jane Doe".to_string(),
                affiliation: "Acme University".to_string(),
            },
            RosterEntry {
                full_name: "Ann Lee".to_string(),
                affiliation: "Institute of Data".to_string(),
            },
        ];
        Arc::new(Roster::from_entries(&entries, &["HDR UK"]))
    }

    fn preprint(doi: &str, authors: serde_json::Value) -> Preprint {
        serde_json::from_value(json!({"rel_doi": doi, "rel_authors": authors})).unwrap()
    }

    fn batch() -> Vec<Preprint> {
        vec![
            preprint("10.1/match", json!([{"author_name": "J. Doe", "author_inst": "Acme Univ."}])),
            preprint("10.1/none", json!([{"author_name": "John Smith", "author_inst": "Unrelated Institute"}])),
            preprint("10.1/bad", json!("not a list")),
            preprint("10.1/alias", json!([{"author_name": "Ann Lee", "author_inst": "HDR UK, London"}])),
            preprint("10.1/empty", json!(null)),
        ]
    }

    fn sorted_dois(outcome: &BatchOutcome<Preprint>) -> Vec<String> {
        let mut dois: Vec<String> = outcome.matched.iter().map(|c| c.record.rel_doi.clone()).collect();
        dois.sort();
        dois
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_classify_all_keeps_matches_and_skips_bad_records() {
        let outcome = classify_all(batch(), roster(), &MatchConfig::default(), 4).await;

        assert_eq!(sorted_dois(&outcome), vec!["10.1/alias", "10.1/match"]);
        assert_eq!(outcome.unmatched, 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].id, "10.1/bad");
        assert_eq!(outcome.skipped[0].index, 2);
        assert_eq!(outcome.processed(), 5);
    }

    #[tokio::test]
    async fn test_result_set_independent_of_worker_count() {
        let single = classify_all(batch(), roster(), &MatchConfig::default(), 1).await;
        let many = classify_all(batch(), roster(), &MatchConfig::default(), 8).await;
        let zero = classify_all(batch(), roster(), &MatchConfig::default(), 0).await;

        assert_eq!(sorted_dois(&single), sorted_dois(&many));
        assert_eq!(sorted_dois(&single), sorted_dois(&zero));
    }

    #[tokio::test]
    async fn test_matched_records_carry_verdict() {
        let outcome = classify_all(batch(), roster(), &MatchConfig::default(), 2).await;
        let fuzzy = outcome
            .matched
            .iter()
            .find(|c| c.record.rel_doi == "10.1/match")
            .unwrap();
        assert_eq!(fuzzy.verdict.match_type, MatchType::Fuzzy);
        assert!(fuzzy.verdict.author_score() >= 95);
    }

    struct Exploding;

    impl Authored for Exploding {
        fn record_id(&self) -> &str {
            "boom"
        }

        fn authorship(&self) -> Result<Option<Authorship>> {
            panic!("corrupt record");
        }
    }

    #[tokio::test]
    async fn test_panicking_task_is_isolated() {
        let outcome = classify_all(vec![Exploding, Exploding], roster(), &MatchConfig::default(), 2).await;
        assert_eq!(outcome.skipped.len(), 2);
        assert!(outcome.matched.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let outcome = classify_all(Vec::<Preprint>::new(), roster(), &MatchConfig::default(), 4).await;
        assert_eq!(outcome.processed(), 0);
    }
}
