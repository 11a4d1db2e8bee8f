//! Monthly per-category counts of classified records.

use crate::error::{HarvestError, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Key holding the per-month total in every bucket
pub const TOTAL_KEY: &str = "Total";

/// Column holding the month label in the CSV export
pub const MONTH_COLUMN: &str = "month";

/// Input date format
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Month label format, e.g. `Mar-20`
const MONTH_FORMAT: &str = "%b-%y";

/// Counts for one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryBucket {
    pub month: String,
    /// Category -> count, plus [`TOTAL_KEY`]
    pub counts: BTreeMap<String, usize>,
}

impl SummaryBucket {
    pub fn total(&self) -> usize {
        self.counts.get(TOTAL_KEY).copied().unwrap_or(0)
    }

    pub fn count(&self, category: &str) -> usize {
        self.counts.get(category).copied().unwrap_or(0)
    }
}

/// Group `(date, category)` pairs into month buckets, oldest month first.
///
/// Any unparseable date fails the whole summary.
pub fn summarize<'a, I>(entries: I) -> Result<Vec<SummaryBucket>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut months: BTreeMap<(i32, u32), SummaryBucket> = BTreeMap::new();

    for (date, category) in entries {
        let parsed = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|source| {
            HarvestError::DateParse {
                value: date.to_string(),
                source,
            }
        })?;

        let bucket = months
            .entry((parsed.year(), parsed.month()))
            .or_insert_with(|| SummaryBucket {
                month: parsed.format(MONTH_FORMAT).to_string(),
                counts: BTreeMap::new(),
            });
        *bucket.counts.entry(TOTAL_KEY.to_string()).or_insert(0) += 1;
        *bucket.counts.entry(category.to_string()).or_insert(0) += 1;
    }

    info!(months = months.len(), "Summary generated");
    Ok(months.into_values().collect())
}

/// CSV header: month, Total, then every category in sorted order.
pub fn summary_columns(buckets: &[SummaryBucket]) -> Vec<String> {
    let categories: BTreeSet<&str> = buckets
        .iter()
        .flat_map(|b| b.counts.keys())
        .map(String::as_str)
        .filter(|k| *k != TOTAL_KEY)
        .collect();

    [MONTH_COLUMN, TOTAL_KEY]
        .into_iter()
        .chain(categories)
        .map(str::to_string)
        .collect()
}

/// Write buckets as CSV; categories missing from a month are written as 0.
pub fn write_summary_csv(path: &Path, buckets: &[SummaryBucket]) -> Result<()> {
    let columns = summary_columns(buckets);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;

    for bucket in buckets {
        let row = columns.iter().map(|column| {
            if column == MONTH_COLUMN {
                bucket.month.clone()
            } else {
                bucket.count(column).to_string()
            }
        });
        writer.write_record(row)?;
    }

    writer.flush()?;
    info!(path = ?path, rows = buckets.len(), "Saved summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_same_month_two_categories() {
        let buckets = summarize([("2020-03-15", "A"), ("2020-03-20", "B")]).unwrap();

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].month, "Mar-20");
        assert_eq!(buckets[0].count("A"), 1);
        assert_eq!(buckets[0].count("B"), 1);
        assert_eq!(buckets[0].total(), 2);
    }

    #[test]
    fn test_months_are_chronological() {
        let buckets = summarize([
            ("2021-01-02", "A"),
            ("2020-12-31", "A"),
            ("2020-04-01", "B"),
            ("2020-12-01", "B"),
        ])
        .unwrap();

        let months: Vec<&str> = buckets.iter().map(|b| b.month.as_str()).collect();
        assert_eq!(months, vec!["Apr-20", "Dec-20", "Jan-21"]);
        assert_eq!(buckets[1].total(), 2);
        assert_eq!(buckets[1].count("A"), 1);
    }

    #[test]
    fn test_bad_date_is_fatal() {
        let result = summarize([("2020-03-15", "A"), ("15/03/2020", "B")]);
        match result {
            Err(HarvestError::DateParse { value, .. }) => assert_eq!(value, "15/03/2020"),
            other => panic!("expected DateParse, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        let none: [(&str, &str); 0] = [];
        assert!(summarize(none).unwrap().is_empty());
    }

    #[test]
    fn test_columns_and_csv() -> Result<()> {
        let buckets = summarize([("2020-03-15", "b"), ("2020-04-01", "a")])?;
        assert_eq!(summary_columns(&buckets), vec!["month", "Total", "a", "b"]);

        let dir = tempdir()?;
        let path = dir.path().join("summary.csv");
        write_summary_csv(&path, &buckets)?;

        let content = std::fs::read_to_string(&path)?;
        assert_eq!(content, "month,Total,a,b\nMar-20,1,0,1\nApr-20,1,1,0\n");
        Ok(())
    }
}
