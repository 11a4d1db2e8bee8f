//! Raw snapshot persistence and the growth invariant.
//!
//! Each run stores its raw fetch as a JSON array. The next run must fetch
//! strictly more records than that snapshot holds; anything else points at
//! an upstream regression and stops the run before it overwrites outputs.

use crate::error::{HarvestError, Result};
use crate::pagination::{self, PageSource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Read a JSON array of records.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<T> = serde_json::from_reader(reader)?;
    info!(path = ?path, records = records.len(), "Loaded snapshot");
    Ok(records)
}

/// Write records as a pretty-printed JSON array, replacing the file.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    info!(path = ?path, records = records.len(), "Saved snapshot");
    Ok(())
}

/// Number of records in the previous snapshot; 0 when none exists yet.
pub fn previous_count(path: &Path) -> Result<usize> {
    if !path.exists() {
        warn!(path = ?path, "No previous snapshot, treating as first run");
        return Ok(0);
    }
    let records: Vec<serde_json::Value> = read_records(path)?;
    Ok(records.len())
}

/// Require the new fetch to be strictly larger than the previous one.
pub fn check_growth(previous: usize, current: usize) -> Result<()> {
    if current <= previous {
        return Err(HarvestError::GrowthInvariant { previous, current });
    }
    info!(previous = previous, current = current, "Growth check passed");
    Ok(())
}

/// Drain `source` and replace the snapshot at `path` with the result.
///
/// The previous count is read first and the growth check runs before the
/// write, so a failed fetch or a shrinking extract leaves the old snapshot
/// untouched.
pub async fn refresh<S>(source: &S, path: &Path, start: u64, delay: Duration) -> Result<Vec<S::Item>>
where
    S: PageSource,
    S::Item: Serialize,
{
    let previous = previous_count(path)?;
    let fetched = pagination::drain(source, start, delay).await?;
    info!(previous = previous, fetched = fetched.len(), "Fetched new extract");

    check_growth(previous, fetched.len())?;
    write_records(path, &fetched)?;
    Ok(fetched)
}
