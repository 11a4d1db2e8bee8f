//! # rustroster
//!
//! Harvests papers and preprints from paginated literature APIs and matches
//! their authors and affiliations against an organization roster.
//!
//! ## Modules
//!
//! - [`pagination`] - Cursor/count/total page draining
//! - [`biorxiv`] - bioRxiv / medRxiv COVID-19 preprint API client
//! - [`europepmc`] - Europe PMC search client
//! - [`similarity`] - Fuzzy and exact string similarity policies
//! - [`roster`] - Roster loading
//! - [`classifier`] - Per-record roster verdicts
//! - [`scheduler`] - Parallel classification over a worker pool
//! - [`merge`] - Keyed merge of record collections
//! - [`summary`] - Monthly per-category counts
//! - [`snapshot`] - Raw snapshots and the growth invariant
//! - [`export`] - CSV and JSON output
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustroster::{biorxiv, classifier::MatchConfig, roster::Roster, scheduler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let preprints = biorxiv::fetch_all(&Default::default()).await?;
//!     let roster = Roster::load("contacts.csv".as_ref(), rustroster::roster::DEFAULT_ORG_ALIASES)?;
//!     let outcome = scheduler::classify_all(
//!         preprints,
//!         Arc::new(roster),
//!         &MatchConfig::default(),
//!         scheduler::default_workers(),
//!     )
//!     .await;
//!     println!("{} preprints matched", outcome.matched.len());
//!     Ok(())
//! }
//! ```

pub mod biorxiv;
pub mod classifier;
pub mod error;
pub mod europepmc;
pub mod export;
pub mod http;
pub mod merge;
pub mod pagination;
pub mod record;
pub mod roster;
pub mod scheduler;
pub mod similarity;
pub mod snapshot;
pub mod summary;

pub use error::{HarvestError, Result};
