//! rustroster - literature harvesting and roster matching
//!
//! ## Usage
//!
//! ### Preprints
//! ```bash
//! rustroster preprints --roster contacts.csv --data-dir data/covid
//! ```
//!
//! ### Papers
//! ```bash
//! rustroster papers --data-dir data
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rustroster::classifier::{MatchConfig, ThresholdRule, DEFAULT_EXACT_THRESHOLD, DEFAULT_FUZZY_THRESHOLD};
use rustroster::europepmc::{self, SearchField};
use rustroster::export::{self, MatchedPaperRow, PaperRow, PreprintRow};
use rustroster::record::{Paper, Preprint};
use rustroster::roster::{Roster, DEFAULT_ORG_ALIASES};
use rustroster::scheduler::{self, BatchOutcome};
use rustroster::{biorxiv, merge, snapshot, summary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Harvest literature and match authors against an organization roster
#[derive(Parser)]
#[command(name = "rustroster")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest COVID-19 preprints and keep those by roster members
    Preprints {
        /// Roster CSV with "Full Name" and "Affiliation" columns
        #[arg(long)]
        roster: PathBuf,

        /// Directory for snapshots and exports
        #[arg(long, default_value = "data/covid")]
        data_dir: PathBuf,

        /// Endpoint template; "{}" is replaced by the page cursor
        #[arg(long, default_value = biorxiv::DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Delay between page requests in milliseconds
        #[arg(long, default_value = "1000")]
        page_delay_ms: u64,

        /// Classify the stored raw snapshot instead of fetching
        #[arg(long)]
        offline: bool,

        #[command(flatten)]
        matching: MatchArgs,
    },

    /// Harvest Europe PMC papers acknowledging or affiliated with the organization
    Papers {
        /// Directory for exports
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Organization name variants to search for (comma-separated)
        #[arg(long, value_delimiter = ',')]
        terms: Vec<String>,

        /// Optional roster CSV; when given, merged papers are also matched
        #[arg(long)]
        roster: Option<PathBuf>,

        #[command(flatten)]
        matching: MatchArgs,
    },
}

#[derive(Args, Clone)]
struct MatchArgs {
    /// Number of matching workers (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Minimum fuzzy score for author and affiliation
    #[arg(long, default_value_t = DEFAULT_FUZZY_THRESHOLD)]
    fuzzy_threshold: u8,

    /// Minimum exact score for author and affiliation
    #[arg(long, default_value_t = DEFAULT_EXACT_THRESHOLD)]
    exact_threshold: u8,

    /// Accept author OR affiliation instead of requiring both
    #[arg(long)]
    either: bool,

    /// Organization alias (repeatable); replaces the built-in aliases
    #[arg(long = "alias")]
    aliases: Vec<String>,
}

impl MatchArgs {
    fn config(&self) -> MatchConfig {
        MatchConfig {
            fuzzy_threshold: self.fuzzy_threshold,
            exact_threshold: self.exact_threshold,
            rule: if self.either {
                ThresholdRule::Either
            } else {
                ThresholdRule::Both
            },
        }
    }

    fn workers(&self) -> usize {
        self.workers.unwrap_or_else(scheduler::default_workers)
    }

    fn load_roster(&self, path: &Path) -> Result<Arc<Roster>> {
        let roster = if self.aliases.is_empty() {
            Roster::load(path, DEFAULT_ORG_ALIASES)
        } else {
            Roster::load(path, self.aliases.as_slice())
        }
        .with_context(|| format!("Failed to load roster {}", path.display()))?;

        if roster.names.is_empty() {
            anyhow::bail!("Roster {} has no member names", path.display());
        }
        Ok(Arc::new(roster))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    match cli.command {
        Commands::Preprints {
            roster,
            data_dir,
            endpoint,
            page_delay_ms,
            offline,
            matching,
        } => {
            let options = biorxiv::FetchOptions {
                endpoint,
                page_delay: Duration::from_millis(page_delay_ms),
                ..Default::default()
            };
            run_preprint_pipeline(&roster, &data_dir, &options, offline, &matching).await
        }
        Commands::Papers {
            data_dir,
            terms,
            roster,
            matching,
        } => run_paper_pipeline(&data_dir, terms, roster.as_deref(), &matching).await,
    }
}

// ============================================================================
// Preprint Pipeline
// ============================================================================

async fn run_preprint_pipeline(
    roster_path: &Path,
    data_dir: &Path,
    options: &biorxiv::FetchOptions,
    offline: bool,
    matching: &MatchArgs,
) -> Result<()> {
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    let raw_path = data_dir.join("raw-preprints.json");

    // ===========================================
    // STAGE 1: Fetch & Growth Check
    // ===========================================
    let preprints: Vec<Preprint> = if offline {
        println!("\n--- Stage 1: Loading raw snapshot (offline) ---");
        snapshot::read_records(&raw_path)
            .with_context(|| format!("Failed to read {}", raw_path.display()))?
    } else {
        println!("\n--- Stage 1: bioRxiv Harvest ---");
        let source = biorxiv::BiorxivSource::new(options.endpoint.clone())?;
        let fetched = snapshot::refresh(&source, &raw_path, options.start_cursor, options.page_delay)
            .await
            .context("Preprint harvest failed")?;
        println!("Fetched {} preprints.", fetched.len());
        fetched
    };

    // ===========================================
    // STAGE 2: Roster Matching
    // ===========================================
    println!("\n--- Stage 2: Roster Matching ---");
    let roster = matching.load_roster(roster_path)?;
    let workers = matching.workers();
    println!(
        "Matching {} preprints against {} members ({} workers)...",
        preprints.len(),
        roster.names.len(),
        workers
    );

    let outcome = scheduler::classify_all(preprints, roster, &matching.config(), workers).await;
    report_outcome(&outcome);

    let mut matched = outcome.matched;
    matched.sort_by(|a, b| {
        (a.record.rel_date.as_str(), a.record.rel_doi.as_str())
            .cmp(&(b.record.rel_date.as_str(), b.record.rel_doi.as_str()))
    });

    // ===========================================
    // STAGE 3: Export
    // ===========================================
    println!("\n--- Stage 3: Export ---");
    export::save_json(&data_dir.join("preprints.json"), &matched)?;
    let rows: Vec<PreprintRow> = matched.iter().map(PreprintRow::from).collect();
    export::save_csv(&data_dir.join("preprints.csv"), &rows, export::PREPRINT_COLUMNS)?;
    println!("Saved {} matched preprints.", rows.len());

    // ===========================================
    // STAGE 4: Monthly Summary
    // ===========================================
    println!("\n--- Stage 4: Summary ---");
    let buckets = summary::summarize(
        matched
            .iter()
            .map(|c| (c.record.rel_date.as_str(), c.record.category.as_str())),
    )
    .context("Failed to summarize preprints")?;
    summary::write_summary_csv(&data_dir.join("preprints-summary.csv"), &buckets)?;
    println!("Summarized {} months.", buckets.len());

    println!("\n✓ Pipeline complete. Results in: {}", data_dir.display());
    Ok(())
}

fn report_outcome<R>(outcome: &BatchOutcome<R>) {
    println!(
        "Matched: {} | Not matched: {} | Skipped: {}",
        outcome.matched.len(),
        outcome.unmatched,
        outcome.skipped.len()
    );
    for skip in &outcome.skipped {
        println!("  skipped #{} ({}): {}", skip.index, skip.id, skip.reason);
    }
}

// ============================================================================
// Paper Pipeline
// ============================================================================

async fn run_paper_pipeline(
    data_dir: &Path,
    terms: Vec<String>,
    roster_path: Option<&Path>,
    matching: &MatchArgs,
) -> Result<()> {
    std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    let terms: Vec<String> = if terms.is_empty() {
        europepmc::DEFAULT_SEARCH_TERMS.iter().map(|t| t.to_string()).collect()
    } else {
        terms
    };
    let options = europepmc::QueryOptions::default();

    // ===========================================
    // STAGE 1: Funding Acknowledgements
    // ===========================================
    println!("\n--- Stage 1: Funding acknowledgements ---");
    let ack = europepmc::search(&europepmc::build_query(SearchField::AckFund, &terms), &options)
        .await
        .context("Acknowledgement search failed")?;
    save_papers(&data_dir.join("acknowledgements.csv"), &ack)?;

    // ===========================================
    // STAGE 2: Author Affiliations
    // ===========================================
    println!("\n--- Stage 2: Author affiliations ---");
    let aff = europepmc::search(&europepmc::build_query(SearchField::Aff, &terms), &options)
        .await
        .context("Affiliation search failed")?;
    save_papers(&data_dir.join("affiliations.csv"), &aff)?;

    // ===========================================
    // STAGE 3: Merge
    // ===========================================
    println!("\n--- Stage 3: Merge ---");
    let merged: Vec<Paper> = merge::merge_records("id", &[ack.as_slice(), aff.as_slice()])
        .context("Failed to merge paper sets")?;
    save_papers(&data_dir.join("papers.csv"), &merged)?;
    println!(
        "Merged {} + {} papers into {} distinct papers.",
        ack.len(),
        aff.len(),
        merged.len()
    );

    // ===========================================
    // STAGE 4: Roster Matching (optional)
    // ===========================================
    if let Some(path) = roster_path {
        println!("\n--- Stage 4: Roster Matching ---");
        let roster = matching.load_roster(path)?;
        let outcome = scheduler::classify_all(merged, roster, &matching.config(), matching.workers()).await;
        report_outcome(&outcome);

        let rows: Vec<MatchedPaperRow> = outcome.matched.iter().map(MatchedPaperRow::from).collect();
        export::save_csv(
            &data_dir.join("papers-roster.csv"),
            &rows,
            export::MATCHED_PAPER_COLUMNS,
        )?;
    } else {
        println!("\n--- Stage 4: Skipped (no --roster provided) ---");
    }

    println!("\n✓ Pipeline complete. Results in: {}", data_dir.display());
    Ok(())
}

fn save_papers(path: &Path, papers: &[Paper]) -> Result<()> {
    let rows: Vec<PaperRow> = papers.iter().map(PaperRow::from).collect();
    export::save_csv(path, &rows, export::PAPER_COLUMNS)?;
    println!("Saved {} papers to {}", rows.len(), path.display());
    info!(path = %path.display(), rows = rows.len(), "Paper export written");
    Ok(())
}
