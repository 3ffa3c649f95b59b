//! filecensus - Incremental filesystem indexer.
//!
//! Usage:
//!   fcensus index [ROOTS..]     Index roots into the database
//!   fcensus volumes             Reconcile and list known volumes
//!   fcensus stats               Show database row counts
//!   fcensus --help              Show help

use std::path::{Path, PathBuf};
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use filecensus_core::{IndexConfig, IndexStore, default_database};
use filecensus_scan::{IndexSummary, Indexer, MetadataProvider, ScanProgress};
use filecensus_store::SqliteStore;
use filecensus_volume::{SysfsEnumerator, VolumeReconciler};

#[derive(Parser)]
#[command(
    name = "filecensus",
    version,
    about = "Incremental filesystem indexer",
    long_about = "filecensus records every file under the given roots in a SQLite \
                  database: where it lives, its size, timestamps, content hash and \
                  descriptive attributes. Re-runs only rehash what changed."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index one or more roots
    Index {
        /// Roots to index (defaults to the config file's roots, then ".")
        roots: Vec<PathBuf>,

        /// Database file
        #[arg(long)]
        db: Option<PathBuf>,

        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hashing threads (0 = one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Print progress while walking
        #[arg(short, long)]
        progress: bool,
    },

    /// Reconcile mounted volumes with the database and list them
    Volumes {
        /// Database file
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how many records the database holds
    Stats {
        /// Database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Index {
            roots,
            db,
            config,
            threads,
            progress,
        } => {
            let config = build_config(roots, db, config.as_deref(), threads)?;
            run_index(&config, progress)?;
        }
        Command::Volumes { db, format } => {
            run_volumes(&db.unwrap_or_else(default_database), format)?;
        }
        Command::Stats { db } => {
            run_stats(&db.unwrap_or_else(default_database))?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Config file values, then command-line overrides.
fn build_config(
    roots: Vec<PathBuf>,
    db: Option<PathBuf>,
    config_file: Option<&Path>,
    threads: Option<usize>,
) -> Result<IndexConfig> {
    let mut config = match config_file {
        Some(path) => IndexConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if !roots.is_empty() {
        config.roots = roots;
    }
    if config.roots.is_empty() {
        config.roots.push(PathBuf::from("."));
    }
    if let Some(db) = db {
        config.database = db;
    }
    if let Some(threads) = threads {
        config.threads = threads;
    }
    config.validate()?;
    Ok(config)
}

/// Run one indexing pass and print the summary.
fn run_index(config: &IndexConfig, show_progress: bool) -> Result<()> {
    let store = SqliteStore::open(&config.database).context("Cannot open database")?;
    let enumerator = SysfsEnumerator::new();
    let provider = MetadataProvider::new();

    eprintln!("Indexing into {}...", config.database.display());

    let indexer = Indexer::new(&store, &enumerator, &provider, config)?;
    let listener = show_progress.then(|| {
        let mut rx = indexer.subscribe();
        thread::spawn(move || {
            loop {
                match rx.blocking_recv() {
                    Ok(progress) => print_progress(&progress),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let result = indexer.run();
    drop(indexer);
    if let Some(handle) = listener {
        let _ = handle.join();
    }

    let summary = result.context("Indexing aborted")?;
    print_summary(&summary);
    Ok(())
}

fn print_progress(progress: &ScanProgress) {
    eprintln!(
        "  {} files ({} written), {} dirs, {} hashed  {}",
        progress.files_seen,
        progress.files_written,
        progress.dirs_visited,
        format_size(progress.bytes_hashed),
        progress.current_path.display()
    );
}

fn print_summary(summary: &IndexSummary) {
    let reconciliation = &summary.reconciliation;

    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} volumes ({} new, {} reused, {} superseded)",
        reconciliation.active.len(),
        reconciliation.created,
        reconciliation.reused,
        reconciliation.superseded.len()
    );
    println!("{}", "─".repeat(60));

    for report in &summary.reports {
        let stats = &report.stats;
        println!(" {}", report.root.display());
        println!(
            "   {} inserted, {} updated, {} unchanged, {} failed",
            stats.files_inserted, stats.files_updated, stats.files_unchanged, stats.files_failed
        );
        println!(
            "   {} directories, {} skipped, {} hashed in {:.2}s",
            stats.directories_visited,
            stats.directories_skipped,
            format_size(stats.bytes_hashed),
            report.duration.as_secs_f64()
        );
    }
    for warning in &summary.root_warnings {
        println!(" {} not indexed: {}", warning.path.display(), warning.message);
    }

    let warnings = summary.warning_count();
    if warnings > 0 {
        println!();
        println!("{warnings} warning(s) during run");
    }
}

/// Reconcile volumes and list the working set.
fn run_volumes(db: &Path, format: OutputFormat) -> Result<()> {
    let store = SqliteStore::open(db).context("Cannot open database")?;
    store.create_schema()?;
    let enumerator = SysfsEnumerator::new();
    let reconciliation = VolumeReconciler::new(&store, &enumerator).reconcile()?;

    match format {
        OutputFormat::Text => {
            println!(
                " {:>4}  {:<24} {:<16} {:<38} {:<8} {:>10}  {}",
                "ID", "MOUNT", "LABEL", "SERIAL", "TYPE", "SIZE", "MODEL"
            );
            for volume in &reconciliation.active {
                let facts = &volume.facts;
                println!(
                    " {:>4}  {:<24} {:<16} {:<38} {:<8} {:>10}  {}",
                    volume.id.0,
                    facts.letter,
                    facts.label,
                    facts.serial,
                    facts.drive_type,
                    format_size(facts.total_size),
                    facts.model
                );
            }
            for warning in &reconciliation.warnings {
                println!(" warning: {}", warning.message);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reconciliation.active)?);
        }
    }

    Ok(())
}

fn run_stats(db: &Path) -> Result<()> {
    let store = SqliteStore::open(db).context("Cannot open database")?;
    let summary = store.count_summary()?;

    println!(" {}", db.display());
    println!("   {:>10} volumes", summary.volumes);
    println!("   {:>10} directories", summary.directories);
    println!("   {:>10} files", summary.files);
    println!(
        "   {:>10} attribute values ({} names)",
        summary.attribute_values, summary.attribute_names
    );

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
