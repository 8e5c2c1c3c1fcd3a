use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use gemdb_reconcile::{IngestReport, Reconciler};
use gemdb_store::{GemStore, InMemoryGemStore, SqliteGemStore, StoreCounts};
use gemdb_types::{parse_gemspecs, ExistingGem, GemCoordinates, GemSpec, Gemspec};

use crate::cli::*;
use crate::config::GemDbConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = GemDbConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
        config.validate()?;
    }
    let store = open_store(&config)?;

    match cli.command {
        Command::Ingest(args) => cmd_ingest(store, &config, args, cli.format),
        Command::Lookup(args) => cmd_lookup(store, &config, args, cli.format),
        Command::Stats(_) => cmd_stats(store.as_ref(), cli.format),
    }
}

pub fn open_store(config: &GemDbConfig) -> anyhow::Result<Arc<dyn GemStore>> {
    if config.is_in_memory() {
        return Ok(Arc::new(InMemoryGemStore::new()));
    }
    let store = SqliteGemStore::open(&config.database)
        .with_context(|| format!("opening database {}", config.database))?;
    Ok(Arc::new(store))
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

/// A gemspec that could not be reconciled.
#[derive(Clone, Debug, Serialize)]
pub struct IngestFailure {
    pub gem: String,
    pub error: String,
}

/// Totals over one `ingest` run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IngestSummary {
    pub gemspecs: usize,
    pub packages_created: usize,
    pub versions_created: usize,
    pub dependencies_inserted: usize,
    pub dependencies_existing: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestSummary {
    fn record(&mut self, report: &IngestReport) {
        self.gemspecs += 1;
        self.packages_created += report.packages_created();
        self.versions_created += usize::from(report.version.created);
        self.dependencies_inserted += report.dependencies.inserted;
        self.dependencies_existing += report.dependencies.existing;
    }

    fn merge(&mut self, other: IngestSummary) {
        self.gemspecs += other.gemspecs;
        self.packages_created += other.packages_created;
        self.versions_created += other.versions_created;
        self.dependencies_inserted += other.dependencies_inserted;
        self.dependencies_existing += other.dependencies_existing;
        self.failures.extend(other.failures);
    }
}

/// Feed `specs` through `reconciler` from `workers` threads.
///
/// Workers take the next unclaimed gemspec until none remain. A gemspec that
/// fails is logged and recorded; the others still run.
pub fn ingest_all(
    reconciler: &Reconciler,
    specs: &[GemSpec],
    workers: usize,
    platform: Option<&str>,
    indexed: Option<bool>,
) -> anyhow::Result<IngestSummary> {
    let cursor = AtomicUsize::new(0);
    let workers = workers.clamp(1, specs.len().max(1));

    let partials = thread::scope(|scope| {
        let next = &cursor;
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut summary = IngestSummary::default();
                    while let Some(spec) = specs.get(next.fetch_add(1, Ordering::Relaxed)) {
                        match reconciler.ingest(spec, platform, indexed) {
                            Ok(report) => summary.record(&report),
                            Err(e) => {
                                let gem = format!("{} {}", spec.name(), spec.version());
                                warn!(%gem, error = %e, "gemspec not ingested");
                                summary.failures.push(IngestFailure {
                                    gem,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    summary
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("ingest worker panicked")))
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut total = IngestSummary::default();
    for partial in partials {
        total.merge(partial);
    }
    info!(
        gemspecs = total.gemspecs,
        packages_created = total.packages_created,
        versions_created = total.versions_created,
        dependencies_inserted = total.dependencies_inserted,
        failures = total.failures.len(),
        workers,
        "ingest finished"
    );
    Ok(total)
}

fn read_gemspecs(path: &Path) -> anyhow::Result<Vec<GemSpec>> {
    let text = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("reading gemspecs from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading gemspecs from {}", path.display()))?
    };
    parse_gemspecs(&text).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_ingest(
    store: Arc<dyn GemStore>,
    config: &GemDbConfig,
    args: IngestArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let specs = read_gemspecs(&args.file)?;
    let reconciler = Reconciler::new(store);
    let workers = args.workers.unwrap_or(config.workers);
    let summary = ingest_all(
        &reconciler,
        &specs,
        workers,
        args.platform.as_deref(),
        args.indexed(),
    )?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!(
                "{} Ingested {} gemspecs",
                "✓".green().bold(),
                summary.gemspecs.to_string().bold()
            );
            println!("  Packages created: {}", summary.packages_created);
            println!("  Versions created: {}", summary.versions_created);
            println!(
                "  Dependencies: {} new, {} already present",
                summary.dependencies_inserted, summary.dependencies_existing
            );
            for failure in &summary.failures {
                println!("  {} {}: {}", "✗".red().bold(), failure.gem.yellow(), failure.error);
            }
        }
    }

    if !summary.failures.is_empty() {
        bail!("{} gemspecs failed to ingest", summary.failures.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// lookup / stats
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LookupOutput<'a> {
    name: &'a str,
    version: &'a str,
    platform: &'a str,
    full_name: String,
    existing: Option<ExistingGem>,
}

fn cmd_lookup(
    store: Arc<dyn GemStore>,
    config: &GemDbConfig,
    args: LookupArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let platform = args.platform.unwrap_or_else(|| config.default_platform.clone());
    let coordinates = GemCoordinates::new(args.name, args.version, platform);
    let existing = Reconciler::new(store).lookup_coordinates(&coordinates)?;

    match format {
        OutputFormat::Json => {
            let output = LookupOutput {
                name: &coordinates.name,
                version: &coordinates.number,
                platform: &coordinates.platform,
                full_name: coordinates.full_name(),
                existing,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => match existing {
            Some(gem) => println!(
                "{} {} ({}, {})",
                "✓".green().bold(),
                coordinates.full_name().yellow(),
                gem.package_id,
                gem.version_id
            ),
            None => println!("{} {} not stored", "✗".red(), coordinates.full_name().yellow()),
        },
    }
    Ok(())
}

fn cmd_stats(store: &dyn GemStore, format: OutputFormat) -> anyhow::Result<()> {
    let counts: StoreCounts = store.counts()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
        OutputFormat::Text => {
            println!("Packages:     {}", counts.packages.to_string().bold());
            println!("Versions:     {}", counts.versions.to_string().bold());
            println!("Dependencies: {}", counts.dependencies.to_string().bold());
        }
    }
    Ok(())
}
