use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use media_scraper::config::{Config, DEFAULT_CONFIG_PATH};
use media_scraper::logging;
use media_scraper::pipeline::{Orchestrator, RunOptions, RunSummary};
use media_scraper::scanner::{ScanReport, Scanner};
use media_scraper::storage::{RecordStore, SqliteRecordStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "media_scraper")]
#[command(about = "Scan media files, resolve their metadata and organize them")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan, resolve, persist and organize
    Run {
        /// Re-resolve identifiers that already succeeded
        #[arg(long)]
        force: bool,
        /// Directory to scan instead of base.scan_path
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// List discovered identifiers
    Scan {
        #[arg(long)]
        path: Option<PathBuf>,
        /// Insert a PENDING row for every identifier found
        #[arg(long)]
        register: bool,
    },
    /// Re-resolve every PENDING or FAILED record
    Retry {
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the stored record for an identifier
    Show { identifier: String },
    /// Print record counts per status
    Status,
}

fn scan(config: &Config, path: Option<&Path>) -> Result<ScanReport> {
    let root = path.unwrap_or(config.base.scan_path.as_path());
    let scanner = Scanner::from_config(&config.scanner)?;
    Ok(scanner
        .scan(root)
        .with_context(|| format!("scanning {}", root.display()))?)
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Run summary:");
    println!("   Total:                     {}", summary.total);
    println!("   Cache hits:                {}", summary.cache_hits);
    println!("   Resolved:                  {}", summary.resolved);
    println!("   Failed:                    {}", summary.failed);
    println!("   Persistence failures:      {}", summary.persistence_failures);
    println!("   Relocated:                 {}", summary.relocated);
    println!("   Relocation failures:       {}", summary.relocation_failures);
    println!("   Post-processing failures:  {}", summary.post_processing_failures);

    if !summary.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("   - {}", error);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_logging(&config.base.log_level, &config.base.log_dir);
    info!("Configuration loaded from {}", cli.config.display());

    let store = Arc::new(SqliteRecordStore::open(&config.base.db_path)?);

    match cli.command {
        Commands::Run { force, path } => {
            println!("🚀 Running pipeline...");
            let report = scan(&config, path.as_deref())?;
            let orchestrator = Orchestrator::from_config(&config, store)?;
            let summary = orchestrator.run(&report.files, RunOptions { force }).await;
            print_summary(&summary);
        }
        Commands::Scan { path, register } => {
            let report = scan(&config, path.as_deref())?;
            for (identifier, file) in &report.files {
                println!("{identifier}\t{}", file.display());
            }
            for duplicate in &report.duplicates {
                println!(
                    "⚠️  duplicate {}: {} replaced {}",
                    duplicate.identifier,
                    duplicate.kept.display(),
                    duplicate.replaced.display()
                );
            }
            println!(
                "\n{} identifier(s), {} duplicate(s), {} file(s) without identifier",
                report.files.len(),
                report.duplicates.len(),
                report.skipped.len()
            );

            if register {
                let mut added = 0;
                for identifier in report.files.keys() {
                    match store.register_pending(identifier) {
                        Ok(true) => added += 1,
                        Ok(false) => {}
                        Err(e) => error!("Could not register {}: {}", identifier, e),
                    }
                }
                println!("✅ Registered {added} new identifier(s)");
            }
        }
        Commands::Retry { path } => {
            println!("🔁 Retrying unresolved records...");
            // a missing scan directory only means no file steps for these rows
            let files = match scan(&config, path.as_deref()) {
                Ok(report) => report.files,
                Err(e) => {
                    error!("Scan failed, resolving metadata only: {:#}", e);
                    Default::default()
                }
            };
            let orchestrator = Orchestrator::from_config(&config, store)?;
            let summary = orchestrator.retry_unresolved(&files).await?;
            print_summary(&summary);
        }
        Commands::Show { identifier } => match store.get(&identifier.to_uppercase())? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("❌ No record for {identifier}"),
        },
        Commands::Status => {
            let counts = store.counts()?;
            println!("📦 Records: {}", counts.total());
            println!("   PENDING: {}", counts.pending);
            println!("   SUCCESS: {}", counts.success);
            println!("   FAILED:  {}", counts.failed);
        }
    }
    Ok(())
}
