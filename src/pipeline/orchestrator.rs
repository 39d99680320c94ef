use super::aggregator::Aggregator;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{MediaRecord, RecordStatus};
use crate::config::{Config, OutputConfig};
use crate::organizer::{FileOrganizer, RelocationOutcome};
use crate::output::assets::cover_path;
use crate::output::{AssetFetcher, AssetOutcome, NfoWriter};
use crate::storage::RecordStore;
use metrics::counter;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Re-aggregate identifiers that already have a SUCCESS row
    pub force: bool,
}

/// Counters for one pipeline run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub cache_hits: usize,
    pub resolved: usize,
    pub failed: usize,
    pub persistence_failures: usize,
    pub relocated: usize,
    pub relocation_failures: usize,
    pub post_processing_failures: usize,
    pub errors: Vec<String>,
}

impl RunSummary {
    fn error(&mut self, identifier: &str, err: &ScraperError) {
        self.errors.push(format!("{identifier}: {err}"));
    }
}

/// Drives scan results through cache check, resolution, persistence,
/// relocation and post-processing, one identifier at a time.
pub struct Orchestrator {
    aggregator: Aggregator,
    store: Arc<dyn RecordStore>,
    organizer: FileOrganizer,
    nfo: NfoWriter,
    output: OutputConfig,
    batch_delay_ms: [u64; 2],
}

impl Orchestrator {
    pub fn new(
        aggregator: Aggregator,
        store: Arc<dyn RecordStore>,
        organizer: FileOrganizer,
        output: OutputConfig,
    ) -> Self {
        Self {
            aggregator,
            store,
            organizer,
            nfo: NfoWriter::new(),
            output,
            batch_delay_ms: [0, 0],
        }
    }

    pub fn with_batch_delay(mut self, batch_delay_ms: [u64; 2]) -> Self {
        self.batch_delay_ms = batch_delay_ms;
        self
    }

    pub fn from_config(config: &Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        Ok(Self::new(
            Aggregator::from_config(config)?,
            store,
            FileOrganizer::new(&config.base.output_path),
            config.output.clone(),
        )
        .with_batch_delay(config.scraper.batch_delay_ms))
    }

    /// Process every scanned file. Failures are scoped to their identifier.
    #[instrument(skip(self, files), fields(total = files.len()))]
    pub async fn run(&self, files: &BTreeMap<String, PathBuf>, options: RunOptions) -> RunSummary {
        info!("🚀 Processing {} identifier(s)", files.len());
        let mut summary = RunSummary::default();
        for (identifier, location) in files {
            self.process(identifier, Some(location.clone()), options, &mut summary)
                .await;
        }
        log_summary(&summary);
        summary
    }

    /// Re-resolve every PENDING or FAILED row, pausing between items.
    /// Rows whose file is not in `files` only get their metadata refreshed.
    #[instrument(skip(self, files))]
    pub async fn retry_unresolved(&self, files: &BTreeMap<String, PathBuf>) -> Result<RunSummary> {
        let pending = self.store.unresolved()?;
        if pending.is_empty() {
            info!("No unresolved records");
            return Ok(RunSummary::default());
        }
        info!("🔁 Retrying {} unresolved record(s)", pending.len());

        let mut summary = RunSummary::default();
        for (index, record) in pending.iter().enumerate() {
            if index > 0 {
                self.pause().await;
            }
            let location = files.get(&record.identifier).cloned();
            self.process(
                &record.identifier,
                location,
                RunOptions { force: true },
                &mut summary,
            )
            .await;
        }
        log_summary(&summary);
        Ok(summary)
    }

    async fn pause(&self) {
        let [min, max] = self.batch_delay_ms;
        if max == 0 {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max);
        debug!("Sleeping {} ms before next item", delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    async fn process(
        &self,
        identifier: &str,
        location: Option<PathBuf>,
        options: RunOptions,
        summary: &mut RunSummary,
    ) {
        summary.total += 1;

        let cached = if options.force {
            None
        } else {
            match self.cached_record(identifier) {
                Ok(cached) => cached,
                Err(e) => {
                    error!("Record store lookup failed for {}: {}", identifier, e);
                    summary.persistence_failures += 1;
                    summary.error(identifier, &e);
                    return;
                }
            }
        };

        let mut record = match cached {
            Some(record) => {
                info!("{} already resolved, skipping lookup", identifier);
                summary.cache_hits += 1;
                counter!("media_scraper_items_total", "outcome" => "cached").increment(1);
                record
            }
            None => match self.resolve_and_store(identifier, summary).await {
                Some(record) => record,
                None => return,
            },
        };

        record.file_location = location;
        self.post_process(record, summary).await;
    }

    fn cached_record(&self, identifier: &str) -> Result<Option<MediaRecord>> {
        if !self.store.exists_and_succeeded(identifier)? {
            return Ok(None);
        }
        self.store.get(identifier)
    }

    async fn resolve_and_store(
        &self,
        identifier: &str,
        summary: &mut RunSummary,
    ) -> Option<MediaRecord> {
        let record = match self.aggregator.resolve(identifier).await {
            Ok(record) => record,
            Err(e) => {
                warn!("❌ Could not resolve {}: {}", identifier, e);
                summary.failed += 1;
                summary.error(identifier, &e);
                counter!("media_scraper_items_total", "outcome" => "failed").increment(1);
                let message = match &e {
                    ScraperError::Resolution(message) => message.clone(),
                    other => other.to_string(),
                };
                if let Err(store_err) = self.store.mark_failed(identifier, &message) {
                    error!("Could not record failure for {}: {}", identifier, store_err);
                    summary.persistence_failures += 1;
                    summary.error(identifier, &store_err);
                }
                return None;
            }
        };

        if let Err(e) = self
            .store
            .upsert(identifier, &record.metadata, RecordStatus::Success)
        {
            error!("Could not persist {}: {}", identifier, e);
            summary.persistence_failures += 1;
            summary.error(identifier, &e);
            return None;
        }

        info!("✅ Resolved and stored {}", identifier);
        summary.resolved += 1;
        counter!("media_scraper_items_total", "outcome" => "resolved").increment(1);
        Some(record)
    }

    async fn post_process(&self, mut record: MediaRecord, summary: &mut RunSummary) {
        if record.file_location.is_none() {
            debug!("{} has no file in this scan, skipping file steps", record.identifier);
            return;
        }

        if self.output.move_files {
            match self.organizer.plan_relocation(record.clone()) {
                Ok(planned) => {
                    let outcome = self.organizer.commit_relocation(&planned);
                    record = planned.record;
                    match outcome {
                        Ok(RelocationOutcome::Moved) => summary.relocated += 1,
                        Ok(RelocationOutcome::AlreadyInPlace) => {}
                        Err(e) => {
                            error!("Relocation failed for {}: {}", record.identifier, e);
                            summary.relocation_failures += 1;
                            summary.error(&record.identifier, &e);
                            if self.output.skip_post_processing_on_move_failure {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Could not plan relocation for {}: {}", record.identifier, e);
                    summary.relocation_failures += 1;
                    summary.error(&record.identifier, &e);
                    if self.output.skip_post_processing_on_move_failure {
                        return;
                    }
                }
            }
        }

        let fetcher = AssetFetcher::new(&self.aggregator);
        if self.output.download_cover {
            let result = fetcher.fetch_cover(&record).await;
            self.note_asset(&record.identifier, "cover", result, summary);
        }
        if self.output.download_trailer {
            let result = fetcher.fetch_trailer(&record).await;
            self.note_asset(&record.identifier, "trailer", result, summary);
        }
        if self.output.download_stills {
            let stills = fetcher.fetch_stills(&record).await;
            if stills.failed > 0 {
                warn!("{} of the stills for {} failed", stills.failed, record.identifier);
                summary.post_processing_failures += 1;
            }
        }

        if self.output.write_nfo {
            let thumb = cover_path(&record)
                .filter(|p| p.exists())
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
            if let Err(e) = self.nfo.write(&record, thumb.as_deref()) {
                error!("Descriptor failed for {}: {}", record.identifier, e);
                summary.post_processing_failures += 1;
                summary.error(&record.identifier, &e);
            }
        }
    }

    fn note_asset(
        &self,
        identifier: &str,
        kind: &str,
        result: Result<AssetOutcome>,
        summary: &mut RunSummary,
    ) {
        match result {
            Ok(AssetOutcome::Saved(path)) => debug!("{} {} saved to {}", identifier, kind, path.display()),
            Ok(AssetOutcome::NoAdapter(source)) => {
                warn!("{} {} skipped: no adapter for {}", identifier, kind, source)
            }
            Ok(_) => {}
            Err(e) => {
                error!("Downloading {} for {} failed: {}", kind, identifier, e);
                summary.post_processing_failures += 1;
                summary.error(identifier, &e);
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        "🎉 Run finished: {} total, {} cached, {} resolved, {} failed, {} persistence failures, {} moved, {} move failures, {} post-processing failures",
        summary.total,
        summary.cache_hits,
        summary.resolved,
        summary.failed,
        summary.persistence_failures,
        summary.relocated,
        summary.relocation_failures,
        summary.post_processing_failures
    );
}
