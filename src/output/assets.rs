use super::{companion_path, extension_from_url};
use crate::common::constants::{
    DEFAULT_IMAGE_EXTENSION, DEFAULT_VIDEO_EXTENSION, STILL_SUFFIX, TRAILER_SUFFIX,
};
use crate::common::error::Result;
use crate::common::types::MediaRecord;
use crate::pipeline::Aggregator;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Saved(PathBuf),
    /// The file was already on disk; nothing was downloaded
    AlreadyPresent(PathBuf),
    /// The record has no URL or no location for this asset
    NotAvailable,
    /// The originating source has no registered adapter
    NoAdapter(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StillsOutcome {
    pub saved: usize,
    pub present: usize,
    pub failed: usize,
}

/// Cover location for a record, `<stem>.<ext>`
pub fn cover_path(record: &MediaRecord) -> Option<PathBuf> {
    let location = record.file_location.as_deref()?;
    let cover = record.metadata.cover_url.as_ref()?;
    Some(companion_path(
        location,
        "",
        &extension_from_url(&cover.value, DEFAULT_IMAGE_EXTENSION),
    ))
}

/// Downloads covers, trailers and stills through the adapter that produced
/// each URL, so the source's cookies and headers apply.
pub struct AssetFetcher<'a> {
    aggregator: &'a Aggregator,
}

impl<'a> AssetFetcher<'a> {
    pub fn new(aggregator: &'a Aggregator) -> Self {
        Self { aggregator }
    }

    #[instrument(skip(self, record), fields(identifier = %record.identifier))]
    pub async fn fetch_cover(&self, record: &MediaRecord) -> Result<AssetOutcome> {
        let (Some(cover), Some(path)) = (&record.metadata.cover_url, cover_path(record)) else {
            return Ok(AssetOutcome::NotAvailable);
        };
        self.download(&cover.source, &cover.value, path).await
    }

    #[instrument(skip(self, record), fields(identifier = %record.identifier))]
    pub async fn fetch_trailer(&self, record: &MediaRecord) -> Result<AssetOutcome> {
        let (Some(trailer), Some(location)) =
            (&record.metadata.trailer_url, record.file_location.as_deref())
        else {
            return Ok(AssetOutcome::NotAvailable);
        };
        let path = companion_path(
            location,
            TRAILER_SUFFIX,
            &extension_from_url(&trailer.value, DEFAULT_VIDEO_EXTENSION),
        );
        self.download(&trailer.source, &trailer.value, path).await
    }

    /// Fetch every still; one failure does not stop the rest.
    #[instrument(skip(self, record), fields(identifier = %record.identifier))]
    pub async fn fetch_stills(&self, record: &MediaRecord) -> StillsOutcome {
        let mut outcome = StillsOutcome::default();
        let (Some(stills), Some(location)) =
            (&record.metadata.image_urls, record.file_location.as_deref())
        else {
            return outcome;
        };

        for (index, url) in stills.value.iter().enumerate() {
            let suffix = format!("{}{}", STILL_SUFFIX, index + 1);
            let path = companion_path(
                location,
                &suffix,
                &extension_from_url(url, DEFAULT_IMAGE_EXTENSION),
            );
            match self.download(&stills.source, url, path).await {
                Ok(AssetOutcome::Saved(_)) => outcome.saved += 1,
                Ok(AssetOutcome::AlreadyPresent(_)) => outcome.present += 1,
                Ok(_) => outcome.failed += 1,
                Err(e) => {
                    warn!("Still {} for {} failed: {}", index + 1, record.identifier, e);
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    async fn download(&self, source: &str, url: &str, path: PathBuf) -> Result<AssetOutcome> {
        if path.exists() {
            return Ok(AssetOutcome::AlreadyPresent(path));
        }
        let Some(adapter) = self.aggregator.adapter(source) else {
            warn!("No adapter registered for '{}', skipping {}", source, url);
            return Ok(AssetOutcome::NoAdapter(source.to_string()));
        };

        let bytes = adapter.fetch_asset(url).await?;
        std::fs::write(&path, bytes)?;
        metrics::counter!("media_scraper_assets_saved_total", "source" => source.to_string())
            .increment(1);
        info!("Saved {}", path.display());
        Ok(AssetOutcome::Saved(path))
    }
}
