pub mod javbus;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

use crate::common::constants::JAVBUS_SOURCE;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{Metadata, SourceTagged};
use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Handle to a located detail page, valid for the adapter that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub url: String,
}

/// Capability every metadata source implements.
///
/// Accessors return `Ok(None)` when a field is absent or cannot be parsed and
/// reserve `Err` for transport failures. Calling an accessor twice with the
/// same reference must not fetch the page again.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Unique name for this source, used in priority tables and source tags
    fn name(&self) -> &str;

    /// Find the detail page for an identifier
    async fn locate(&self, key: &str) -> Result<Option<SourceRef>>;

    async fn get_title(&self, reference: &SourceRef) -> Result<Option<String>>;
    async fn get_description(&self, reference: &SourceRef) -> Result<Option<String>>;
    async fn get_release_date(&self, reference: &SourceRef) -> Result<Option<String>>;
    async fn get_director(&self, reference: &SourceRef) -> Result<Option<String>>;
    async fn get_studio(&self, reference: &SourceRef) -> Result<Option<String>>;
    async fn get_series(&self, reference: &SourceRef) -> Result<Option<String>>;
    async fn get_category(&self, reference: &SourceRef) -> Result<Option<Vec<String>>>;
    async fn get_actors(&self, reference: &SourceRef) -> Result<Option<Vec<String>>>;
    async fn get_cover_url(&self, reference: &SourceRef) -> Result<Option<SourceTagged<String>>>;
    async fn get_trailer_url(&self, reference: &SourceRef)
        -> Result<Option<SourceTagged<String>>>;
    async fn get_image_urls(
        &self,
        reference: &SourceRef,
    ) -> Result<Option<SourceTagged<Vec<String>>>>;

    /// Download an asset using this source's session (cookies, headers, proxy)
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>>;
}

/// Run every accessor against one reference. Any transport error aborts the
/// whole collection so the caller can drop this source.
pub async fn collect_fields(adapter: &dyn SourceAdapter, reference: &SourceRef) -> Result<Metadata> {
    Ok(Metadata {
        title: adapter.get_title(reference).await?,
        description: adapter.get_description(reference).await?,
        release_date: adapter.get_release_date(reference).await?,
        director: adapter.get_director(reference).await?,
        studio: adapter.get_studio(reference).await?,
        series: adapter.get_series(reference).await?,
        category: adapter.get_category(reference).await?,
        actors: adapter.get_actors(reference).await?,
        cover_url: adapter.get_cover_url(reference).await?,
        trailer_url: adapter.get_trailer_url(reference).await?,
        image_urls: adapter.get_image_urls(reference).await?,
    })
}

/// Factory function to create adapters from configuration
pub fn create_adapter(name: &str, config: &Config) -> Result<Box<dyn SourceAdapter>> {
    match name {
        JAVBUS_SOURCE => Ok(Box::new(javbus::JavbusAdapter::new(config.source(name)?)?)),
        other => Err(ScraperError::UnknownSource(other.to_string())),
    }
}

/// Build every adapter listed in `scraper.enabled`
pub fn create_enabled_adapters(config: &Config) -> Result<Vec<Box<dyn SourceAdapter>>> {
    config
        .scraper
        .enabled
        .iter()
        .map(|name| create_adapter(name, config))
        .collect()
}
