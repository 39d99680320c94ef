#![allow(dead_code)]

use async_trait::async_trait;
use media_scraper::common::types::{Field, MediaRecord, Metadata, RecordStatus, SourceTagged};
use media_scraper::config::OutputConfig;
use media_scraper::pipeline::FieldPriorityTable;
use media_scraper::sources::{SourceAdapter, SourceRef};
use media_scraper::storage::{RecordStore, SqliteRecordStore, StatusCounts};
use media_scraper::{Result, ScraperError};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Adapter serving fixed metadata and counting every call made to it
pub struct ScriptedAdapter {
    name: String,
    data: Metadata,
    found: bool,
    broken: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub fn new(name: &str, data: Metadata) -> Self {
        Self {
            name: name.to_string(),
            data,
            found: true,
            broken: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `locate` never finds anything
    pub fn missing(name: &str) -> Self {
        let mut adapter = Self::new(name, Metadata::default());
        adapter.found = false;
        adapter
    }

    /// Every call is a transport failure
    pub fn broken(name: &str) -> Self {
        let mut adapter = Self::new(name, Metadata::default());
        adapter.broken = true;
        adapter
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn answer<T: Clone>(&self, value: &Option<T>) -> Result<Option<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(ScraperError::Transport {
                url: format!("http://{}/", self.name),
                attempts: 3,
                message: "connection reset".to_string(),
            });
        }
        Ok(value.clone())
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn locate(&self, key: &str) -> Result<Option<SourceRef>> {
        let reference = self.found.then(|| SourceRef {
            source: self.name.clone(),
            url: format!("http://{}/{}", self.name, key),
        });
        self.answer(&reference)
    }

    async fn get_title(&self, _: &SourceRef) -> Result<Option<String>> {
        self.answer(&self.data.title)
    }
    async fn get_description(&self, _: &SourceRef) -> Result<Option<String>> {
        self.answer(&self.data.description)
    }
    async fn get_release_date(&self, _: &SourceRef) -> Result<Option<String>> {
        self.answer(&self.data.release_date)
    }
    async fn get_director(&self, _: &SourceRef) -> Result<Option<String>> {
        self.answer(&self.data.director)
    }
    async fn get_studio(&self, _: &SourceRef) -> Result<Option<String>> {
        self.answer(&self.data.studio)
    }
    async fn get_series(&self, _: &SourceRef) -> Result<Option<String>> {
        self.answer(&self.data.series)
    }
    async fn get_category(&self, _: &SourceRef) -> Result<Option<Vec<String>>> {
        self.answer(&self.data.category)
    }
    async fn get_actors(&self, _: &SourceRef) -> Result<Option<Vec<String>>> {
        self.answer(&self.data.actors)
    }
    async fn get_cover_url(&self, _: &SourceRef) -> Result<Option<SourceTagged<String>>> {
        self.answer(&self.data.cover_url)
    }
    async fn get_trailer_url(&self, _: &SourceRef) -> Result<Option<SourceTagged<String>>> {
        self.answer(&self.data.trailer_url)
    }
    async fn get_image_urls(&self, _: &SourceRef) -> Result<Option<SourceTagged<Vec<String>>>> {
        self.answer(&self.data.image_urls)
    }

    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(url.as_bytes().to_vec())
    }
}

/// SQLite store whose upsert fails for chosen identifiers
pub struct FlakyStore {
    inner: SqliteRecordStore,
    failing: HashSet<String>,
}

impl FlakyStore {
    pub fn new(path: &Path, failing: &[&str]) -> Self {
        Self {
            inner: SqliteRecordStore::open(path).expect("open store"),
            failing: failing.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RecordStore for FlakyStore {
    fn exists_and_succeeded(&self, identifier: &str) -> Result<bool> {
        self.inner.exists_and_succeeded(identifier)
    }

    fn upsert(&self, identifier: &str, metadata: &Metadata, status: RecordStatus) -> Result<()> {
        if self.failing.contains(identifier) {
            return Err(ScraperError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.upsert(identifier, metadata, status)
    }

    fn mark_failed(&self, identifier: &str, message: &str) -> Result<()> {
        self.inner.mark_failed(identifier, message)
    }

    fn get(&self, identifier: &str) -> Result<Option<MediaRecord>> {
        self.inner.get(identifier)
    }

    fn register_pending(&self, identifier: &str) -> Result<bool> {
        self.inner.register_pending(identifier)
    }

    fn unresolved(&self) -> Result<Vec<MediaRecord>> {
        self.inner.unresolved()
    }

    fn counts(&self) -> Result<StatusCounts> {
        self.inner.counts()
    }
}

/// Every field prefers `sources` in the given order
pub fn priority_all(sources: &[&str]) -> FieldPriorityTable {
    Field::ALL
        .iter()
        .fold(FieldPriorityTable::new(), |table, field| table.with(*field, sources))
}

/// All file steps switched off
pub fn metadata_only() -> OutputConfig {
    OutputConfig {
        move_files: false,
        write_nfo: false,
        download_cover: false,
        download_trailer: false,
        download_stills: false,
        skip_post_processing_on_move_failure: false,
    }
}

pub fn sample_metadata(source: &str) -> Metadata {
    Metadata {
        title: Some("A Test Title".into()),
        release_date: Some("2021-03-04".into()),
        studio: Some("Some Studio".into()),
        category: Some(vec!["Drama".into()]),
        actors: Some(vec!["Jane Doe".into()]),
        cover_url: Some(SourceTagged::new(source, "https://a/cover.jpg".to_string())),
        ..Default::default()
    }
}
