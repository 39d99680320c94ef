//! In-memory adapter for unit tests.

use super::{SourceAdapter, SourceRef};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{Metadata, SourceTagged};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq)]
pub enum Behavior {
    Answer,
    NotFound,
    LocateFails,
    AccessorFails,
}

pub struct MockAdapter {
    pub name: String,
    pub data: Metadata,
    pub behavior: Behavior,
    pub assets: HashMap<String, Vec<u8>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockAdapter {
    pub fn new(name: &str, data: Metadata) -> Self {
        Self {
            name: name.to_string(),
            data,
            behavior: Behavior::Answer,
            assets: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_asset(mut self, url: &str, bytes: &[u8]) -> Self {
        self.assets.insert(url.to_string(), bytes.to_vec());
        self
    }

    fn transport_error(&self, url: &str) -> ScraperError {
        ScraperError::Transport {
            url: url.to_string(),
            attempts: 1,
            message: "connection refused".to_string(),
        }
    }

    fn field<T>(&self, value: Option<T>) -> Result<Option<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::AccessorFails {
            return Err(self.transport_error(&format!("http://{}/", self.name)));
        }
        Ok(value)
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn locate(&self, key: &str) -> Result<Option<SourceRef>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::NotFound => Ok(None),
            Behavior::LocateFails => Err(self.transport_error(&format!("http://{}/", self.name))),
            _ => Ok(Some(SourceRef {
                source: self.name.clone(),
                url: format!("http://{}/{}", self.name, key),
            })),
        }
    }

    async fn get_title(&self, _: &SourceRef) -> Result<Option<String>> {
        self.field(self.data.title.clone())
    }
    async fn get_description(&self, _: &SourceRef) -> Result<Option<String>> {
        self.field(self.data.description.clone())
    }
    async fn get_release_date(&self, _: &SourceRef) -> Result<Option<String>> {
        self.field(self.data.release_date.clone())
    }
    async fn get_director(&self, _: &SourceRef) -> Result<Option<String>> {
        self.field(self.data.director.clone())
    }
    async fn get_studio(&self, _: &SourceRef) -> Result<Option<String>> {
        self.field(self.data.studio.clone())
    }
    async fn get_series(&self, _: &SourceRef) -> Result<Option<String>> {
        self.field(self.data.series.clone())
    }
    async fn get_category(&self, _: &SourceRef) -> Result<Option<Vec<String>>> {
        self.field(self.data.category.clone())
    }
    async fn get_actors(&self, _: &SourceRef) -> Result<Option<Vec<String>>> {
        self.field(self.data.actors.clone())
    }
    async fn get_cover_url(&self, _: &SourceRef) -> Result<Option<SourceTagged<String>>> {
        self.field(self.data.cover_url.clone())
    }
    async fn get_trailer_url(&self, _: &SourceRef) -> Result<Option<SourceTagged<String>>> {
        self.field(self.data.trailer_url.clone())
    }
    async fn get_image_urls(&self, _: &SourceRef) -> Result<Option<SourceTagged<Vec<String>>>> {
        self.field(self.data.image_urls.clone())
    }

    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| self.transport_error(url))
    }
}
