use super::session::SourceSession;
use super::{SourceAdapter, SourceRef};
use crate::common::error::Result;
use crate::common::types::SourceTagged;
use crate::config::ResolvedSourceConfig;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

// Row labels in the info panel, per site language
const RELEASE_DATE_LABELS: &[&str] = &["發行日期", "发行日期", "Release Date", "発売日"];
const DIRECTOR_LABELS: &[&str] = &["導演", "导演", "Director", "監督"];
const STUDIO_LABELS: &[&str] = &["製作商", "制作商", "Studio", "メーカー"];
const SERIES_LABELS: &[&str] = &["系列", "Series", "シリーズ"];
const CATEGORY_LABELS: &[&str] = &["類別", "类别", "Genre", "ジャンル"];
const ACTOR_LABELS: &[&str] = &["演員", "演员", "Star", "出演者"];

/// Everything read from one detail page. Links are still as written in the HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DetailPage {
    title: Option<String>,
    release_date: Option<String>,
    director: Option<String>,
    studio: Option<String>,
    series: Option<String>,
    category: Option<Vec<String>>,
    actors: Option<Vec<String>>,
    cover_src: Option<String>,
    trailer_src: Option<String>,
    still_srcs: Option<Vec<String>>,
}

impl DetailPage {
    fn parse(body: &str) -> Self {
        let doc = Html::parse_document(body);
        Self {
            title: parse_title(&doc),
            release_date: info_value(&doc, RELEASE_DATE_LABELS),
            director: info_value(&doc, DIRECTOR_LABELS),
            studio: info_value(&doc, STUDIO_LABELS),
            series: info_value(&doc, SERIES_LABELS),
            category: info_list(&doc, CATEGORY_LABELS),
            actors: parse_actors(&doc),
            cover_src: parse_cover_src(&doc),
            trailer_src: parse_trailer_src(&doc),
            still_srcs: parse_still_srcs(&doc),
        }
    }
}

/// Adapter for javbus-style detail pages: `search_url` formats straight to
/// the detail page, so locating is a single GET.
pub struct JavbusAdapter {
    search_url: String,
    session: SourceSession,
    details: Mutex<HashMap<String, Arc<DetailPage>>>,
}

impl JavbusAdapter {
    pub fn new(config: ResolvedSourceConfig) -> Result<Self> {
        let session = SourceSession::new(&config)?;
        info!("Initialized source adapter {}", config.name);
        Ok(Self {
            search_url: config.search_url,
            session,
            details: Mutex::new(HashMap::new()),
        })
    }

    fn search_url_for(&self, key: &str) -> String {
        self.search_url.replace("{}", key)
    }

    fn parsed(&self, url: &str) -> Option<Arc<DetailPage>> {
        self.details
            .lock()
            .ok()
            .and_then(|details| details.get(url).cloned())
    }

    /// The detail page behind a reference, parsed on first use
    async fn detail(&self, reference: &SourceRef) -> Result<Option<Arc<DetailPage>>> {
        if let Some(page) = self.parsed(&reference.url) {
            return Ok(Some(page));
        }
        let Some(body) = self.session.page(&reference.url).await? else {
            return Ok(None);
        };
        let page = Arc::new(DetailPage::parse(&body));
        if let Ok(mut details) = self.details.lock() {
            details.insert(reference.url.clone(), page.clone());
        }
        Ok(Some(page))
    }

    async fn extract<T, F>(&self, reference: &SourceRef, pick: F) -> Result<Option<T>>
    where
        F: FnOnce(&DetailPage) -> Option<T> + Send,
        T: Send,
    {
        Ok(self.detail(reference).await?.and_then(|page| pick(&page)))
    }

    fn tag<T>(&self, value: T) -> SourceTagged<T> {
        SourceTagged::new(self.session.name(), value)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for JavbusAdapter {
    fn name(&self) -> &str {
        self.session.name()
    }

    #[instrument(skip(self), fields(source = %self.session.name()))]
    async fn locate(&self, key: &str) -> Result<Option<SourceRef>> {
        let url = self.search_url_for(key);
        match self.session.page(&url).await? {
            Some(_) => {
                debug!("Located detail page {}", url);
                Ok(Some(SourceRef {
                    source: self.session.name().to_string(),
                    url,
                }))
            }
            None => Ok(None),
        }
    }

    async fn get_title(&self, reference: &SourceRef) -> Result<Option<String>> {
        self.extract(reference, |page| page.title.clone()).await
    }

    async fn get_description(&self, _reference: &SourceRef) -> Result<Option<String>> {
        // detail pages carry no synopsis
        Ok(None)
    }

    async fn get_release_date(&self, reference: &SourceRef) -> Result<Option<String>> {
        self.extract(reference, |page| page.release_date.clone()).await
    }

    async fn get_director(&self, reference: &SourceRef) -> Result<Option<String>> {
        self.extract(reference, |page| page.director.clone()).await
    }

    async fn get_studio(&self, reference: &SourceRef) -> Result<Option<String>> {
        self.extract(reference, |page| page.studio.clone()).await
    }

    async fn get_series(&self, reference: &SourceRef) -> Result<Option<String>> {
        self.extract(reference, |page| page.series.clone()).await
    }

    async fn get_category(&self, reference: &SourceRef) -> Result<Option<Vec<String>>> {
        self.extract(reference, |page| page.category.clone()).await
    }

    async fn get_actors(&self, reference: &SourceRef) -> Result<Option<Vec<String>>> {
        self.extract(reference, |page| page.actors.clone()).await
    }

    async fn get_cover_url(&self, reference: &SourceRef) -> Result<Option<SourceTagged<String>>> {
        let src = self.extract(reference, |page| page.cover_src.clone()).await?;
        Ok(src
            .and_then(|s| self.session.absolute_url(&s))
            .map(|url| self.tag(url)))
    }

    async fn get_trailer_url(
        &self,
        reference: &SourceRef,
    ) -> Result<Option<SourceTagged<String>>> {
        let src = self.extract(reference, |page| page.trailer_src.clone()).await?;
        Ok(src
            .and_then(|s| self.session.absolute_url(&s))
            .map(|url| self.tag(url)))
    }

    async fn get_image_urls(
        &self,
        reference: &SourceRef,
    ) -> Result<Option<SourceTagged<Vec<String>>>> {
        let Some(sources) = self.extract(reference, |page| page.still_srcs.clone()).await? else {
            return Ok(None);
        };
        let mut urls: Vec<String> = Vec::new();
        for url in sources.iter().filter_map(|s| self.session.absolute_url(s)) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        if urls.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.tag(urls)))
    }

    #[instrument(skip(self), fields(source = %self.session.name()))]
    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>> {
        let referer = self.session.base_url().to_string();
        self.session.bytes(url, Some(&referer)).await
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_title(doc: &Html) -> Option<String> {
    let h3 = selector("h3")?;
    doc.select(&h3).next().map(|e| text_of(&e)).and_then(non_empty)
}

fn info_rows(doc: &Html) -> Vec<ElementRef<'_>> {
    let Some(rows) = selector("div.col-md-3 p") else {
        return Vec::new();
    };
    doc.select(&rows).collect()
}

fn matches_label(text: &str, labels: &[&str]) -> bool {
    labels.iter().any(|label| text.trim_start().starts_with(label))
}

/// Value of a `<p><span class="header">Label:</span> value</p>` row. Linked
/// values use the first link's text.
fn info_value(doc: &Html, labels: &[&str]) -> Option<String> {
    let header = selector("span.header")?;
    let link = selector("a")?;
    for row in info_rows(doc) {
        let Some(head) = row.select(&header).next() else {
            continue;
        };
        let head_text = text_of(&head);
        if !matches_label(&head_text, labels) {
            continue;
        }
        if let Some(a) = row.select(&link).next() {
            return non_empty(text_of(&a));
        }
        let full = text_of(&row);
        let value = full
            .strip_prefix(head_text.as_str())
            .unwrap_or(full.as_str())
            .trim()
            .trim_start_matches([':', '：'])
            .trim()
            .to_string();
        return non_empty(value);
    }
    None
}

/// Link texts in the row that follows a header-only row such as `<p class="header">Genre:</p>`
fn info_list(doc: &Html, labels: &[&str]) -> Option<Vec<String>> {
    let link = selector("a")?;
    let rows = info_rows(doc);
    let position = rows.iter().position(|row| {
        row.select(&link).next().is_none() && matches_label(&text_of(row), labels)
    })?;
    let values: Vec<String> = rows
        .get(position + 1)?
        .select(&link)
        .map(|a| text_of(&a))
        .filter(|s| !s.is_empty())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn parse_actors(doc: &Html) -> Option<Vec<String>> {
    if let Some(actors) = info_list(doc, ACTOR_LABELS) {
        return Some(actors);
    }
    let star = selector("div.star-name a")?;
    let actors: Vec<String> = doc
        .select(&star)
        .map(|a| text_of(&a))
        .filter(|s| !s.is_empty())
        .collect();
    if actors.is_empty() {
        None
    } else {
        Some(actors)
    }
}

fn image_src(element: &ElementRef) -> Option<String> {
    let attrs = element.value();
    attrs
        .attr("src")
        .or_else(|| attrs.attr("data-src"))
        .map(|s| s.trim().to_string())
        .and_then(non_empty)
}

fn parse_cover_src(doc: &Html) -> Option<String> {
    let img = selector(".bigImage img")?;
    doc.select(&img).next().and_then(|e| image_src(&e))
}

fn parse_trailer_src(doc: &Html) -> Option<String> {
    let source = selector("video source")?;
    let video = selector("video")?;
    let from_source = doc
        .select(&source)
        .next()
        .and_then(|e| e.value().attr("src").map(str::to_string));
    let from_video = || {
        doc.select(&video)
            .next()
            .and_then(|e| e.value().attr("src").map(str::to_string))
    };
    if let Some(src) = from_source.or_else(from_video).and_then(non_empty) {
        return Some(src);
    }
    let preview = selector("a[href*=\"preview\"]")?;
    doc.select(&preview)
        .next()
        .and_then(|a| a.value().attr("href").map(str::to_string))
        .and_then(non_empty)
}

fn parse_still_srcs(doc: &Html) -> Option<Vec<String>> {
    let waterfall = selector("#sample-waterfall img")?;
    let boxes = selector(".sample-box img")?;
    let mut srcs: Vec<String> = doc.select(&waterfall).filter_map(|e| image_src(&e)).collect();
    if srcs.is_empty() {
        srcs = doc.select(&boxes).filter_map(|e| image_src(&e)).collect();
    }
    if srcs.is_empty() {
        None
    } else {
        Some(srcs)
    }
}
