use crate::common::error::{Result, ScraperError};
use crate::config::ResolvedSourceConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::{Response, StatusCode, Url};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Long-lived HTTP session for one source.
///
/// Cookies and default headers live as long as the adapter. Per-request
/// overrides (e.g. a Referer for asset downloads) never touch the defaults.
/// The first request visits `base_url` once so the site can set its cookies.
pub struct SourceSession {
    name: String,
    client: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    retry_delay: Duration,
    page_cache: Mutex<HashMap<String, String>>,
    primed: OnceCell<()>,
}

impl SourceSession {
    pub fn new(config: &ResolvedSourceConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ScraperError::Config(format!(
                "invalid base_url '{}' for source '{}': {}",
                config.base_url, config.name, e
            ))
        })?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ScraperError::Config(format!("invalid header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ScraperError::Config(format!("invalid value for header '{key}': {e}")))?;
            headers.insert(name, value);
        }
        if !headers.contains_key(REFERER) {
            if let Ok(referer) = HeaderValue::from_str(base_url.as_str()) {
                headers.insert(REFERER, referer);
            }
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(config.timeout);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            name: config.name.clone(),
            client: builder.build()?,
            base_url,
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay,
            page_cache: Mutex::new(HashMap::new()),
            primed: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a possibly-relative link against the source's base address
    pub fn absolute_url(&self, href: &str) -> Option<String> {
        self.base_url.join(href.trim()).ok().map(|u| u.to_string())
    }

    /// GET a page body, served from the cache after the first successful fetch.
    /// `Ok(None)` means the page does not exist (404).
    pub async fn page(&self, url: &str) -> Result<Option<String>> {
        if let Some(body) = self.cached(url) {
            debug!(source = %self.name, url, "page cache hit");
            return Ok(Some(body));
        }
        let Some(response) = self.get_with_retry(url, None).await? else {
            return Ok(None);
        };
        let body = response.text().await?;
        if let Ok(mut cache) = self.page_cache.lock() {
            cache.insert(url.to_string(), body.clone());
        }
        Ok(Some(body))
    }

    /// GET raw bytes with a one-off Referer; the session defaults stay untouched.
    pub async fn bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        let response = self
            .get_with_retry(url, referer)
            .await?
            .ok_or_else(|| ScraperError::Transport {
                url: url.to_string(),
                attempts: 1,
                message: "404 Not Found".to_string(),
            })?;
        Ok(response.bytes().await?.to_vec())
    }

    fn cached(&self, url: &str) -> Option<String> {
        self.page_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(url).cloned())
    }

    /// Best-effort visit of the landing page; failures are only logged
    async fn prime(&self) {
        self.primed
            .get_or_init(|| async {
                match self.client.get(self.base_url.clone()).send().await {
                    Ok(resp) => debug!(source = %self.name, status = %resp.status(), "session primed"),
                    Err(e) => warn!("Could not open {} for {}: {}", self.base_url, self.name, e),
                }
            })
            .await;
    }

    async fn get_with_retry(&self, url: &str, referer: Option<&str>) -> Result<Option<Response>> {
        self.prime().await;
        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            let mut request = self.client.get(url);
            if let Some(referer) = referer {
                request = request.header(REFERER, referer);
            }
            match request.send().await {
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    debug!(source = %self.name, url, "not found");
                    return Ok(None);
                }
                Ok(resp) if resp.status().is_success() => {
                    metrics::counter!("media_scraper_source_requests_total", "source" => self.name.clone())
                        .increment(1);
                    return Ok(Some(resp));
                }
                Ok(resp) => last_error = format!("HTTP {}", resp.status()),
                Err(e) => last_error = e.to_string(),
            }
            warn!(
                "Request {} for {} failed (attempt {}/{}): {}",
                url, self.name, attempt, self.max_retries, last_error
            );
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        metrics::counter!("media_scraper_source_request_errors_total", "source" => self.name.clone())
            .increment(1);
        Err(ScraperError::Transport {
            url: url.to_string(),
            attempts: self.max_retries,
            message: last_error,
        })
    }
}
