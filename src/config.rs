use crate::common::constants::{self, DEFAULT_USER_AGENT, JAVBUS_SOURCE};
use crate::common::error::{Result, ScraperError};
use crate::common::types::Field;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level configuration, built once in `main` and passed by reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base: BaseConfig,
    pub scanner: ScannerConfig,
    pub scraper: ScraperConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    pub scan_path: PathBuf,
    pub output_path: PathBuf,
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            scan_path: PathBuf::from("videos"),
            output_path: PathBuf::from("organized"),
            db_path: PathBuf::from("media_scraper.db"),
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub min_size_mb: u64,
    pub extensions: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_size_mb: 100,
            extensions: [".mp4", ".mkv", ".avi", ".wmv", ".mov"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Sources queried during resolution; anything else is skipped
    pub enabled: Vec<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub proxy: Option<String>,
    /// `[min, max]` milliseconds slept between items of a retry batch
    pub batch_delay_ms: [u64; 2],
    /// Field name to ordered source names, e.g. `title = ["javbus"]`.
    /// Fields the user leaves out keep their default order.
    #[serde(deserialize_with = "priority_over_defaults")]
    pub priority: BTreeMap<String, Vec<String>>,
    pub sources: HashMap<String, SourceConfig>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        let mut sources = HashMap::new();
        sources.insert(JAVBUS_SOURCE.to_string(), SourceConfig::javbus());
        Self {
            enabled: vec![JAVBUS_SOURCE.to_string()],
            timeout_secs: 10,
            max_retries: 3,
            retry_delay_ms: 100,
            proxy: None,
            batch_delay_ms: [1000, 3000],
            priority: default_priority(),
            sources,
        }
    }
}

fn default_priority() -> BTreeMap<String, Vec<String>> {
    Field::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), vec![JAVBUS_SOURCE.to_string()]))
        .collect()
}

fn priority_over_defaults<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, Vec<String>>::deserialize(deserializer)?;
    let mut priority = default_priority();
    priority.extend(overrides);
    Ok(priority)
}

/// Connection parameters for one source. Unset values fall back to `[scraper]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Search address with a `{}` placeholder for the identifier
    pub search_url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub proxy: Option<String>,
}

impl SourceConfig {
    fn javbus() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        headers.insert(
            "Accept-Language".to_string(),
            "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7,ja;q=0.6".to_string(),
        );
        Self {
            base_url: "https://www.javbus.com".to_string(),
            search_url: "https://www.javbus.com/{}".to_string(),
            headers,
            ..Default::default()
        }
    }
}

/// Source settings with defaults from `[scraper]` applied
#[derive(Debug, Clone)]
pub struct ResolvedSourceConfig {
    pub name: String,
    pub base_url: String,
    pub search_url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub move_files: bool,
    pub write_nfo: bool,
    pub download_cover: bool,
    pub download_trailer: bool,
    pub download_stills: bool,
    /// When set, a failed move skips descriptor and asset steps for that item
    pub skip_post_processing_on_move_failure: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            move_files: true,
            write_nfo: true,
            download_cover: true,
            download_trailer: true,
            download_stills: true,
            skip_post_processing_on_move_failure: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    /// Like `load`, but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for name in &self.scraper.enabled {
            if !constants::is_supported_source(name) {
                return Err(ScraperError::UnknownSource(name.clone()));
            }
            if !self.scraper.sources.contains_key(name) {
                return Err(ScraperError::Config(format!(
                    "source '{name}' is enabled but has no [scraper.sources.{name}] section"
                )));
            }
        }
        for field_name in self.scraper.priority.keys() {
            field_name.parse::<Field>()?;
        }
        let [min, max] = self.scraper.batch_delay_ms;
        if min > max {
            return Err(ScraperError::Config(format!(
                "batch_delay_ms min ({min}) is greater than max ({max})"
            )));
        }
        if self.scanner.extensions.is_empty() {
            return Err(ScraperError::Config(
                "scanner.extensions must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Priority list for a field. An explicit empty list disables the field.
    pub fn priority_for(&self, field: Field) -> &[String] {
        self.scraper
            .priority
            .get(field.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn source(&self, name: &str) -> Result<ResolvedSourceConfig> {
        let source = self
            .scraper
            .sources
            .get(name)
            .ok_or_else(|| ScraperError::UnknownSource(name.to_string()))?;
        Ok(ResolvedSourceConfig {
            name: name.to_string(),
            base_url: source.base_url.clone(),
            search_url: source.search_url.clone(),
            headers: source.headers.clone(),
            timeout: Duration::from_secs(source.timeout_secs.unwrap_or(self.scraper.timeout_secs)),
            max_retries: source.max_retries.unwrap_or(self.scraper.max_retries).max(1),
            retry_delay: Duration::from_millis(self.scraper.retry_delay_ms),
            proxy: source.proxy.clone().or_else(|| self.scraper.proxy.clone()),
        })
    }
}
