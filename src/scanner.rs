use crate::common::error::{Result, ScraperError};
use crate::config::ScannerConfig;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Two to five letters, optional hyphen, three to five digits
pub const IDENTIFIER_PATTERN: &str = r"([A-Za-z]{2,5}-?\d{3,5})";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A second file carrying an identifier that was already seen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateFile {
    pub identifier: String,
    pub replaced: PathBuf,
    pub kept: PathBuf,
}

#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    /// Identifier to media file; the last file seen wins
    pub files: BTreeMap<String, PathBuf>,
    pub duplicates: Vec<DuplicateFile>,
    /// Media files whose names carry no identifier
    pub skipped: Vec<PathBuf>,
}

pub struct Scanner {
    min_size_bytes: u64,
    extensions: Vec<String>,
    pattern: Regex,
}

impl Scanner {
    pub fn new(min_size_mb: u64, extensions: &[String]) -> Result<Self> {
        let pattern = Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| ScraperError::Config(format!("invalid identifier pattern: {e}")))?;
        Ok(Self {
            min_size_bytes: min_size_mb.saturating_mul(BYTES_PER_MB),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            pattern,
        })
    }

    pub fn from_config(config: &ScannerConfig) -> Result<Self> {
        Self::new(config.min_size_mb, &config.extensions)
    }

    /// Upper-cased identifier found in a file name
    pub fn extract_identifier(&self, file_name: &str) -> Option<String> {
        self.pattern
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
    }

    fn is_media_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self.extensions.contains(&ext.to_lowercase()) {
            return false;
        }
        match path.metadata() {
            Ok(meta) => meta.len() >= self.min_size_bytes,
            Err(_) => false,
        }
    }

    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        if !root.exists() {
            return Err(ScraperError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("scan path does not exist: {}", root.display()),
            )));
        }

        info!("Scanning {}", root.display());
        let mut report = ScanReport::default();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_media_file(path) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let Some(identifier) = self.extract_identifier(&file_name) else {
                warn!("No identifier in file name: {}", path.display());
                report.skipped.push(path.to_path_buf());
                continue;
            };

            debug!("Found {} at {}", identifier, path.display());
            if let Some(previous) = report.files.insert(identifier.clone(), path.to_path_buf()) {
                warn!(
                    "Duplicate identifier {}: {} replaces {}",
                    identifier,
                    path.display(),
                    previous.display()
                );
                report.duplicates.push(DuplicateFile {
                    identifier,
                    replaced: previous,
                    kept: path.to_path_buf(),
                });
            }
        }

        info!(
            "Scan found {} identifiers ({} duplicates, {} skipped)",
            report.files.len(),
            report.duplicates.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
