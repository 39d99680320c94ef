use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("XML write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Transport failure for {url} after {attempts} attempt(s): {message}")]
    Transport {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Resolution failed: {0}")]
    Resolution(String),

    #[error("Stored value for column '{column}' is not valid: {message}")]
    Codec { column: String, message: String },

    #[error("Failed to move {} to {}: {message}", .from.display(), .to.display())]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, ScraperError>;
