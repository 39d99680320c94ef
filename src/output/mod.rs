pub mod assets;
pub mod nfo;

pub use assets::{AssetFetcher, AssetOutcome, StillsOutcome};
pub use nfo::NfoWriter;

use reqwest::Url;
use std::path::{Path, PathBuf};

/// Sibling of a media file: `<dir>/<stem><suffix>.<extension>`
pub fn companion_path(media: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = media
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}{suffix}.{extension}");
    match media.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Lower-cased extension of the URL's last path segment, or `default`
pub fn extension_from_url(url: &str, default: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let segment = u.path_segments()?.last()?.to_string();
            let (_, ext) = segment.rsplit_once('.')?;
            let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| ext.to_lowercase())
        })
        .unwrap_or_else(|| default.to_string())
}
