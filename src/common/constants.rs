/// Source name constants to ensure consistency across the codebase
// Source names (used in config, priority tables and stored source tags)
pub const JAVBUS_SOURCE: &str = "javbus";

/// Directory used when a record has no usable actor name
pub const UNKNOWN_ACTOR: &str = "Unknown Actor";

/// Replacement for characters that are reserved on common filesystems
pub const PATH_SUBSTITUTE: char = '_';
pub const RESERVED_PATH_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub const NO_DATA_MESSAGE: &str = "no adapter produced data";

// Companion file naming
pub const TRAILER_SUFFIX: &str = "-trailer";
pub const STILL_SUFFIX: &str = "-still-";
pub const NFO_EXTENSION: &str = "nfo";
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";
pub const DEFAULT_VIDEO_EXTENSION: &str = "mp4";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Get all source names that have an adapter implementation
pub fn get_supported_sources() -> Vec<&'static str> {
    vec![JAVBUS_SOURCE]
}

pub fn is_supported_source(name: &str) -> bool {
    get_supported_sources().contains(&name)
}
