pub mod codec;
pub mod sqlite;

use crate::common::error::Result;
use crate::common::types::{MediaRecord, Metadata, RecordStatus};
use serde::Serialize;

pub use sqlite::SqliteRecordStore;

/// Row counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub success: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.success + self.failed
    }
}

/// Persistent cache of resolved records, keyed by identifier.
///
/// State machine: PENDING -> SUCCESS | FAILED. A SUCCESS row is only
/// re-resolved when the caller explicitly forces it.
pub trait RecordStore: Send + Sync {
    /// True only for rows whose status is SUCCESS
    fn exists_and_succeeded(&self, identifier: &str) -> Result<bool>;

    /// Insert a row, or update an existing one with the non-null fields of
    /// `metadata` plus `status` and `updated_at`. Null fields never erase
    /// stored values.
    fn upsert(&self, identifier: &str, metadata: &Metadata, status: RecordStatus) -> Result<()>;

    /// Set FAILED and the message; stored metadata is left as it was
    fn mark_failed(&self, identifier: &str, message: &str) -> Result<()>;

    fn get(&self, identifier: &str) -> Result<Option<MediaRecord>>;

    /// Insert a PENDING row unless one exists. Returns whether a row was added.
    fn register_pending(&self, identifier: &str) -> Result<bool>;

    /// Every PENDING or FAILED row, oldest update first
    fn unresolved(&self) -> Result<Vec<MediaRecord>>;

    fn counts(&self) -> Result<StatusCounts>;
}
